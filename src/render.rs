//! Template Rendering
//!
//! The worker only sees the [`Renderer`] trait. [`TemplateRenderer`] is the Tera
//! implementation the facade wires in by default.

mod engine;
mod functions;

pub use engine::{RenderConfig, TemplateRenderer};
pub use functions::{FuncArg, FunctionRegistry, TemplateFunction};

use crate::error::PageError;
use crate::types::PageData;

/// Produces the bytes of one page.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        template: &str,
        sub_dir: Option<&str>,
        page: &str,
        data: &PageData,
    ) -> Result<Vec<u8>, PageError>;
}
