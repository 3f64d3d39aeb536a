//! Tinypage: Asynchronous Static Page Generation
//!
//! Renders templates into static files through a single serialized background
//! worker, and re-generates pages periodically through a rate-limited scheduler.
//!
//! ```no_run
//! use serde_json::json;
//! use tinypage::config::PageConfig;
//! use tinypage::page::Page;
//!
//! # async fn demo() -> Result<(), tinypage::error::PageError> {
//! let page = Page::new(PageConfig::new("/data/tpl", "/data/html"))?;
//! let data = json!({"title": "Hello"}).as_object().cloned().unwrap_or_default();
//! page.submit_generation("post.tpl", "news", "hello", data).await?;
//! page.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod page;
pub mod render;
pub mod scheduler;
pub mod types;
pub mod worker;
pub mod writer;

pub use error::PageError;
pub use page::Page;
pub use types::{GenerationRequest, PageData};
