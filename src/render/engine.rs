//! Tera-backed renderer.

use super::functions::{FunctionRegistry, TemplateFunction};
use super::Renderer;
use crate::error::PageError;
use crate::types::{ensure_relative, PageData};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tera::{Context, Tera};
use tracing::debug;

/// Renderer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Extension appended to every output file
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Escape interpolated values in every template
    #[serde(default = "default_true")]
    pub autoescape: bool,

    /// Templates merged into every render (layouts, macros, partials)
    #[serde(default)]
    pub shared_templates: Vec<String>,
}

fn default_extension() -> String {
    ".html".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            autoescape: default_true(),
            shared_templates: Vec::new(),
        }
    }
}

/// Renders templates from a template root directory.
///
/// Each render parses the shared templates and the main template afresh, so
/// edits on disk are picked up without a restart.
pub struct TemplateRenderer {
    template_root: PathBuf,
    autoescape: bool,
    functions: RwLock<FunctionRegistry>,
    shared: RwLock<Vec<String>>,
}

impl TemplateRenderer {
    pub fn new(template_root: impl Into<PathBuf>, config: &RenderConfig) -> Result<Self, PageError> {
        let renderer = Self {
            template_root: template_root.into(),
            autoescape: config.autoescape,
            functions: RwLock::new(FunctionRegistry::with_builtins()),
            shared: RwLock::new(Vec::new()),
        };
        for template in &config.shared_templates {
            renderer.add_shared_template(template)?;
        }
        Ok(renderer)
    }

    pub fn template_root(&self) -> &Path {
        &self.template_root
    }

    /// Register an extension function under `name`.
    pub fn add_function(
        &self,
        name: &str,
        function: Arc<dyn TemplateFunction>,
    ) -> Result<(), PageError> {
        self.functions.write().register(name, function)
    }

    pub fn function_names(&self) -> Vec<String> {
        self.functions.read().names()
    }

    /// Add a template that is parsed alongside every main template.
    pub fn add_shared_template(&self, template: &str) -> Result<(), PageError> {
        if template.trim().is_empty() {
            return Err(PageError::Validation(
                "shared template is required".to_string(),
            ));
        }
        ensure_relative("shared template", template)?;
        let mut shared = self.shared.write();
        if shared.iter().any(|t| t == template) {
            return Err(PageError::DuplicateSharedTemplate(template.to_string()));
        }
        shared.push(template.to_string());
        Ok(())
    }

    pub fn reset_shared_templates(&self) {
        self.shared.write().clear();
    }

    pub fn shared_templates(&self) -> Vec<String> {
        self.shared.read().clone()
    }

    fn build(&self, template: &str) -> Result<Tera, tera::Error> {
        let mut tera = Tera::default();
        if self.autoescape {
            // An empty suffix matches every template name.
            tera.autoescape_on(vec![""]);
        } else {
            tera.autoescape_on(vec![]);
        }
        self.functions.read().install(&mut tera);

        let mut files: Vec<(PathBuf, Option<String>)> = self
            .shared
            .read()
            .iter()
            .filter(|name| name.as_str() != template)
            .map(|name| (self.template_root.join(name), Some(name.clone())))
            .collect();
        files.push((
            self.template_root.join(template),
            Some(template.to_string()),
        ));
        tera.add_template_files(files)?;
        Ok(tera)
    }
}

impl std::fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRenderer")
            .field("template_root", &self.template_root)
            .field("autoescape", &self.autoescape)
            .field("functions", &*self.functions.read())
            .field("shared", &*self.shared.read())
            .finish()
    }
}

impl Renderer for TemplateRenderer {
    fn render(
        &self,
        template: &str,
        sub_dir: Option<&str>,
        page: &str,
        data: &PageData,
    ) -> Result<Vec<u8>, PageError> {
        let render_error = |e: tera::Error| PageError::Render {
            template: template.to_string(),
            message: error_chain(&e),
        };

        let tera = self.build(template).map_err(render_error)?;
        let context = Context::from_serialize(data).map_err(render_error)?;
        let output = tera.render(template, &context).map_err(render_error)?;

        debug!(
            template,
            sub_dir = sub_dir.unwrap_or(""),
            page,
            bytes = output.len(),
            "Rendered template"
        );
        Ok(output.into_bytes())
    }
}

/// Tera nests the useful detail (parse position, missing variable) in its sources.
fn error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
