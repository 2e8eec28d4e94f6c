//! HTML template rendering using minijinja.

use std::path::PathBuf;

use minijinja::{context, path_loader, Environment, Value};

use crate::traits::{Asset, Filter, FilterError};

/// Renders page templates with the configured data.
///
/// A fresh environment is created for every page, so edits to layouts and
/// partials are picked up without restarting the process.
#[derive(Debug, Clone)]
pub struct TemplateFilter {
    /// Directory `extends`/`include` names are resolved against
    templates_dir: PathBuf,

    /// Context passed to every page
    data: serde_json::Value,
}

impl TemplateFilter {
    /// Create a renderer resolving templates under `templates_dir`.
    pub fn new(templates_dir: impl Into<PathBuf>, data: serde_json::Value) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            data,
        }
    }

    fn environment<'s>(&self) -> Environment<'s> {
        let mut env = Environment::new();
        env.set_loader(path_loader(&self.templates_dir));
        env
    }

    fn context(&self) -> Value {
        if self.data.is_object() {
            Value::from_serialize(&self.data)
        } else {
            context! {}
        }
    }

    /// Render a template source registered under `name`.
    pub fn render(&self, name: &str, source: &str) -> Result<String, minijinja::Error> {
        self.environment()
            .render_named_str(name, source, self.context())
    }
}

impl Filter for TemplateFilter {
    fn name(&self) -> &'static str {
        "swig"
    }

    fn apply(&self, asset: Asset) -> Result<Vec<Asset>, FilterError> {
        let name = asset.path.to_string_lossy().replace('\\', "/");
        let html = self
            .render(&name, asset.text()?)
            .map_err(|e| FilterError::Template(format!("{}: {:#}", name, e)))?;
        Ok(vec![asset.with_contents(html)])
    }
}
