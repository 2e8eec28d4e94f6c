//! Filter chains per stage.
//!
//! The registry is an explicit table from [`StageKind`] to an ordered list
//! of filters. [`FilterRegistry::standard`] builds the production table; a
//! chain can be replaced per stage (tests use this to inject probes).

use std::collections::HashMap;
use std::sync::Arc;

use pages_filters::{
    CssMinifyFilter, Filter, HtmlMinifyFilter, HtmlMinifyOptions, ImageminFilter, JsMinifyFilter,
    SassFilter, TemplateFilter, TranspileFilter, UserefFilter, WhenExtension,
};

use crate::config::Config;
use crate::stage::StageKind;

/// Ordered filter chains keyed by stage.
#[derive(Default, Clone)]
pub struct FilterRegistry {
    chains: HashMap<StageKind, Vec<Arc<dyn Filter>>>,
}

impl FilterRegistry {
    /// Registry where every stage is a plain copy.
    pub fn new() -> Self {
        Self::default()
    }

    /// The production filter table for a configuration.
    pub fn standard(config: &Config) -> Self {
        let imagemin: Arc<dyn Filter> = Arc::new(ImageminFilter::default());

        Self::new()
            .with(StageKind::Style, vec![Arc::new(SassFilter)])
            .with(StageKind::Script, vec![Arc::new(TranspileFilter)])
            .with(
                StageKind::Page,
                vec![Arc::new(TemplateFilter::new(config.src_dir(), config.data.clone()))],
            )
            .with(StageKind::Image, vec![Arc::clone(&imagemin)])
            .with(StageKind::Font, vec![imagemin])
            .with(StageKind::Extra, vec![])
            .with(
                StageKind::Useref,
                vec![
                    Arc::new(UserefFilter::new(
                        config.root.clone(),
                        vec![config.temp_dir(), config.root.clone()],
                    )),
                    Arc::new(WhenExtension::new("js", Arc::new(JsMinifyFilter))),
                    Arc::new(WhenExtension::new("css", Arc::new(CssMinifyFilter))),
                    Arc::new(WhenExtension::new(
                        "html",
                        Arc::new(HtmlMinifyFilter::new(HtmlMinifyOptions::default())),
                    )),
                ],
            )
    }

    /// Replace the chain of one stage.
    pub fn with(mut self, kind: StageKind, filters: Vec<Arc<dyn Filter>>) -> Self {
        self.set(kind, filters);
        self
    }

    /// Replace the chain of one stage in place.
    pub fn set(&mut self, kind: StageKind, filters: Vec<Arc<dyn Filter>>) {
        self.chains.insert(kind, filters);
    }

    /// Append a filter to the chain of one stage.
    pub fn push(&mut self, kind: StageKind, filter: Arc<dyn Filter>) {
        self.chains.entry(kind).or_default().push(filter);
    }

    /// Chain registered for a stage; empty (copy) when none is.
    pub fn chain(&self, kind: StageKind) -> Vec<Arc<dyn Filter>> {
        self.chains.get(&kind).cloned().unwrap_or_default()
    }

    /// Filter names registered for a stage, in order.
    pub fn names(&self, kind: StageKind) -> Vec<&'static str> {
        self.chains
            .get(&kind)
            .map(|chain| chain.iter().map(|f| f.name()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn standard_table_is_inspectable() {
        let registry = FilterRegistry::standard(&Config::defaults("/p"));

        assert_eq!(registry.names(StageKind::Style), vec!["sass"]);
        assert_eq!(registry.names(StageKind::Script), vec!["babel"]);
        assert_eq!(registry.names(StageKind::Page), vec!["swig"]);
        assert_eq!(registry.names(StageKind::Image), vec!["imagemin"]);
        assert_eq!(registry.names(StageKind::Font), vec!["imagemin"]);
        assert!(registry.names(StageKind::Extra).is_empty());
        assert_eq!(
            registry.names(StageKind::Useref),
            vec!["useref", "uglify", "clean-css", "htmlmin"]
        );
    }

    #[test]
    fn chains_can_be_replaced() {
        let mut registry = FilterRegistry::standard(&Config::defaults("/p"));
        registry.set(StageKind::Style, vec![]);
        registry.push(StageKind::Extra, Arc::new(CssMinifyFilter));

        assert!(registry.chain(StageKind::Style).is_empty());
        assert_eq!(registry.names(StageKind::Extra), vec!["clean-css"]);
    }
}
