//! Stylesheet minification using lightningcss.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

use crate::traits::{Asset, Filter, FilterError};

/// Minifies CSS files.
#[derive(Debug, Clone, Default)]
pub struct CssMinifyFilter;

impl Filter for CssMinifyFilter {
    fn name(&self) -> &'static str {
        "clean-css"
    }

    fn apply(&self, asset: Asset) -> Result<Vec<Asset>, FilterError> {
        let css = minify_css(asset.text()?)
            .map_err(|e| FilterError::Css(format!("{}: {}", asset.path.display(), e)))?;
        Ok(vec![asset.with_contents(css)])
    }
}

/// Minify CSS using lightningcss.
pub fn minify_css(css: &str) -> Result<String, String> {
    let mut stylesheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| format!("CSS parse error: {}", e))?;

    stylesheet
        .minify(MinifyOptions::default())
        .map_err(|e| format!("CSS minify error: {}", e))?;

    let minified = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| format!("CSS minify error: {}", e))?;

    Ok(minified.code)
}
