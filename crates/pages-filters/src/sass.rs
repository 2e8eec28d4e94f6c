//! Sass compilation using grass.

use grass::{Options, OutputStyle};

use crate::traits::{Asset, Filter, FilterError};

/// Compiles `.scss`/`.sass` files to expanded CSS.
///
/// Partials (files whose name starts with `_`) are consumed and produce no
/// output; they are only reachable through `@use`/`@import`.
#[derive(Debug, Clone, Default)]
pub struct SassFilter;

impl Filter for SassFilter {
    fn name(&self) -> &'static str {
        "sass"
    }

    fn apply(&self, asset: Asset) -> Result<Vec<Asset>, FilterError> {
        let is_partial = asset
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('_'));
        if is_partial {
            return Ok(vec![]);
        }

        let source_path = asset.source_path();
        let load_paths: Vec<_> = source_path.parent().map(|p| p.to_path_buf()).into_iter().collect();

        let input_syntax = if asset.extension() == "sass" {
            grass::InputSyntax::Sass
        } else {
            grass::InputSyntax::Scss
        };

        let options = Options::default()
            .load_paths(&load_paths)
            .input_syntax(input_syntax)
            .style(OutputStyle::Expanded);

        let css = grass::from_string(asset.text()?.to_string(), &options)
            .map_err(|e| FilterError::Sass(format!("{}: {}", asset.path.display(), e)))?;

        Ok(vec![asset.with_contents(css).with_extension("css")])
    }
}
