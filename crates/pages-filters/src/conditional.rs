//! Extension-conditional filter application.

use std::sync::Arc;

use crate::traits::{Asset, Filter, FilterError};

/// Applies the wrapped filter only to assets with a given extension.
pub struct WhenExtension {
    extension: &'static str,
    inner: Arc<dyn Filter>,
}

impl WhenExtension {
    /// Apply `inner` to assets whose extension equals `extension` (without the dot).
    pub fn new(extension: &'static str, inner: Arc<dyn Filter>) -> Self {
        Self { extension, inner }
    }
}

impl Filter for WhenExtension {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn apply(&self, asset: Asset) -> Result<Vec<Asset>, FilterError> {
        if asset.extension() == self.extension {
            self.inner.apply(asset)
        } else {
            Ok(vec![asset])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::CssMinifyFilter;

    #[test]
    fn only_touches_matching_extension() {
        let filter = WhenExtension::new("css", Arc::new(CssMinifyFilter));

        let css = filter
            .apply(Asset::new("d", "a.css", b"a { color: red; }".to_vec()))
            .unwrap();
        assert_eq!(css[0].contents, b"a{color:red}");

        let js = Asset::new("d", "a.js", b"a { color: red; }".to_vec());
        assert_eq!(filter.apply(js.clone()).unwrap(), vec![js]);
    }
}
