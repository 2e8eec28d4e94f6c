//! Build-block reference resolution for HTML pages.
//!
//! Blocks of the form
//!
//! ```html
//! <!-- build:css assets/styles/vendor.css -->
//! <link rel="stylesheet" href="/node_modules/bootstrap/dist/css/bootstrap.css">
//! <!-- endbuild -->
//! ```
//!
//! are replaced by a single tag pointing at the target, and the referenced
//! files are concatenated into a new asset at that target. `build:js` works
//! the same way with `<script src>`, and `build:remove` drops the block.
//! An optional alternate search path may follow the type: `build:js(.tmp)`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::traits::{Asset, Filter, FilterError};

static BUILD_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--\s*build:(\w+)(?:\(([^)]*)\))?(?:\s+(\S+?))?\s*-->(.*?)<!--\s*endbuild\s*-->")
        .expect("Invalid build block regex")
});

static SCRIPT_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("Invalid script regex")
});

static LINK_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<link\b[^>]*?\bhref\s*=\s*["']([^"']+)["']"#).expect("Invalid link regex")
});

/// Kind of build block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Js,
    Css,
    Remove,
}

impl BlockKind {
    fn parse(kind: &str) -> Option<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "js" => Some(Self::Js),
            "css" => Some(Self::Css),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }

    fn tag(self, target: &str) -> String {
        match self {
            Self::Js => format!(r#"<script src="{}"></script>"#, target),
            Self::Css => format!(r#"<link rel="stylesheet" href="{}">"#, target),
            Self::Remove => String::new(),
        }
    }
}

/// Resolves build blocks in HTML files and emits the bundled assets.
#[derive(Debug, Clone)]
pub struct UserefFilter {
    /// Directory alternate search paths are relative to
    root: PathBuf,

    /// Directories searched, in order, for referenced files
    search_paths: Vec<PathBuf>,
}

impl UserefFilter {
    pub fn new(root: impl Into<PathBuf>, search_paths: Vec<PathBuf>) -> Self {
        Self {
            root: root.into(),
            search_paths,
        }
    }

    /// Find a referenced file, trying each search path in order.
    fn resolve(&self, reference: &str, page_dir: &Path, alternate: Option<&str>) -> Option<PathBuf> {
        let clean = reference
            .split(['?', '#'])
            .next()
            .unwrap_or(reference);
        let absolute = clean.starts_with('/');
        let relative = clean.trim_start_matches('/');

        let mut roots: Vec<PathBuf> = Vec::new();
        if let Some(alt) = alternate {
            roots.extend(alt.split(',').map(|p| self.root.join(p.trim())));
        }
        roots.extend(self.search_paths.iter().cloned());

        roots.into_iter().find_map(|root| {
            let mut candidates = Vec::with_capacity(2);
            if !absolute {
                candidates.push(root.join(page_dir).join(relative));
            }
            candidates.push(root.join(relative));
            candidates.into_iter().find(|c| c.is_file())
        })
    }

    fn bundle(
        &self,
        kind: BlockKind,
        body: &str,
        page: &Asset,
        page_dir: &Path,
        alternate: Option<&str>,
    ) -> Result<Vec<u8>, FilterError> {
        let re = match kind {
            BlockKind::Js => &*SCRIPT_SRC_RE,
            _ => &*LINK_HREF_RE,
        };

        let mut parts = Vec::new();
        for caps in re.captures_iter(body) {
            let reference = &caps[1];
            let path = self.resolve(reference, page_dir, alternate).ok_or_else(|| {
                FilterError::Reference(format!(
                    "{}: cannot find '{}'",
                    page.path.display(),
                    reference
                ))
            })?;
            let contents = fs::read(&path)
                .map_err(|e| FilterError::Reference(format!("{}: {}", path.display(), e)))?;
            parts.push(contents);
        }

        Ok(parts.join(&b'\n'))
    }
}

impl Filter for UserefFilter {
    fn name(&self) -> &'static str {
        "useref"
    }

    fn apply(&self, asset: Asset) -> Result<Vec<Asset>, FilterError> {
        if asset.extension() != "html" {
            return Ok(vec![asset]);
        }

        let html = asset.text()?;
        let page_dir = asset.path.parent().unwrap_or(Path::new("")).to_path_buf();

        let mut bundles: BTreeMap<PathBuf, Vec<u8>> = BTreeMap::new();
        let mut out = String::with_capacity(html.len());
        let mut last = 0;

        for caps in BUILD_BLOCK_RE.captures_iter(html) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&html[last..whole.start()]);
            last = whole.end();

            let Some(kind) = BlockKind::parse(&caps[1]) else {
                tracing::warn!("{}: unknown build block type '{}'", asset.path.display(), &caps[1]);
                out.push_str(whole.as_str());
                continue;
            };
            if kind == BlockKind::Remove {
                continue;
            }

            let target = caps.get(3).map(|m| m.as_str()).ok_or_else(|| {
                FilterError::Reference(format!("{}: build block without target", asset.path.display()))
            })?;
            let alternate = caps.get(2).map(|m| m.as_str());
            let body = caps.get(4).map(|m| m.as_str()).unwrap_or("");

            let contents = self.bundle(kind, body, &asset, &page_dir, alternate)?;
            let output = match target.strip_prefix('/') {
                Some(rooted) => PathBuf::from(rooted),
                None => page_dir.join(target),
            };
            bundles.insert(output, contents);
            out.push_str(&kind.tag(target));
        }
        out.push_str(&html[last..]);

        let base = asset.base.clone();
        let mut assets = vec![asset.with_contents(out)];
        assets.extend(
            bundles
                .into_iter()
                .map(|(path, contents)| Asset::new(base.clone(), path, contents)),
        );
        Ok(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const PAGE: &str = r#"<html>
<head>
  <!-- build:css assets/styles/vendor.css -->
  <link rel="stylesheet" href="/node_modules/bootstrap/bootstrap.css">
  <!-- endbuild -->
  <!-- build:css assets/styles/main.css -->
  <link rel="stylesheet" href="assets/styles/main.css">
  <!-- endbuild -->
</head>
<body>
  <!-- build:js assets/scripts/vendor.js -->
  <script src="/node_modules/jquery/jquery.js"></script>
  <script src="/node_modules/popper/popper.js?v=2"></script>
  <!-- endbuild -->
  <!-- build:remove -->
  <script src="/dev-only.js"></script>
  <!-- endbuild -->
</body>
</html>"#;

    fn fixture() -> (tempfile::TempDir, UserefFilter) {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let build = root.join(".temp");

        for (path, contents) in [
            ("node_modules/bootstrap/bootstrap.css", ".btn{}"),
            ("node_modules/jquery/jquery.js", "var $ = 1;"),
            ("node_modules/popper/popper.js", "var Popper = 2;"),
            (".temp/assets/styles/main.css", "body{}"),
        ] {
            let file = root.join(path);
            fs::create_dir_all(file.parent().unwrap()).unwrap();
            fs::write(file, contents).unwrap();
        }

        let filter = UserefFilter::new(root, vec![build, root.to_path_buf()]);
        (temp, filter)
    }

    #[test]
    fn replaces_blocks_and_emits_bundles() {
        let (temp, filter) = fixture();
        let page = Asset::new(temp.path().join(".temp"), "index.html", PAGE.as_bytes().to_vec());

        let out = filter.apply(page).unwrap();
        let paths: Vec<_> = out.iter().map(|a| a.path.to_string_lossy().into_owned()).collect();
        assert_eq!(
            paths,
            vec![
                "index.html",
                "assets/scripts/vendor.js",
                "assets/styles/main.css",
                "assets/styles/vendor.css"
            ]
        );

        let html = String::from_utf8(out[0].contents.clone()).unwrap();
        assert!(html.contains(r#"<link rel="stylesheet" href="assets/styles/vendor.css">"#));
        assert!(html.contains(r#"<script src="assets/scripts/vendor.js"></script>"#));
        assert!(!html.contains("node_modules"));
        assert!(!html.contains("dev-only"));

        assert_eq!(out[1].contents, b"var $ = 1;\nvar Popper = 2;");
        assert_eq!(out[2].contents, b"body{}");
    }

    #[test]
    fn passes_other_files_through() {
        let (temp, filter) = fixture();
        let asset = Asset::new(temp.path(), "app.js", b"let a;".to_vec());
        assert_eq!(filter.apply(asset.clone()).unwrap(), vec![asset]);
    }

    #[test]
    fn fails_on_missing_reference() {
        let (temp, filter) = fixture();
        let html = "<!-- build:js a.js --><script src=\"/missing.js\"></script><!-- endbuild -->";
        let err = filter
            .apply(Asset::new(temp.path().join(".temp"), "index.html", html.as_bytes().to_vec()))
            .unwrap_err();
        assert!(matches!(err, FilterError::Reference(_)));
    }

    #[test]
    fn uses_alternate_search_path() {
        let (temp, filter) = fixture();
        fs::create_dir_all(temp.path().join("extra")).unwrap();
        fs::write(temp.path().join("extra/x.js"), "x()").unwrap();

        let html = "<!-- build:js(extra) x.min.js --><script src=\"x.js\"></script><!-- endbuild -->";
        let out = filter
            .apply(Asset::new(temp.path().join(".temp"), "index.html", html.as_bytes().to_vec()))
            .unwrap();
        assert_eq!(out[1].contents, b"x()");
    }
}
