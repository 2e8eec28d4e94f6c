//! File transform stages.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use glob_match::glob_match;
use pages_filters::{apply_chain, Asset, Filter};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::PipelineError;
use crate::registry::FilterRegistry;

/// The seven transform stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageKind {
    /// Sass → CSS into temp
    Style,
    /// Script down-levelling into temp
    Script,
    /// Template rendering into temp
    Page,
    /// Image compression into dist
    Image,
    /// Fonts into dist
    Font,
    /// Public files copied into dist
    Extra,
    /// Build-block resolution and minification, temp → dist
    Useref,
}

impl StageKind {
    pub const ALL: [StageKind; 7] = [
        StageKind::Style,
        StageKind::Script,
        StageKind::Page,
        StageKind::Image,
        StageKind::Font,
        StageKind::Extra,
        StageKind::Useref,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Style => "style",
            StageKind::Script => "script",
            StageKind::Page => "page",
            StageKind::Image => "image",
            StageKind::Font => "font",
            StageKind::Extra => "extra",
            StageKind::Useref => "useref",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Files written by one stage run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Input files selected by the glob
    pub read: usize,
    /// Output files written
    pub written: usize,
}

/// Glob-selected files under a base directory, pushed through a filter
/// chain and written to an output directory.
pub struct Stage {
    kind: StageKind,
    base: PathBuf,
    pattern: Option<String>,
    dest: PathBuf,
    filters: Arc<[Arc<dyn Filter>]>,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("kind", &self.kind)
            .field("base", &self.base)
            .field("pattern", &self.pattern)
            .field("dest", &self.dest)
            .field("filters", &self.filters.iter().map(|f| f.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Stage {
    pub fn new(
        kind: StageKind,
        base: impl Into<PathBuf>,
        pattern: Option<String>,
        dest: impl Into<PathBuf>,
        filters: Vec<Arc<dyn Filter>>,
    ) -> Self {
        Self {
            kind,
            base: base.into(),
            pattern,
            dest: dest.into(),
            filters: filters.into(),
        }
    }

    /// Build a stage from the configuration and the filter chain registered for it.
    pub fn from_config(kind: StageKind, config: &Config, registry: &FilterRegistry) -> Self {
        let paths = &config.build.paths;
        let (base, pattern, dest) = match kind {
            StageKind::Style => (config.src_dir(), paths.styles.clone(), config.temp_dir()),
            StageKind::Script => (config.src_dir(), paths.scripts.clone(), config.temp_dir()),
            StageKind::Page => (config.src_dir(), paths.pages.clone(), config.temp_dir()),
            StageKind::Image => (config.src_dir(), paths.images.clone(), config.dist_dir()),
            StageKind::Font => (config.src_dir(), paths.fonts.clone(), config.dist_dir()),
            StageKind::Extra => (config.public_dir(), Some("**".to_string()), config.dist_dir()),
            StageKind::Useref => (config.temp_dir(), paths.pages.clone(), config.dist_dir()),
        };
        Self::new(kind, base, pattern, dest, registry.chain(kind))
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Whether a path relative to the base is selected by this stage.
    pub fn matches(&self, relative: &Path) -> bool {
        match &self.pattern {
            Some(pattern) => is_selected(pattern, relative),
            None => false,
        }
    }

    /// Run the stage once.
    pub async fn run(&self) -> Result<StageReport, PipelineError> {
        let Some(pattern) = self.pattern.clone() else {
            tracing::warn!("No glob pattern configured for '{}', nothing to do", self.kind);
            return Ok(StageReport::default());
        };

        let start = Instant::now();
        tracing::info!("Starting '{}'...", self.kind);

        let base = self.base.clone();
        let files = tokio::task::spawn_blocking(move || select_files(&base, &pattern)).await??;

        let mut report = StageReport {
            read: files.len(),
            written: 0,
        };

        for relative in files {
            let input = self.base.join(&relative);
            let contents = tokio::fs::read(&input)
                .await
                .map_err(PipelineError::io(&input))?;
            tracing::debug!("{}: {}", self.kind, relative.display());

            let asset = Asset::new(self.base.clone(), relative.clone(), contents);
            let filters = Arc::clone(&self.filters);
            let outputs = tokio::task::spawn_blocking(move || apply_chain(&filters, asset))
                .await?
                .map_err(|source| PipelineError::Filter {
                    stage: self.kind,
                    path: relative,
                    source,
                })?;

            for output in outputs {
                let target = self.dest.join(&output.path);
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(PipelineError::io(parent))?;
                }
                tokio::fs::write(&target, &output.contents)
                    .await
                    .map_err(PipelineError::io(&target))?;
                report.written += 1;
            }
        }

        tracing::info!(
            "Finished '{}' after {}ms ({} files)",
            self.kind,
            start.elapsed().as_millis(),
            report.written
        );
        Ok(report)
    }
}

/// Glob match on a `/`-separated relative path. Dot-files are never selected.
fn is_selected(pattern: &str, relative: &Path) -> bool {
    let Some(normalized) = to_slash(relative) else {
        return false;
    };
    if normalized.split('/').any(|segment| segment.starts_with('.')) {
        return false;
    }
    glob_match(pattern, &normalized)
}

fn to_slash(path: &Path) -> Option<String> {
    let parts: Option<Vec<&str>> = path.components().map(|c| c.as_os_str().to_str()).collect();
    parts.map(|p| p.join("/"))
}

/// Files under `base` matching `pattern`, sorted, relative to `base`.
///
/// A missing base selects nothing. Any error while walking it fails the stage.
fn select_files(base: &Path, pattern: &str) -> Result<Vec<PathBuf>, PipelineError> {
    if !base.exists() {
        tracing::debug!("{} does not exist, no files selected", base.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(base).follow_links(true) {
        let entry = entry.map_err(|e| walk_error(base, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(base) {
            if is_selected(pattern, relative) {
                files.push(relative.to_path_buf());
            }
        }
    }
    files.sort();
    Ok(files)
}

fn walk_error(base: &Path, error: walkdir::Error) -> PipelineError {
    let path = error.path().unwrap_or(base).to_path_buf();
    let message = error.to_string();
    let source = error
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other(message));
    PipelineError::Io { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pages_filters::FilterError;
    use std::fs;
    use tempfile::tempdir;

    struct Shout;

    impl Filter for Shout {
        fn name(&self) -> &'static str {
            "shout"
        }

        fn apply(&self, asset: Asset) -> Result<Vec<Asset>, FilterError> {
            let text = asset.text()?.to_uppercase();
            Ok(vec![asset.with_contents(text)])
        }
    }

    struct Fail;

    impl Filter for Fail {
        fn name(&self) -> &'static str {
            "fail"
        }

        fn apply(&self, asset: Asset) -> Result<Vec<Asset>, FilterError> {
            Err(FilterError::Sass(format!("bad {}", asset.path.display())))
        }
    }

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn single_star_stays_in_one_directory() {
        assert!(is_selected("*.html", Path::new("index.html")));
        assert!(!is_selected("*.html", Path::new("layouts/basic.html")));
        assert!(is_selected("assets/images/**", Path::new("assets/images/icons/a.svg")));
        assert!(!is_selected("**", Path::new(".htaccess")));
        assert!(!is_selected("**", Path::new("nested/.DS_Store")));
    }

    #[tokio::test]
    async fn transforms_matching_files_only() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        write(&src.join("assets/scripts/app.js"), "app");
        write(&src.join("assets/scripts/lib/skip.js"), "skip");
        write(&src.join("index.html"), "page");

        let stage = Stage::new(
            StageKind::Script,
            &src,
            Some("assets/scripts/*.js".to_string()),
            &out,
            vec![Arc::new(Shout)],
        );
        let report = stage.run().await.unwrap();

        assert_eq!(report, StageReport { read: 1, written: 1 });
        assert_eq!(fs::read_to_string(out.join("assets/scripts/app.js")).unwrap(), "APP");
        assert!(!out.join("assets/scripts/lib/skip.js").exists());
        assert!(!out.join("index.html").exists());
    }

    #[tokio::test]
    async fn empty_chain_copies() {
        let temp = tempdir().unwrap();
        let public = temp.path().join("public");
        let out = temp.path().join("dist");
        write(&public.join("favicon.ico"), "icon");
        write(&public.join("docs/readme.txt"), "docs");

        let stage = Stage::new(StageKind::Extra, &public, Some("**".to_string()), &out, vec![]);
        stage.run().await.unwrap();

        assert_eq!(fs::read_to_string(out.join("favicon.ico")).unwrap(), "icon");
        assert_eq!(fs::read_to_string(out.join("docs/readme.txt")).unwrap(), "docs");
    }

    #[tokio::test]
    async fn missing_base_selects_nothing() {
        let temp = tempdir().unwrap();
        let stage = Stage::new(
            StageKind::Extra,
            temp.path().join("public"),
            Some("**".to_string()),
            temp.path().join("dist"),
            vec![],
        );

        assert_eq!(stage.run().await.unwrap(), StageReport::default());
        assert!(!temp.path().join("dist").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn walk_errors_fail_the_stage() {
        let temp = tempdir().unwrap();
        let public = temp.path().join("public");
        write(&public.join("index.html"), "page");
        std::os::unix::fs::symlink(&public, public.join("loop")).unwrap();

        let stage = Stage::new(StageKind::Extra, &public, Some("**".to_string()), temp.path().join("dist"), vec![]);
        let err = stage.run().await.unwrap_err();

        match err {
            PipelineError::Io { path, .. } => assert!(path.starts_with(&public)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unset_pattern_is_a_no_op() {
        let temp = tempdir().unwrap();
        write(&temp.path().join("src/a.js"), "a");

        let stage = Stage::new(StageKind::Script, temp.path().join("src"), None, temp.path().join("out"), vec![]);

        assert_eq!(stage.run().await.unwrap(), StageReport::default());
        assert!(!stage.matches(Path::new("a.js")));
    }

    #[tokio::test]
    async fn filter_failure_aborts_stage() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        write(&src.join("a.scss"), "a");

        let stage = Stage::new(StageKind::Style, &src, Some("*.scss".to_string()), temp.path().join("out"), vec![Arc::new(Fail)]);
        let err = stage.run().await.unwrap_err();

        match err {
            PipelineError::Filter { stage, path, .. } => {
                assert_eq!(stage, StageKind::Style);
                assert_eq!(path, PathBuf::from("a.scss"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn stages_read_through_config() {
        let config = Config::defaults("/p");
        let registry = FilterRegistry::new();

        let style = Stage::from_config(StageKind::Style, &config, &registry);
        assert_eq!(style.base(), Path::new("/p/src"));
        assert_eq!(style.pattern(), Some("assets/styles/*.scss"));
        assert_eq!(style.dest(), Path::new("/p/.temp"));

        let useref = Stage::from_config(StageKind::Useref, &config, &registry);
        assert_eq!(useref.base(), Path::new("/p/.temp"));
        assert_eq!(useref.pattern(), Some("*.html"));
        assert_eq!(useref.dest(), Path::new("/p/dist"));

        let extra = Stage::from_config(StageKind::Extra, &config, &registry);
        assert_eq!(extra.base(), Path::new("/p/public"));
        assert_eq!(extra.pattern(), Some("**"));
    }
}
