//! Write a default config file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
pub fn run(path: &Path, yes: bool) -> Result<()> {
    if path.exists() && !yes {
        tracing::warn!("{} already exists. Use --yes to overwrite.", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!("Created {}", path.display());
    tracing::info!("Run 'pages develop' to start the development server.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# pages configuration
#
# Every value below is the built-in default. Each top-level key you keep
# replaces the default as a whole: a [build.paths] table must list every
# pattern you still want, unlisted kinds are not processed.

[build]
# Sources: styles, scripts, pages, images, fonts
src = "src"

# Final production output
dist = "dist"

# Intermediate compiled output, removed after a successful build
temp = ".temp"

# Copied verbatim into dist
public = "public"

[build.paths]
# Glob patterns, relative to src
styles = "assets/styles/*.scss"
scripts = "assets/scripts/*.js"
pages = "*.html"
images = "assets/images/**"
fonts = "assets/fonts/**"

# Values available to page templates, e.g. {{ pkg.name }}
# [data.pkg]
# name = "my-site"
"#;
