//! Configuration resolution.
//!
//! The effective configuration is the built-in default with an optional
//! `pages.config.toml` shallowly merged on top: every field present in the
//! override replaces the default field as a whole. In particular a `paths`
//! table replaces *all* default glob patterns, so patterns it does not list
//! are unset.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name of the override file looked up in the project root.
pub const CONFIG_FILE: &str = "pages.config.toml";

/// Errors reading an override file. Never surfaced by [`Config::load`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

/// Glob patterns, relative to the source directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub styles: Option<String>,
    pub scripts: Option<String>,
    pub pages: Option<String>,
    pub images: Option<String>,
    pub fonts: Option<String>,
}

impl Paths {
    fn defaults() -> Self {
        Self {
            styles: Some("assets/styles/*.scss".to_string()),
            scripts: Some("assets/scripts/*.js".to_string()),
            pages: Some("*.html".to_string()),
            images: Some("assets/images/**".to_string()),
            fonts: Some("assets/fonts/**".to_string()),
        }
    }
}

/// Directory layout and glob patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSettings {
    /// Sources (styles, scripts, pages, images, fonts)
    pub src: PathBuf,
    /// Final production output
    pub dist: PathBuf,
    /// Intermediate compiled output
    pub temp: PathBuf,
    /// Files copied verbatim to dist
    pub public: PathBuf,
    /// Glob patterns per asset kind
    pub paths: Paths,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            src: PathBuf::from("src"),
            dist: PathBuf::from("dist"),
            temp: PathBuf::from(".temp"),
            public: PathBuf::from("public"),
            paths: Paths::defaults(),
        }
    }
}

/// Override file structure (pages.config.toml).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverride {
    pub build: Option<BuildOverride>,
    /// Template data; replaces the default data entirely
    pub data: Option<serde_json::Value>,
}

/// The `[build]` table of the override file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildOverride {
    pub src: Option<PathBuf>,
    pub dist: Option<PathBuf>,
    pub temp: Option<PathBuf>,
    pub public: Option<PathBuf>,
    pub paths: Option<Paths>,
}

impl ConfigOverride {
    /// Parse override TOML.
    pub fn parse(source: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|e| ConfigError::Parse {
            path: origin.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Read an override file. `Ok(None)` when the file does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&content, path).map(Some)
    }
}

/// Effective, immutable configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    /// Directory every relative path is resolved against
    #[serde(skip)]
    pub root: PathBuf,

    pub build: BuildSettings,

    /// Context for page templates
    pub data: serde_json::Value,
}

impl Config {
    /// Built-in defaults rooted at `root`.
    pub fn defaults(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            build: BuildSettings::default(),
            data: serde_json::Value::Null,
        }
    }

    /// Resolve the configuration for a project root, reading
    /// `<root>/pages.config.toml` if present.
    pub fn load(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let path = root.join(CONFIG_FILE);
        Self::load_from(&path, root)
    }

    /// Resolve the configuration using an explicit override file.
    ///
    /// A missing, unreadable or malformed file yields the defaults.
    pub fn load_from(path: &Path, root: impl Into<PathBuf>) -> Self {
        let defaults = Self::defaults(root);

        match ConfigOverride::read(path) {
            Ok(Some(overrides)) => {
                tracing::info!("Loaded config from {}", path.display());
                defaults.merge(overrides)
            }
            Ok(None) => defaults,
            Err(e) => {
                tracing::warn!("Ignoring config override: {}", e);
                defaults
            }
        }
    }

    /// Shallow merge: present fields replace default fields wholesale.
    pub fn merge(mut self, overrides: ConfigOverride) -> Self {
        if let Some(build) = overrides.build {
            if let Some(src) = build.src {
                self.build.src = src;
            }
            if let Some(dist) = build.dist {
                self.build.dist = dist;
            }
            if let Some(temp) = build.temp {
                self.build.temp = temp;
            }
            if let Some(public) = build.public {
                self.build.public = public;
            }
            if let Some(paths) = build.paths {
                self.build.paths = paths;
            }
        }
        if let Some(data) = overrides.data {
            self.data = data;
        }
        self
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root.join(&self.build.src)
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.root.join(&self.build.dist)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(&self.build.temp)
    }

    pub fn public_dir(&self) -> PathBuf {
        self.root.join(&self.build.public)
    }

    /// Dependency directory exposed by the dev server at `/node_modules`.
    pub fn node_modules_dir(&self) -> PathBuf {
        self.root.join("node_modules")
    }
}
