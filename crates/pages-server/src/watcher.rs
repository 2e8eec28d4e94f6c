//! File watching for the development server.
//!
//! The watcher reports raw changed paths. [`WatchTarget::classify`] decides
//! what a change means for the pipeline, and [`Debouncer`] holds each target
//! back until its changes have been quiet for the debounce window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use pages_pipeline::{Pipeline, StageKind};
use tokio::sync::mpsc as async_mpsc;
use tokio::time::Instant;

/// Window in which repeated changes to one target are collapsed.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// What a file change should trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchTarget {
    /// Re-run one compile stage, then reload.
    Stage(StageKind),
    /// Reload connected browsers without rebuilding.
    Reload,
}

impl WatchTarget {
    /// Classify a changed path against the pipeline's directories and globs.
    ///
    /// Sources matching the style, script or page globs re-run that stage.
    /// Images, fonts and anything under `public` only reload. Other source
    /// files (layouts, partials) are ignored.
    pub fn classify(pipeline: &Pipeline, path: &Path) -> Option<Self> {
        let config = pipeline.config();

        if let Some(relative) = relative_to(path, &config.src_dir()) {
            for kind in [StageKind::Style, StageKind::Script, StageKind::Page] {
                if pipeline.stage(kind).matches(&relative) {
                    return Some(WatchTarget::Stage(kind));
                }
            }
            for kind in [StageKind::Image, StageKind::Font] {
                if pipeline.stage(kind).matches(&relative) {
                    return Some(WatchTarget::Reload);
                }
            }
            return None;
        }

        relative_to(path, &config.public_dir()).map(|_| WatchTarget::Reload)
    }
}

/// `path` relative to `dir`, also trying the canonical form of `dir` since
/// the OS may report resolved paths.
fn relative_to(path: &Path, dir: &Path) -> Option<PathBuf> {
    if let Ok(relative) = path.strip_prefix(dir) {
        return Some(relative.to_path_buf());
    }
    let canonical = dir.canonicalize().ok()?;
    path.strip_prefix(canonical).ok().map(Path::to_path_buf)
}

/// Per-target trailing debounce.
///
/// A target becomes due once no change to it has been seen for the whole
/// window, so a burst of saves triggers a single run after the last one.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<WatchTarget, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Record a change to `target` at `now`, restarting its quiet period.
    pub fn touch(&mut self, target: WatchTarget, now: Instant) {
        self.pending.insert(target, now);
    }

    /// Earliest instant at which a pending target can become due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().map(|last| *last + self.window)
    }

    /// Remove and return every target that has been quiet for the window.
    pub fn due(&mut self, now: Instant) -> Vec<WatchTarget> {
        let window = self.window;
        let due: Vec<WatchTarget> = self
            .pending
            .iter()
            .filter(|(_, last)| now.duration_since(**last) >= window)
            .map(|(target, _)| *target)
            .collect();
        for target in &due {
            self.pending.remove(target);
        }
        due
    }
}

/// Recursive watcher over a set of directories.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch every existing directory in `paths`.
    ///
    /// Returns the watcher and a channel of changed paths. The watcher must be
    /// kept alive for events to keep flowing.
    pub fn new(paths: &[PathBuf]) -> Result<(Self, async_mpsc::Receiver<PathBuf>), notify::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })?;

        for path in paths {
            if path.exists() {
                watcher.watch(path, RecursiveMode::Recursive)?;
                tracing::debug!("Watching {}", path.display());
            }
        }

        std::thread::spawn(move || {
            while let Ok(event) = sync_rx.recv() {
                if !is_change(&event.kind) {
                    continue;
                }
                for path in event.paths {
                    if async_tx.blocking_send(path).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
