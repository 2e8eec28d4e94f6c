//! Development server for pages projects.
//!
//! Serves the compiled output with live reload, and re-runs the affected
//! compile stage when a source file changes.

pub mod server;
pub mod watcher;
pub mod websocket;

pub use server::{apply_change, inject_script, DevServer, DevServerConfig, ServerError, DEFAULT_PORT};
pub use watcher::{Debouncer, FileWatcher, WatchTarget, DEBOUNCE};
pub use websocket::{ReloadHub, ReloadMessage};
