//! Configuration, stages and task graph for the pages asset pipeline.
//!
//! A [`Config`] is resolved once, a [`FilterRegistry`] maps every stage to
//! its filter chain, and [`Pipeline`] wires the stages into the public
//! `clean`, `compile` and `build` task graphs.

pub mod clean;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod stage;
pub mod task;

pub use clean::Cleanup;
pub use config::{BuildSettings, Config, ConfigError, ConfigOverride, Paths, CONFIG_FILE};
pub use error::PipelineError;
pub use pipeline::Pipeline;
pub use registry::FilterRegistry;
pub use stage::{Stage, StageKind, StageReport};
pub use task::{Task, TaskFuture};
