//! Public task graphs: `clean`, `compile` and `build`.

use std::sync::Arc;

use crate::clean::Cleanup;
use crate::config::Config;
use crate::registry::FilterRegistry;
use crate::stage::{Stage, StageKind};
use crate::task::Task;

/// Stages and cleanups wired from one configuration.
pub struct Pipeline {
    config: Arc<Config>,
    stages: [Arc<Stage>; 7],
}

impl Pipeline {
    /// Pipeline with the production filter table.
    pub fn new(config: Config) -> Self {
        let registry = FilterRegistry::standard(&config);
        Self::with_registry(config, &registry)
    }

    /// Pipeline with a custom filter table.
    pub fn with_registry(config: Config, registry: &FilterRegistry) -> Self {
        let stages = StageKind::ALL.map(|kind| Arc::new(Stage::from_config(kind, &config, registry)));
        Self {
            config: Arc::new(config),
            stages,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The stage of a given kind.
    pub fn stage(&self, kind: StageKind) -> &Arc<Stage> {
        &self.stages[kind.index()]
    }

    /// One stage as a task.
    pub fn stage_task(&self, kind: StageKind) -> Task {
        Task::Stage(Arc::clone(self.stage(kind)))
    }

    pub fn clean_temp(&self) -> Task {
        Task::clean(Cleanup::new("clean:temp", self.config.temp_dir()))
    }

    pub fn clean_dist(&self) -> Task {
        Task::clean(Cleanup::new("clean:dist", self.config.dist_dir()))
    }

    /// Remove temp and dist concurrently.
    pub fn clean(&self) -> Task {
        Task::all([self.clean_temp(), self.clean_dist()])
    }

    /// Clear temp, then compile styles, scripts and pages concurrently.
    pub fn compile(&self) -> Task {
        self.clean_temp().then(Task::all([
            self.stage_task(StageKind::Style),
            self.stage_task(StageKind::Script),
            self.stage_task(StageKind::Page),
        ]))
    }

    /// Production build.
    ///
    /// `useref` reads the compiled pages, styles and scripts from temp, so it
    /// only starts once the whole compile graph has finished. Images, fonts
    /// and public files go straight to dist alongside it. Temp is removed
    /// once everything is written.
    pub fn build(&self) -> Task {
        self.clean_dist()
            .then(Task::all([
                self.compile().then(self.stage_task(StageKind::Useref)),
                self.stage_task(StageKind::Image),
                self.stage_task(StageKind::Font),
                self.stage_task(StageKind::Extra),
            ]))
            .then(self.clean_temp())
    }
}
