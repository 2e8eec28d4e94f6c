//! Sequential and parallel task composition.
//!
//! A [`Task`] is a stage, a cleanup, or an ordering over other tasks:
//!
//! * `a.then(b)`: `b` starts only after `a` completed successfully.
//! * `Task::all([a, b])`: `a` and `b` run concurrently; the composite waits
//!   for both and fails if either failed.
//!
//! There is no cancellation: once started, every member of a parallel group
//! runs to completion even when a sibling has already failed.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;

use crate::clean::Cleanup;
use crate::error::PipelineError;
use crate::stage::Stage;

/// Boxed future returned by [`Task::run`].
pub type TaskFuture<'a> = Pin<Box<dyn Future<Output = Result<(), PipelineError>> + Send + 'a>>;

/// A runnable composition of stages and cleanups.
#[derive(Clone)]
pub enum Task {
    Stage(Arc<Stage>),
    Clean(Arc<Cleanup>),
    Series(Arc<[Task]>),
    Parallel(Arc<[Task]>),
}

impl Task {
    pub fn stage(stage: Stage) -> Self {
        Task::Stage(Arc::new(stage))
    }

    pub fn clean(cleanup: Cleanup) -> Self {
        Task::Clean(Arc::new(cleanup))
    }

    /// Run `tasks` concurrently and wait for all of them.
    pub fn all(tasks: impl IntoIterator<Item = Task>) -> Self {
        Task::Parallel(tasks.into_iter().collect())
    }

    /// Run `next` after `self` completes.
    pub fn then(self, next: Task) -> Self {
        match self {
            Task::Series(tasks) => {
                let mut tasks = tasks.to_vec();
                tasks.push(next);
                Task::Series(tasks.into())
            }
            other => Task::Series(vec![other, next].into()),
        }
    }

    /// Display name, e.g. `series(clean:temp, parallel(style, script, page))`.
    pub fn name(&self) -> String {
        fn join(tasks: &[Task]) -> String {
            tasks.iter().map(Task::name).collect::<Vec<_>>().join(", ")
        }

        match self {
            Task::Stage(stage) => stage.kind().name().to_string(),
            Task::Clean(cleanup) => cleanup.name().to_string(),
            Task::Series(tasks) => format!("series({})", join(tasks)),
            Task::Parallel(tasks) => format!("parallel({})", join(tasks)),
        }
    }

    /// Execute the task graph.
    pub fn run(&self) -> TaskFuture<'_> {
        match self {
            Task::Stage(stage) => Box::pin(async move { stage.run().await.map(|_| ()) }),

            Task::Clean(cleanup) => Box::pin(async move {
                let start = Instant::now();
                tracing::info!("Starting '{}'...", cleanup.name());
                cleanup.run().await?;
                tracing::info!(
                    "Finished '{}' after {}ms",
                    cleanup.name(),
                    start.elapsed().as_millis()
                );
                Ok(())
            }),

            Task::Series(tasks) => Box::pin(async move {
                for task in tasks.iter() {
                    task.run().await?;
                }
                Ok(())
            }),

            Task::Parallel(tasks) => Box::pin(async move {
                let mut set = JoinSet::new();
                for task in tasks.iter().cloned() {
                    set.spawn(async move { task.run().await });
                }

                let mut first_error = None;
                while let Some(joined) = set.join_next().await {
                    let result = joined.map_err(PipelineError::from).and_then(|r| r);
                    if let Err(e) = result {
                        tracing::error!("{}", e);
                        first_error.get_or_insert(e);
                    }
                }

                match first_error {
                    Some(e) => Err(e),
                    None => Ok(()),
                }
            }),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageKind;
    use pages_filters::{Asset, Filter, FilterError};
    use std::fs;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Records when it runs, optionally after a delay.
    struct Probe {
        label: &'static str,
        delay: Duration,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Filter for Probe {
        fn name(&self) -> &'static str {
            self.label
        }

        fn apply(&self, asset: Asset) -> Result<Vec<Asset>, FilterError> {
            std::thread::sleep(self.delay);
            self.log.lock().unwrap().push(self.label.to_string());
            if self.fail {
                return Err(FilterError::Script(self.label.to_string()));
            }
            Ok(vec![asset])
        }
    }

    fn probe_stage(
        dir: &std::path::Path,
        label: &'static str,
        delay_ms: u64,
        fail: bool,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Task {
        let base = dir.join(label);
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("file.txt"), label).unwrap();

        Task::stage(Stage::new(
            StageKind::Extra,
            base,
            Some("*.txt".to_string()),
            dir.join("out").join(label),
            vec![Arc::new(Probe {
                label,
                delay: Duration::from_millis(delay_ms),
                log: Arc::clone(log),
                fail,
            })],
        ))
    }

    #[tokio::test]
    async fn series_runs_in_order() {
        let temp = tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let task = probe_stage(temp.path(), "a", 100, false, &log)
            .then(probe_stage(temp.path(), "b", 0, false, &log));
        task.run().await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn parallel_waits_for_every_member() {
        let temp = tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let task = Task::all([
            probe_stage(temp.path(), "slow", 150, false, &log),
            probe_stage(temp.path(), "fast", 0, false, &log),
        ])
        .then(probe_stage(temp.path(), "after", 0, false, &log));
        task.run().await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[2], "after");
    }

    #[tokio::test]
    async fn parallel_failure_fails_composite_but_siblings_finish() {
        let temp = tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let task = Task::all([
            probe_stage(temp.path(), "broken", 0, true, &log),
            probe_stage(temp.path(), "sibling", 100, false, &log),
        ])
        .then(probe_stage(temp.path(), "skipped", 0, false, &log));

        let err = task.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::Filter { .. }));

        let log = log.lock().unwrap();
        assert!(log.contains(&"sibling".to_string()));
        assert!(!log.contains(&"skipped".to_string()));
        assert!(temp.path().join("out/sibling/file.txt").exists());
    }

    #[test]
    fn names_describe_the_graph() {
        let task = Task::clean(Cleanup::new("clean:temp", "t"))
            .then(Task::all([
                Task::clean(Cleanup::new("a", "a")),
                Task::clean(Cleanup::new("b", "b")),
            ]))
            .then(Task::clean(Cleanup::new("c", "c")));

        assert_eq!(task.name(), "series(clean:temp, parallel(a, b), c)");
    }
}
