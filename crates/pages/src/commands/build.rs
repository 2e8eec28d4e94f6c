//! Production build command.

use std::time::Instant;

use anyhow::Result;
use pages_pipeline::{Config, Pipeline};

/// Run the build command.
pub async fn run(config: Config) -> Result<()> {
    let start = Instant::now();
    let pipeline = Pipeline::new(config);

    pipeline.build().run().await?;

    tracing::info!(
        "Build complete in {:.2}s, output in {}",
        start.elapsed().as_secs_f64(),
        pipeline.config().dist_dir().display()
    );

    Ok(())
}
