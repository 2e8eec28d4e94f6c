//! Remove generated output.

use anyhow::Result;
use pages_pipeline::{Config, Pipeline};

pub async fn run(config: Config) -> Result<()> {
    Pipeline::new(config).clean().run().await?;
    Ok(())
}
