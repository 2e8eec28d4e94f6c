//! Development server command.

use anyhow::Result;
use pages_pipeline::{Config, Pipeline};
use pages_server::{DevServer, DevServerConfig};

/// Compile into temp, then serve until interrupted.
pub async fn run(config: Config, port: u16, open: bool) -> Result<()> {
    let pipeline = Pipeline::new(config);
    pipeline.compile().run().await?;

    let config = DevServerConfig {
        port,
        open,
        ..Default::default()
    };

    DevServer::new(pipeline, config).start().await?;

    Ok(())
}
