use clap::Parser;

use dentalsim::config::Config;
use dentalsim::{logging, pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    logging::init(config.verbose);

    let summary = pipeline::run(&config).await?;
    tracing::debug!(rows = summary.row_counts.total(), "run finished");
    Ok(())
}
