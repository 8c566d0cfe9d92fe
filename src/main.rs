use std::sync::Arc;

use clap::Parser;
use tracing::error;

use volley::load::ReqwestTransport;
use volley::{logging, Cli, Orchestrator};

#[tokio::main]
async fn main() -> volley::Result<()> {
    let cli = Cli::parse();

    // The file has to be read before logging starts: it may name the log file.
    let raw = cli.load()?;
    logging::init(&raw.log_file(), raw.log_format())?;

    let transport = match ReqwestTransport::new() {
        Ok(transport) => Arc::new(transport),
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return Err(e);
        }
    };

    let orchestrator = Orchestrator::new(transport);
    orchestrator.run(raw).await?;

    Ok(())
}
