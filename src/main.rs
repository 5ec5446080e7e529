mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use careerflow::{api, orchestrator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Api(args) => api::run(args.address, args.data_path).await?,
        Commands::Worker(args) => orchestrator::run(args.workers, args.data_path).await?,
    }

    Ok(())
}
