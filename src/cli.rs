use clap::{Parser, Subcommand};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "careerflow")]
#[command(about = "Careerflow CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the Careerflow API service
    Api(ApiArgs),

    /// Run the Careerflow orchestrator worker pool
    Worker(WorkerArgs),
}

#[derive(clap::Args, Debug)]
pub struct ApiArgs {
    /// Address to bind the API server to
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub address: SocketAddr,

    /// Path to the Fjall data directory (job store + work queue)
    #[arg(long)]
    pub data_path: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct WorkerArgs {
    /// Number of orchestrator workers (overrides config)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Path to the Fjall data directory (job store + work queue)
    #[arg(long)]
    pub data_path: Option<String>,
}
