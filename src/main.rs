use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, error};

use assay::config::AssayConfig;
use assay::pipeline::Pipeline;
use assay::pool::WorkerPool;
use assay::server::{self, AppState};
use assay::templates::TemplateStore;

/// IT asset inventory classification and report orchestration
#[derive(Parser)]
#[command(name = "assay")]
#[command(about = "Classify IT asset inventories and orchestrate assessment reports", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the assessment HTTP service (default command)
    Serve {
        /// Listen port, overriding the PORT environment variable
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        2 => "trace",
        _ => "trace,hyper=debug,tower=debug", // -vvv shows everything including dependencies
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("assay started with verbosity level: {}", cli.verbose);

    let port = match cli.command {
        Some(Commands::Serve { port }) => port,
        None => None,
    };

    if let Err(e) = run_serve(port).await {
        error!("Fatal error: {}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_serve(port_override: Option<u16>) -> anyhow::Result<()> {
    let mut config = AssayConfig::from_env()?;
    if let Some(port) = port_override {
        config.port = port;
    }
    let config = Arc::new(config);

    let templates = Arc::new(TemplateStore::load(config.template_dir.as_deref())?);
    let pipeline = Arc::new(Pipeline::from_config(config.clone(), templates)?);
    let pool = WorkerPool::new(config.max_concurrent_sessions);

    server::serve(AppState {
        config,
        pipeline,
        pool,
    })
    .await?;
    Ok(())
}
