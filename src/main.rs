use clap::Parser;
use pspmigrator::{cli::Cli, config};
use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> pspmigrator::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    cli.init_logging();

    // kube selects rustls; make sure a crypto provider is installed
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Load configuration
    let cwd = std::env::current_dir()?;
    let config = config::load_config(cli.config.as_deref(), &cwd)?;

    pspmigrator::run_command(cli, config).await
}
