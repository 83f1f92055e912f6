//! DiscoveryAI session console binary.

use clap::Parser;
use discoveryai_cli::{Command, config::Config, execute, init_tracing, open_context};

#[derive(Debug, Parser)]
#[command(name = "discoveryai", version, about = "Manage the local DiscoveryAI session")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(&config.log_level);
    tracing::debug!(data_dir = %config.data_dir.display(), "Opening session storage");

    let ctx = open_context(&config)?;
    let result = execute(&ctx, cli.command).await;
    drop(ctx);

    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
