use clap::{Parser, Subcommand};

mod cli;

use cli::run::RunArgs;
use cli::LogFormat;

#[derive(Parser)]
#[command(name = "nexus-agent")]
#[command(about = "Sidecar agent that keeps a live link to the Nexus orchestrator", long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the orchestrator and serve the health probe (default)
    Run(RunArgs),
    /// List built-in agent presets
    Presets,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real deployments set the environment directly.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    cli::init_logging(cli.log_format);

    match cli.command {
        Some(Commands::Run(args)) => cli::run::cmd_run(args).await?,
        None => cli::run::cmd_run(RunArgs::default()).await?,
        Some(Commands::Presets) => cli::presets::cmd_presets(),
        Some(Commands::Version) => {
            println!("nexus-agent {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
