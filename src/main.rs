use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use reportflow::config::Config;
use reportflow::session::LongTextStrategy;

mod cmd;

#[derive(Parser)]
#[command(name = "reportflow")]
#[command(version, about = "Quality-gated report generation for AirSaas project data")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the persisted session and where the workflow stands
    Status,
    /// List the project smartviews available as report scope
    Smartviews,
    /// Reconcile the local session with the backend
    Resume,
    /// Run the generate/evaluate loop for the current session
    Run {
        /// Long-text handling: summarize, ellipsis or omit
        #[arg(long, default_value = "summarize")]
        strategy: LongTextStrategy,

        /// Override the configured iteration budget
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Override the configured acceptance threshold (0-100)
        #[arg(long)]
        threshold: Option<u8>,
    },
    /// Start a new session, carrying reusable artifacts forward
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "reportflow=debug"
    } else {
        "reportflow=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = Config::from_env()?;

    match &cli.command {
        Commands::Status => cmd::cmd_status(&config)?,
        Commands::Smartviews => cmd::cmd_smartviews(&config).await?,
        Commands::Resume => cmd::cmd_resume(&config).await?,
        Commands::Run {
            strategy,
            max_iterations,
            threshold,
        } => cmd::cmd_run(&config, *strategy, *max_iterations, *threshold).await?,
        Commands::Reset { force } => cmd::cmd_reset(&config, *force)?,
    }

    Ok(())
}
