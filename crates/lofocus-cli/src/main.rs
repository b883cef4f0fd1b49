use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lofocus_core::Config;

mod commands;

#[derive(Parser)]
#[command(name = "lofocus", version, about = "Lofocus focus timer CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Session statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print a shell completion script
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

/// Logs go to stderr. `LOFOCUS_LOG` wins over the config file.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_env("LOFOCUS_LOG")
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(command: Commands, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Timer { action } => {
            let ctx = commands::AppContext::open(config)?;
            commands::timer::run(action, &ctx).await
        }
        Commands::Stats { action } => {
            let ctx = commands::AppContext::open(config)?;
            commands::stats::run(action, &ctx).await
        }
        Commands::Config { action } => commands::config::run(action, config).await,
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::load_or_default();
    init_tracing(&config);

    if let Err(e) = dispatch(cli.command, config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
