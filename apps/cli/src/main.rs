//! kbfetch CLI - fetch files and manage download settings
//!
//! Thin front end over `kbfetch-core`.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// kbfetch - knowledge base object and file fetcher
#[derive(Parser)]
#[command(name = "kbfetch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Data directory for kbfetch
    #[arg(long, env = "KBFETCH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "human")]
    output: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a URL to a file
    Fetch {
        /// URL to download
        url: String,

        /// Directory to save into (defaults to the temp directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// File name (defaults to a random name)
        #[arg(short, long)]
        name: Option<String>,

        /// Maximum 301 redirects to follow
        #[arg(long)]
        max_redirects: Option<u32>,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show/update settings
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key
        key: String,

        /// Config value
        value: String,
    },

    /// Show all config
    Show,

    /// Reset to defaults
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Determine data directory
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| kbfetch_types::Settings::default().data_dir);

    let store = kbfetch_core::FsLocalStore::new(data_dir).await?;

    match cli.command {
        Commands::Fetch {
            url,
            dir,
            name,
            max_redirects,
            timeout,
        } => {
            let mut settings = store.load_settings().await?;
            if let Some(max_redirects) = max_redirects {
                settings.max_redirects = max_redirects;
            }
            if timeout.is_some() {
                settings.fetch_timeout_secs = timeout;
            }
            commands::fetch(&settings, &url, dir, name, cli.output).await?
        }

        Commands::Config { action } => commands::config_action(&store, action, cli.output).await?,

        Commands::Completions { shell } => {
            use clap::CommandFactory;
            clap_complete::generate(shell, &mut Cli::command(), "kbfetch", &mut std::io::stdout());
        }
    }

    Ok(())
}
