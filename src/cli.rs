use clap::{Parser, Subcommand};

use crate::commands;
use crate::models::SyncConfig;

#[derive(Parser)]
#[command(name = "indexcloses")]
#[command(about = "Daily global index close sync", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server and the daily worker
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one sync now and print the report
    Sync {
        /// Resolve and normalize closes without writing them
        #[arg(long)]
        preview: bool,
    },
    /// Print stored closes
    Show {
        /// Only this index key
        #[arg(short, long)]
        index: Option<String>,
    },
}

pub async fn run() {
    let cli = Cli::parse();

    let config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Serve { port } => {
            commands::serve::run(config, port).await;
        }
        Commands::Sync { preview } => {
            commands::sync::run(config, preview).await;
        }
        Commands::Show { index } => {
            commands::show::run(config, index).await;
        }
    }
}
