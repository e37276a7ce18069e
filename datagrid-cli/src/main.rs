use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;

use commands::compile::DialectArg;

/// datagrid - server-side DataTables endpoints over SQLite
#[derive(Parser)]
#[command(name = "datagrid")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Configuration file (defaults to the standard search path)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Validate configured whitelists
    Check {
        /// Endpoint as Resource.Operation (all endpoints if omitted)
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Configuration file (defaults to the standard search path)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Print the SQL a request would run, without touching a database
    Compile {
        /// Endpoint as Resource.Operation
        #[arg(short, long)]
        endpoint: String,

        /// Raw request parameters, e.g. 'draw=1&columns[0][name]=CustomerID'
        #[arg(short, long, default_value = "")]
        query: String,

        /// Placeholder style of the printed SQL
        #[arg(short, long, value_enum, default_value_t = DialectArg::Sqlite)]
        dialect: DialectArg,

        /// Configuration file (defaults to the standard search path)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { config } => commands::serve::execute(config).await,
        Commands::Check { endpoint, config } => commands::check::execute(endpoint, config),
        Commands::Compile {
            endpoint,
            query,
            dialect,
            config,
        } => commands::compile::execute(&endpoint, &query, dialect, config),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);

            if let Some(source) = e.source() {
                eprintln!("\n{} {}", "Caused by:".yellow(), source);
            }

            std::process::exit(1);
        }
    }
}
