//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Keep an API operation catalog in sync, list it, and call its endpoints
#[derive(Parser, Debug)]
#[command(name = "mcp-api-catalog")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "API_CATALOG_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "API_CATALOG_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "API_CATALOG_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Refresh stored descriptors from the live API description
    Sync {
        /// Add descriptors for live operations missing from the catalog
        #[arg(long)]
        add_missing: bool,

        /// Read the description from a local JSON file instead of the configured URL
        #[arg(long)]
        from_file: Option<PathBuf>,
    },

    /// List catalog endpoints
    List {
        /// Only endpoints with this HTTP method
        #[arg(short, long)]
        method: Option<String>,

        /// Only endpoints whose category or tags contain this text
        #[arg(short = 'C', long)]
        category: Option<String>,

        /// Case-insensitive search in name, description and path
        #[arg(short, long)]
        search: Option<String>,

        /// Include tags, path parameter and body hints
        #[arg(short, long)]
        details: bool,
    },

    /// Execute one catalog endpoint
    Execute {
        /// Path template exactly as listed (e.g. "/pages/{id}")
        #[arg(short, long)]
        path: String,

        /// HTTP method
        #[arg(short, long)]
        method: String,

        /// JSON object of path, query and body values
        #[arg(long, default_value = "{}")]
        params: String,

        /// Skip the required-parameter check
        #[arg(long)]
        no_validate: bool,
    },

    /// Print the callable tool definitions as JSON
    Tools,
}
