//! IXCache CLI
//!
//! Command-line tools for inspecting and exercising an IXCache deployment.
//!
//! # Commands
//!
//! - `topology` - Validate a cluster topology file and print it
//! - `route` - Show which cluster and node owns each index id
//! - `decode` - Decode a hex-encoded request, reply or batch
//! - `simulate` - Run a paged query against an in-process cluster

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// IXCache command-line tools.
#[derive(Parser)]
#[command(name = "ixcache")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a topology file and print its clusters
    Topology {
        /// Path to the topology JSON
        file: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the placement of index ids
    Route {
        /// Number of clusters (ignored when a topology is given)
        #[arg(short, long, default_value = "1")]
        clusters: usize,

        /// Topology JSON to resolve cluster and node names
        #[arg(short, long)]
        topology: Option<PathBuf>,

        /// Index ids, hex encoded
        #[arg(required = true)]
        ids: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decode a hex-encoded message
    Decode {
        /// Message bytes, hex encoded
        hex: String,

        /// How to read the bytes (auto, request, response, batch)
        #[arg(short, long, default_value = "auto")]
        kind: String,
    },

    /// Load sample indexes into an in-process cluster and page across them
    Simulate {
        /// Number of clusters
        #[arg(short, long, default_value = "2")]
        clusters: usize,

        /// Number of indexes
        #[arg(short, long, default_value = "4")]
        indexes: u32,

        /// Entries per index
        #[arg(short = 'n', long, default_value = "10")]
        items: u32,

        /// Page size
        #[arg(long, default_value = "5")]
        page_size: i32,

        /// Page number, 1-based
        #[arg(long, default_value = "1")]
        page_num: i32,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Topology { file, format } => {
            commands::topology::run(&file, &format)?;
        }
        Commands::Route {
            clusters,
            topology,
            ids,
            format,
        } => {
            commands::route::run(clusters, topology.as_deref(), &ids, &format)?;
        }
        Commands::Decode { hex, kind } => {
            commands::decode::run(&hex, &kind)?;
        }
        Commands::Simulate {
            clusters,
            indexes,
            items,
            page_size,
            page_num,
            format,
        } => {
            let options = commands::simulate::SimulateOptions {
                clusters,
                indexes,
                items,
                page_size,
                page_num,
            };
            commands::simulate::run(&options, &format)?;
        }
        Commands::Version => {
            println!("IXCache CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
