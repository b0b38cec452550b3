//! # Arbor CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database
//! - `status` - Show node and partition counts
//! - `partitions` - List partition tabs
//! - `tree` - Print the forest of a partition
//! - `add` - Create a node
//! - `move` - Change the parent of a node
//! - `remove` - Delete a leaf node
//! - `descendants` - List the descendants of a node
//! - `compact` - Compact the redb database

mod commands;

use crate::config::{ArborConfig, BackendKind};
use crate::error::AppError;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Arbor - admin menu and content column tree server
///
/// Stores menus and columns as flat parent-pointer rows and serves them as
/// ordered, cycle-free trees.
#[derive(Parser, Debug)]
#[command(name = "arbor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the tree database (overrides config and ARBOR_DATABASE)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" (ACID database) or "memory" (volatile)
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Node kind accepted by `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Menu,
    Column,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty database
    Init {
        /// Overwrite an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Show node and partition counts
    Status,

    /// List partition tabs
    Partitions,

    /// Print the forest of a partition
    Tree {
        /// Partition key
        partition: String,

        /// Include inactive nodes
        #[arg(short, long)]
        all: bool,
    },

    /// Create a node
    Add {
        /// Partition key
        #[arg(short = 'P', long)]
        partition: String,

        /// Node title
        #[arg(short, long)]
        title: String,

        /// Parent node id (0 for a root)
        #[arg(short, long, default_value = "0")]
        parent: u64,

        /// Node kind
        #[arg(short, long, value_enum, default_value = "menu")]
        kind: KindArg,

        /// Sibling order key
        #[arg(short, long)]
        order: Option<i64>,

        /// Menu route or column URL
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Change the parent of a node
    Move {
        /// Node to move
        id: u64,

        /// New parent id (0 for a root)
        parent: u64,
    },

    /// Delete a leaf node
    Remove {
        /// Node to delete
        id: u64,
    },

    /// List the descendants of a node
    Descendants {
        /// Start node
        id: u64,

        /// Maximum depth (default from config)
        #[arg(short, long)]
        depth: Option<usize>,
    },

    /// Compact the redb database
    Compact,
}

impl Cli {
    /// Configuration with the global flags applied on top.
    pub fn load_config(&self) -> Result<ArborConfig, AppError> {
        let mut config = ArborConfig::load(self.config.as_deref())?;
        if let Some(path) = &self.database {
            config.storage.path = path.clone();
        }
        if let Some(backend) = &self.backend {
            config.storage.backend = BackendKind::parse(backend)?;
        }
        Ok(config)
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let config = cli.load_config()?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(config, host, port).await,
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::Partitions) => cmd_partitions(&config, json_mode),
        Some(Commands::Tree { partition, all }) => cmd_tree(&config, json_mode, &partition, all),
        Some(Commands::Add {
            partition,
            title,
            parent,
            kind,
            order,
            url,
        }) => cmd_add(
            &config,
            json_mode,
            AddArgs {
                partition,
                title,
                parent,
                kind,
                order,
                url,
            },
        ),
        Some(Commands::Move { id, parent }) => cmd_move(&config, json_mode, id, parent),
        Some(Commands::Remove { id }) => cmd_remove(&config, json_mode, id),
        Some(Commands::Descendants { id, depth }) => {
            cmd_descendants(&config, json_mode, id, depth)
        }
        Some(Commands::Compact) => cmd_compact(&config),
        Some(Commands::Status) | None => cmd_status(&config, json_mode),
    }
}
