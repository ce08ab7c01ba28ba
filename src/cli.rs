//! CLI argument parsing for ctree.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ctree",
    about = "A persistent dependency graph of code elements",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/ctree/logs/ctree.log"
)]
pub struct Cli {
    /// Directory that holds knowledge-tree/ (default: current directory)
    #[arg(short = 'w', long, global = true, env = "CTREE_WORKING_DIR")]
    pub working_dir: Option<PathBuf>,

    /// Print the raw JSON tool result
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the knowledge tree in the working directory
    Init,

    /// Add a new code element
    Add {
        /// Element ID
        id: String,

        /// Element type (function, module, constant, variable)
        #[arg(short = 't', long = "type", default_value = "function")]
        kind: String,

        /// Source code
        #[arg(short, long, default_value = "")]
        code: String,

        /// Read the source code from a file instead
        #[arg(long, conflicts_with = "code")]
        code_file: Option<PathBuf>,

        /// What the element does
        #[arg(short = 'D', long, default_value = "")]
        description: String,

        /// Dependencies (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        deps: Vec<String>,

        /// Originating file
        #[arg(long)]
        source_file: Option<String>,

        /// Line range, e.g. 33490-33511
        #[arg(long)]
        line_range: Option<String>,
    },

    /// Update fields of an existing element
    Update {
        /// Element ID
        id: String,

        #[arg(short, long)]
        code: Option<String>,

        #[arg(short = 'D', long)]
        description: Option<String>,

        /// Replacement dependencies (comma-separated)
        #[arg(short, long, value_delimiter = ',', conflicts_with = "clear_deps")]
        deps: Option<Vec<String>>,

        /// Replace the dependencies with an empty list
        #[arg(long)]
        clear_deps: bool,

        #[arg(long)]
        source_file: Option<String>,

        #[arg(long)]
        line_range: Option<String>,
    },

    /// Replace, add or remove dependencies
    Deps {
        /// Element ID
        id: String,

        /// Dependency IDs
        #[arg(value_delimiter = ',')]
        deps: Vec<String>,

        /// replace, add, or remove
        #[arg(short, long, default_value = "replace")]
        op: String,
    },

    /// Show an element
    Get {
        /// Element ID
        id: String,
    },

    /// List all elements
    List,

    /// Remove an element and scrub references to it
    Remove {
        /// Element ID
        id: String,
    },

    /// Report dependencies that name no element
    Missing {
        /// Only check this element
        id: Option<String>,
    },

    /// Show the dependency tree
    Tree {
        /// Root element (default: every element without dependents)
        root: Option<String>,

        /// Maximum depth below the root
        #[arg(short, long, default_value = "3")]
        max_depth: usize,
    },

    /// Show statistics and health metrics
    Stats,

    /// Import functions from an analysis text file
    Import {
        /// File to scan
        file: PathBuf,

        /// Only import the function with this name
        #[arg(long)]
        only: Option<String>,

        /// Skip dependency hint extraction
        #[arg(long)]
        no_auto_extract: bool,
    },

    /// Show where the knowledge tree is stored
    Info,

    /// Serve the tools over stdio (MCP)
    Serve,

    /// Run the daemon in foreground
    Daemon,

    /// Stop the running daemon
    DaemonStop,

    /// Check daemon status
    DaemonStatus,
}
