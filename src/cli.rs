use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hdspush")]
#[command(author, version, about = "Split live HDS segments into fragments and push them to an origin")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch encoder output and push fragments until interrupted
    Watch {
        /// Directory to watch (repeatable; replaces configured paths)
        #[arg(short, long = "source")]
        sources: Vec<PathBuf>,

        /// Write to this directory instead of the configured sink
        #[arg(short, long, conflicts_with = "url")]
        destination: Option<PathBuf>,

        /// PUT to this origin URL instead of the configured sink
        #[arg(long)]
        url: Option<String>,
    },

    /// Split segment index files into fragment files
    Split {
        /// `.f4x` index files; the `.f4f` sibling must sit next to each
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        destination: PathBuf,

        /// Replace fragment files that already exist
        #[arg(short = 'F', long)]
        force_overwrite: bool,
    },

    /// Decode an HDS file and print its boxes
    Inspect {
        /// `.f4x`, `.f4f` or `.bootstrap` file
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Estimate the newest fragment from a bootstrap file
    LiveEdge {
        /// `.bootstrap` file
        #[arg(required = true)]
        bootstrap: PathBuf,

        /// Truncate times to whole seconds before dividing
        #[arg(long)]
        whole_seconds: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
