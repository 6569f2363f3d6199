use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "songforged")]
#[command(author, version, about = "Song upload ingestion tool")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest an audio file into the media store
    Ingest {
        /// Audio file to ingest
        #[arg(required = true)]
        file: PathBuf,

        /// Artist name
        #[arg(long)]
        artist: String,

        /// Song title
        #[arg(long)]
        title: String,

        /// Lyrics sidecar (.lrc or .vtt)
        #[arg(long)]
        lyrics: Option<PathBuf>,

        /// Output the stored artifact as JSON
        #[arg(long)]
        json: bool,
    },

    /// Detect the duration of an audio file
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
