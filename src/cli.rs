//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use songbridge_core::model::ServiceKind;

/// Resolve a music link into equivalent links on other streaming services.
///
/// Prints the result as JSON, or one URL per line with --headless.
#[derive(Parser, Debug)]
#[command(name = "songbridge")]
#[command(author, version, about)]
#[command(group(ArgGroup::new("target").required(true).args(["link", "search_id"])))]
pub struct Args {
    /// Link to a song, album, playlist, artist or podcast
    pub link: Option<String>,

    /// Resolve the id of an earlier result instead of a link
    #[arg(long, value_name = "ID")]
    pub search_id: Option<String>,

    /// Services to resolve on, comma-separated (default: all)
    #[arg(short, long, value_delimiter = ',', value_name = "SERVICES")]
    pub adapters: Vec<ServiceKind>,

    /// Print only the resolved URLs, one per line
    #[arg(long)]
    pub headless: bool,

    /// Config file (key = value lines); environment variables override it
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Log level used when `RUST_LOG` is unset.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
