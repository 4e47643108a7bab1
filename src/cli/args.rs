//! Command-line arguments and subcommands.
//!
//! Built with `clap` derive. Argument errors exit with status 2 before any
//! command runs.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "blockforge",
    version,
    about = "Parse, round-trip, validate and rewrite visual robot programs."
)]
pub struct BlockforgeArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the AST of a block-graph document.
    Parse {
        #[arg(required = true)]
        file: PathBuf,
        /// Accept the extension blocks of this platform only.
        #[arg(long)]
        platform: Option<String>,
    },
    /// Check that documents survive parse → render unchanged.
    Roundtrip {
        /// A document, or a directory searched for `*.json` documents.
        #[arg(required = true)]
        path: PathBuf,
        #[arg(long)]
        platform: Option<String>,
    },
    /// Validate a program against a hardware configuration.
    Validate {
        #[arg(required = true)]
        file: PathBuf,
        /// YAML or JSON hardware configuration.
        #[arg(long, short)]
        config: PathBuf,
        /// Print the document with the diagnostics attached as annotations.
        #[arg(long)]
        annotate: bool,
    },
    /// Fold constant expressions and print the rewritten document.
    Fold {
        #[arg(required = true)]
        file: PathBuf,
        #[arg(long)]
        platform: Option<String>,
    },
    /// List the known platforms.
    Platforms,
}
