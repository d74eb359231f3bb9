//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::domain::{AppConfig, MessageOrder, OutputFormat};

/// Takeout export - bulk export of account data into browsable files.
#[derive(Parser, Debug)]
#[command(name = "takeout-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an export against a recorded server fixture.
    Export {
        /// Configuration file (defaults to the user config directory).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// JSON fixture of request/answer exchanges.
        #[arg(short, long)]
        replay: PathBuf,

        /// Output directory (overrides the configuration).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: html, json or text.
        #[arg(short, long)]
        format: Option<String>,

        /// Write chat files oldest message first.
        #[arg(long)]
        oldest_first: bool,
    },

    /// Validate the configuration and print the effective settings.
    Check {
        /// Configuration file (defaults to the user config directory).
        config: Option<PathBuf>,
    },

    /// Write the default configuration file if it is missing.
    Init {
        /// Where to write it (defaults to the user config directory).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

impl Cli {
    /// The configuration file named on the command line, if any.
    #[must_use]
    pub fn config_path(&self) -> Option<&Path> {
        match &self.command {
            Commands::Export { config, .. } | Commands::Check { config } => config.as_deref(),
            Commands::Init { .. } => None,
        }
    }

    /// Apply the export flags on top of the loaded configuration.
    ///
    /// # Errors
    /// Returns the parse message for an unknown format.
    pub fn apply_overrides(&self, config: &mut AppConfig) -> Result<(), String> {
        let Commands::Export {
            output,
            format,
            oldest_first,
            ..
        } = &self.command
        else {
            return Ok(());
        };
        if let Some(output) = output {
            config.export.path.clone_from(output);
        }
        if let Some(format) = format {
            config.export.format = format.parse::<OutputFormat>()?;
        }
        if *oldest_first {
            config.export.message_order = MessageOrder::OldestFirst;
        }
        Ok(())
    }
}
