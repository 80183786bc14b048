//! Command-line inspection of RP66 v1 (DLIS) files
//!
//! The `rp66` binary is a thin wrapper: [`Cli`] parses arguments and
//! environment variables, [`run`] loads the physical file and writes a
//! report as text or JSON.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rp66_core::LoadConfig;

pub mod commands;

/// Command-line arguments
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rp66",
    about = "Inspect RP66 v1 (DLIS) well-log files",
    version
)]
pub struct Cli {
    /// Output format
    #[arg(short = 'o', long, value_enum, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// JSON file with load settings
    #[arg(long, global = true, env = "RP66_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bytes searched for the first visible record of each logical file
    #[arg(long, global = true, env = "RP66_SEARCH_LIMIT")]
    pub search_limit: Option<usize>,

    /// Promote objects afresh on every query
    #[arg(long, global = true)]
    pub no_cache: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable
    Text,
    /// Pretty printed JSON
    Json,
}

/// Subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// List the logical files of a physical file
    Files {
        /// DLIS file
        path: PathBuf,
    },

    /// Object types and counts per logical file
    Types {
        /// DLIS file
        path: PathBuf,
    },

    /// Objects matching a type and an optional name
    Objects {
        /// DLIS file
        path: PathBuf,

        /// Object type, a case-insensitive regular expression unless --exact
        #[arg(short = 't', long = "type")]
        object_type: String,

        /// Object name, matched like the type
        #[arg(short, long)]
        name: Option<String>,

        /// Match type and name literally
        #[arg(long)]
        exact: bool,

        /// Resolve references and show their targets
        #[arg(long)]
        links: bool,
    },

    /// Resolve references and list the dangling ones
    Link {
        /// DLIS file
        path: PathBuf,
    },
}

impl Cli {
    /// Load settings: the config file if given, then command-line overrides
    pub fn load_config(&self) -> Result<LoadConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => LoadConfig::default(),
        };
        if let Some(limit) = self.search_limit {
            config = config.with_search_limit(limit);
        }
        if self.no_cache {
            config = config.with_cache_metadata(false);
        }
        Ok(config)
    }
}

/// Execute the parsed command, writing the report to `out`
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<()> {
    let config = cli.load_config()?;
    match &cli.command {
        Commands::Files { path } => commands::files(path, &config, cli.format, out),
        Commands::Types { path } => commands::types(path, &config, cli.format, out),
        Commands::Objects {
            path,
            object_type,
            name,
            exact,
            links,
        } => {
            let query = commands::ObjectQuery {
                object_type,
                name: name.as_deref(),
                exact: *exact,
                links: *links,
            };
            commands::objects(path, &config, &query, cli.format, out)
        }
        Commands::Link { path } => commands::link(path, &config, cli.format, out),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn command_line_overrides_defaults() {
        let cli = Cli::parse_from([
            "rp66",
            "--search-limit",
            "4096",
            "--no-cache",
            "files",
            "well.dlis",
        ]);
        let config = cli.load_config().unwrap();
        assert_eq!(config.visible_record_search_limit, 4096);
        assert!(!config.cache_metadata);
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn config_file_is_read() {
        let file = test_utils::write_temp(br#"{"link_on_load": true, "visible_record_search_limit": 64}"#);
        let cli = Cli::parse_from([
            "rp66",
            "--config",
            file.path().to_str().unwrap(),
            "--search-limit",
            "128",
            "-o",
            "json",
            "types",
            "well.dlis",
        ]);
        let config = cli.load_config().unwrap();
        assert!(config.link_on_load);
        assert_eq!(config.visible_record_search_limit, 128);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn objects_arguments() {
        let cli = Cli::parse_from([
            "rp66", "objects", "well.dlis", "-t", "CHANNEL", "-n", "GR", "--exact",
        ]);
        match cli.command {
            Commands::Objects {
                object_type,
                name,
                exact,
                links,
                ..
            } => {
                assert_eq!(object_type, "CHANNEL");
                assert_eq!(name.as_deref(), Some("GR"));
                assert!(exact);
                assert!(!links);
            }
            other => unreachable!("parsed {other:?}"),
        }
    }
}
