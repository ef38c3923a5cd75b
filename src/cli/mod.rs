// src/cli/mod.rs
//! CLI definitions for Aeris
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations live in the `commands` module.
//!
//! Package commands sit at the root level:
//! - `search`, `info` - Find packages across every enabled adapter
//! - `install`, `remove`, `update` - Change packages, routed by adapter
//! - `list`, `updates`, `sync` - Installed state and repository refresh
//!
//! Management contexts:
//! - `repo`, `profile` - Per-adapter repositories and profiles
//! - `adapter` - Enable, disable and inspect adapters
//! - `config` - Aeris-managed adapter settings
//! - `plugin` - Install plugins from the registry

use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

mod adapter;
mod config;
mod plugin;
mod profile;
mod repo;

pub use adapter::AdapterCommands;
pub use config::ConfigCommands;
pub use plugin::PluginCommands;
pub use profile::ProfileCommands;
pub use repo::RepoCommands;

#[derive(Parser)]
#[command(name = "aeris")]
#[command(author = "Aeris Contributors")]
#[command(version)]
#[command(about = "One front-end for many package managers", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Operate on system packages (elevates with pkexec, sudo or doas)
    #[arg(long, global = true)]
    pub system: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    // =========================================================================
    // Package Commands
    // =========================================================================
    /// Search for packages in every enabled adapter
    Search {
        /// Search query
        query: String,

        /// Only search these adapters (repeatable)
        #[arg(short, long = "adapter", value_name = "ID")]
        adapters: Vec<String>,

        /// Maximum results per adapter
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show details for a package (adapter:package)
    Info {
        /// Package as adapter:package-id
        package: String,

        /// Print details as JSON
        #[arg(long)]
        json: bool,
    },

    /// Install packages
    Install {
        /// Packages as adapter:name or plain names
        #[arg(required = true)]
        packages: Vec<String>,

        /// Resolve plain names against this adapter only
        #[arg(short, long, value_name = "ID")]
        adapter: Option<String>,
    },

    /// Remove installed packages
    Remove {
        /// Packages as adapter:name or plain names
        #[arg(required = true)]
        packages: Vec<String>,

        /// Resolve plain names against this adapter only
        #[arg(short, long, value_name = "ID")]
        adapter: Option<String>,
    },

    /// Update packages (everything when no package is given)
    Update {
        /// Packages as adapter:name or plain names
        packages: Vec<String>,

        /// Limit a full update to one adapter
        #[arg(short, long, value_name = "ID")]
        adapter: Option<String>,
    },

    /// List installed packages
    List {
        /// Only list packages from this adapter
        #[arg(short, long, value_name = "ID")]
        adapter: Option<String>,

        /// Print packages as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available updates
    Updates {
        /// Print updates as JSON
        #[arg(long)]
        json: bool,
    },

    /// Refresh repository metadata
    Sync {
        /// Only sync this adapter
        #[arg(short, long, value_name = "ID")]
        adapter: Option<String>,
    },

    /// Run a package without installing it (adapter:package)
    Run {
        /// Package as adapter:package-id
        package: String,

        /// Arguments passed to the package
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Summary of adapters, installed packages and pending updates
    Dashboard,

    // =========================================================================
    // Management Contexts
    // =========================================================================
    /// Repository management
    #[command(subcommand)]
    Repo(RepoCommands),

    /// Profile management
    #[command(subcommand)]
    Profile(ProfileCommands),

    /// Adapter management
    #[command(subcommand)]
    Adapter(AdapterCommands),

    /// Adapter settings
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Plugin management
    #[command(subcommand)]
    Plugin(PluginCommands),

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["aeris", "install", "pacman:ripgrep", "--system", "-vv"])
            .unwrap();
        assert!(cli.system);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Install { packages, adapter } => {
                assert_eq!(packages, vec!["pacman:ripgrep"]);
                assert!(adapter.is_none());
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_run_trailing_args() {
        let cli = Cli::try_parse_from(["aeris", "run", "demo:hello", "--", "--greeting", "hi"])
            .unwrap();
        match cli.command {
            Commands::Run { package, args } => {
                assert_eq!(package, "demo:hello");
                assert_eq!(args, vec!["--greeting", "hi"]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_search_repeated_adapters() {
        let cli = Cli::try_parse_from(["aeris", "search", "vim", "-a", "apt", "-a", "dnf", "--json"])
            .unwrap();
        match cli.command {
            Commands::Search { adapters, json, .. } => {
                assert_eq!(adapters, vec!["apt", "dnf"]);
                assert!(json);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_config_path_flag() {
        let cli = Cli::try_parse_from(["aeris", "list", "--config", "/tmp/aeris.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/aeris.toml")));
        assert!(Cli::try_parse_from(["aeris", "list"]).unwrap().config.is_none());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["aeris", "-q", "-v", "list"]).is_err());
    }
}
