// src/cli/plugin.rs
//! Plugin registry commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum PluginCommands {
    /// List plugins offered by the registry
    Available {
        /// Registry URL (defaults to the configured registry)
        #[arg(long)]
        registry: Option<String>,
    },

    /// Download and install a plugin from the registry
    Install {
        /// Plugin id
        id: String,

        /// Registry URL (defaults to the configured registry)
        #[arg(long)]
        registry: Option<String>,

        /// Reinstall even if the same version is present
        #[arg(long)]
        force: bool,
    },

    /// Remove an installed plugin
    Remove {
        /// Plugin id
        id: String,
    },

    /// List plugins discovered on this machine
    List,
}
