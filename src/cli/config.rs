// src/cli/config.rs
//! Adapter settings stored in the Aeris config file

use clap::Subcommand;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the config file, or one adapter's settings
    Show {
        /// Adapter id
        adapter: Option<String>,
    },

    /// Print a setting
    Get {
        /// Adapter id
        adapter: String,

        /// Setting key
        key: String,
    },

    /// Change a setting (validated against the adapter's schema)
    Set {
        /// Adapter id
        adapter: String,

        /// Setting key
        key: String,

        /// New value
        value: String,
    },

    /// Remove a setting, restoring the adapter default
    Unset {
        /// Adapter id
        adapter: String,

        /// Setting key
        key: String,
    },
}
