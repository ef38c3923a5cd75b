// src/cli/adapter.rs
//! Adapter management commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum AdapterCommands {
    /// List registered adapters
    List {
        /// Print adapters as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show an adapter's capabilities and settings
    Info {
        /// Adapter id
        id: String,
    },

    /// Enable an adapter
    Enable {
        /// Adapter id
        id: String,
    },

    /// Disable an adapter
    Disable {
        /// Adapter id
        id: String,
    },

    /// Check adapter health (all enabled adapters when no id is given)
    Health {
        /// Adapter id
        id: Option<String>,
    },
}
