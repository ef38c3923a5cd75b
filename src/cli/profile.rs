// src/cli/profile.rs
//! Profile commands for adapters with named environments

use clap::Subcommand;

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// List profiles and mark the active one
    List {
        #[arg(short, long, value_name = "ID")]
        adapter: String,
    },

    /// Make a profile active
    Switch {
        /// Profile id
        profile: String,

        #[arg(short, long, value_name = "ID")]
        adapter: String,
    },
}
