// src/cli/repo.rs
//! Repository management commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum RepoCommands {
    /// List repositories of an adapter
    List {
        /// Adapter to query
        #[arg(short, long, value_name = "ID")]
        adapter: String,
    },

    /// Add a repository
    Add {
        /// Repository name
        name: String,

        /// Repository URL
        url: String,

        /// Adapter to add the repository to
        #[arg(short, long, value_name = "ID")]
        adapter: String,

        /// Optional description
        #[arg(long)]
        description: Option<String>,

        /// Add the repository disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Remove a repository
    Remove {
        /// Repository name
        name: String,

        #[arg(short, long, value_name = "ID")]
        adapter: String,
    },

    /// Enable a repository
    Enable {
        /// Repository name
        name: String,

        #[arg(short, long, value_name = "ID")]
        adapter: String,
    },

    /// Disable a repository
    Disable {
        /// Repository name
        name: String,

        #[arg(short, long, value_name = "ID")]
        adapter: String,
    },
}
