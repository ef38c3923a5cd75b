// src/main.rs

use aeris::adapters::{self, SystemRunner};
use aeris::plugin::load_all_plugins;
use aeris::{Adapter, AdapterManager, AerisConfig, PackageMode, PrivilegeManager};
use anyhow::{Context as _, Result};
use clap::{CommandFactory, Parser};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{
    AdapterCommands, Cli, Commands, ConfigCommands, PluginCommands, ProfileCommands, RepoCommands,
};
use commands::Context;

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

/// Register the built-in adapters found on this host and every loadable plugin
async fn build_manager(config: &AerisConfig) -> AdapterManager {
    let mut manager = AdapterManager::new();

    let privilege = PrivilegeManager::with_cache_duration(config.elevation_cache_duration());
    let runner = SystemRunner::shared(privilege);
    for adapter in adapters::detect_builtin_adapters(config, runner) {
        manager.register(adapter);
    }

    for (dir, loaded) in load_all_plugins(config.plugin_timeout()).await {
        let Ok(plugin) = loaded else {
            continue;
        };
        let id = plugin.info().id.clone();
        if adapters::is_builtin(&id) {
            warn!(
                "Plugin at {} uses the built-in id '{}', skipping",
                dir.display(),
                id
            );
            continue;
        }
        debug!("Loaded plugin {} from {}", id, dir.display());
        manager.register(Arc::new(plugin));
    }

    let disabled: HashSet<String> = config.disabled_adapters.iter().cloned().collect();
    manager.set_disabled(disabled);
    manager
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "aeris", &mut std::io::stdout());
        return Ok(());
    }

    let config_path = cli.config.clone().unwrap_or_else(AerisConfig::config_path);
    let config = if cli.config.is_some() {
        AerisConfig::load_from(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        AerisConfig::load()
    };

    let mode = if cli.system {
        PackageMode::System
    } else {
        config.default_mode()
    };
    let explicit_mode = cli.system || config.default_mode.is_some();
    info!("Aeris {} starting in {} mode", env!("CARGO_PKG_VERSION"), mode);

    let mut manager = build_manager(&config).await;
    manager.set_mode_fallback(!explicit_mode);
    let mut ctx = Context {
        manager,
        config,
        config_path,
        mode,
        quiet: cli.quiet,
    };

    match cli.command {
        // =====================================================================
        // Package Commands
        // =====================================================================
        Commands::Search {
            query,
            adapters,
            limit,
            json,
        } => commands::cmd_search(&ctx, &query, &adapters, limit, json).await,

        Commands::Info { package, json } => commands::cmd_info(&ctx, &package, json).await,

        Commands::Install { packages, adapter } => {
            commands::cmd_install(&ctx, &packages, adapter.as_deref()).await
        }

        Commands::Remove { packages, adapter } => {
            commands::cmd_remove(&ctx, &packages, adapter.as_deref()).await
        }

        Commands::Update { packages, adapter } => {
            commands::cmd_update(&ctx, &packages, adapter.as_deref()).await
        }

        Commands::List { adapter, json } => {
            commands::cmd_list(&ctx, adapter.as_deref(), json).await
        }

        Commands::Updates { json } => commands::cmd_updates(&ctx, json).await,

        Commands::Sync { adapter } => commands::cmd_sync(&ctx, adapter.as_deref()).await,

        Commands::Run { package, args } => commands::cmd_run(&ctx, &package, &args).await,

        Commands::Dashboard => commands::cmd_dashboard(&ctx).await,

        // =====================================================================
        // Management Contexts
        // =====================================================================
        Commands::Repo(cmd) => match cmd {
            RepoCommands::List { adapter } => commands::cmd_repo_list(&ctx, &adapter).await,
            RepoCommands::Add {
                name,
                url,
                adapter,
                description,
                disabled,
            } => {
                commands::cmd_repo_add(&ctx, &adapter, &name, &url, description.as_deref(), disabled)
                    .await
            }
            RepoCommands::Remove { name, adapter } => {
                commands::cmd_repo_remove(&ctx, &adapter, &name).await
            }
            RepoCommands::Enable { name, adapter } => {
                commands::cmd_repo_set_enabled(&ctx, &adapter, &name, true).await
            }
            RepoCommands::Disable { name, adapter } => {
                commands::cmd_repo_set_enabled(&ctx, &adapter, &name, false).await
            }
        },

        Commands::Profile(cmd) => match cmd {
            ProfileCommands::List { adapter } => commands::cmd_profile_list(&ctx, &adapter).await,
            ProfileCommands::Switch { profile, adapter } => {
                commands::cmd_profile_switch(&ctx, &adapter, &profile).await
            }
        },

        Commands::Adapter(cmd) => match cmd {
            AdapterCommands::List { json } => commands::cmd_adapter_list(&ctx, json),
            AdapterCommands::Info { id } => commands::cmd_adapter_info(&ctx, &id),
            AdapterCommands::Enable { id } => commands::cmd_adapter_enable(&mut ctx, &id),
            AdapterCommands::Disable { id } => commands::cmd_adapter_disable(&mut ctx, &id),
            AdapterCommands::Health { id } => {
                commands::cmd_adapter_health(&ctx, id.as_deref()).await
            }
        },

        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show { adapter } => {
                commands::cmd_config_show(&ctx, adapter.as_deref()).await
            }
            ConfigCommands::Get { adapter, key } => {
                commands::cmd_config_get(&ctx, &adapter, &key).await
            }
            ConfigCommands::Set {
                adapter,
                key,
                value,
            } => commands::cmd_config_set(&mut ctx, &adapter, &key, &value).await,
            ConfigCommands::Unset { adapter, key } => {
                commands::cmd_config_unset(&mut ctx, &adapter, &key).await
            }
        },

        Commands::Plugin(cmd) => match cmd {
            PluginCommands::Available { registry } => {
                commands::cmd_plugin_available(&ctx, registry.as_deref()).await
            }
            PluginCommands::Install {
                id,
                registry,
                force,
            } => commands::cmd_plugin_install(&ctx, &id, registry.as_deref(), force).await,
            PluginCommands::Remove { id } => commands::cmd_plugin_remove(&id),
            PluginCommands::List => commands::cmd_plugin_list(&ctx),
        },

        Commands::Completions { .. } => Ok(()),
    }
}
