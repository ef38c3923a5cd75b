// src/commands/plugin.rs
//! Plugin registry commands

use super::Context;
use super::progress::CliProgress;
use aeris::plugin::{discover_plugins, user_plugin_dir};
use aeris::registry::{self, DEFAULT_REGISTRY_URL};
use anyhow::{Context as _, Result, anyhow, bail};
use std::path::PathBuf;
use tracing::info;

fn registry_url<'a>(ctx: &'a Context, explicit: Option<&'a str>) -> &'a str {
    explicit
        .or(ctx.config.registry_url.as_deref())
        .unwrap_or(DEFAULT_REGISTRY_URL)
}

fn plugins_dir() -> Result<PathBuf> {
    user_plugin_dir().ok_or_else(|| anyhow!("Cannot determine the user data directory"))
}

/// List plugins offered by the registry
pub async fn cmd_plugin_available(ctx: &Context, explicit: Option<&str>) -> Result<()> {
    let url = registry_url(ctx, explicit);
    let registry = registry::fetch_registry(Some(url))
        .await
        .with_context(|| format!("Failed to fetch registry from {}", url))?;
    let dir = plugins_dir()?;
    let arch = std::env::consts::ARCH;

    if registry.plugins.is_empty() {
        println!("The registry lists no plugins.");
        return Ok(());
    }

    println!(
        "Available plugins ({}, updated {}):",
        registry.plugins.len(),
        registry.registry.updated
    );
    for entry in &registry.plugins {
        print!("  {} {} - {}", entry.id, entry.version, entry.name);
        if let Some(installed) = registry::installed_plugin_version(&dir, &entry.id) {
            if installed == entry.version {
                print!(" [installed]");
            } else {
                print!(" [installed: {}]", installed);
            }
        }
        if !entry.supports_arch(arch) {
            print!(" [unsupported on {}]", arch);
        } else if !entry.is_compatible() {
            print!(" [needs newer aeris]");
        }
        println!();
        if !entry.description.is_empty() {
            println!("      {}", entry.description);
        }
    }
    Ok(())
}

/// Download and install a plugin
pub async fn cmd_plugin_install(
    ctx: &Context,
    id: &str,
    explicit: Option<&str>,
    force: bool,
) -> Result<()> {
    registry::validate_plugin_id(id)?;
    let url = registry_url(ctx, explicit);
    let registry = registry::fetch_registry(Some(url))
        .await
        .with_context(|| format!("Failed to fetch registry from {}", url))?;
    let entry = registry
        .find(id)
        .ok_or_else(|| anyhow!("Plugin '{}' is not in the registry", id))?;
    if !entry.is_compatible() {
        bail!(
            "Plugin '{}' requires aeris {} or newer",
            id,
            entry.min_host_version.as_deref().unwrap_or("?")
        );
    }

    let dir = plugins_dir()?;
    if !force
        && let Some(installed) = registry::installed_plugin_version(&dir, id)
        && installed == entry.version
    {
        println!("[SKIP] Plugin '{}' {} is already installed", id, installed);
        return Ok(());
    }

    info!("Installing plugin {} {}", id, entry.version);
    let progress = CliProgress::new(0, &format!("Downloading {}", id), ctx.quiet);
    match registry::download_plugin(entry, &dir).await {
        Ok(path) => {
            progress.finish_with(&format!("Installed {} {}", id, entry.version));
            println!("[OK] Installed plugin '{}' to {}", id, path.display());
            Ok(())
        }
        Err(e) => {
            progress.finish_with_error(&format!("Failed to install {}", id));
            Err(e).with_context(|| format!("Failed to install plugin '{}'", id))
        }
    }
}

/// Remove a plugin installed in the user plugin directory
pub fn cmd_plugin_remove(id: &str) -> Result<()> {
    let dir = plugins_dir()?;
    registry::remove_plugin(&dir, id)
        .with_context(|| format!("Failed to remove plugin '{}'", id))?;
    println!("[OK] Removed plugin '{}'", id);
    Ok(())
}

/// List plugins discovered on this machine
pub fn cmd_plugin_list(ctx: &Context) -> Result<()> {
    let plugins = discover_plugins();
    if plugins.is_empty() {
        println!("No plugins installed.");
        println!("\nUse 'aeris plugin available' to browse the registry.");
        return Ok(());
    }

    println!("Plugins ({}):", plugins.len());
    for (dir, manifest) in &plugins {
        let meta = &manifest.adapter;
        let state = match ctx.manager.get_adapter(&meta.id) {
            Some(_) if ctx.manager.is_enabled(&meta.id) => "loaded",
            Some(_) => "disabled",
            None => "failed to load",
        };
        println!(
            "  {} {} - {} ({}) {}",
            meta.id,
            meta.version,
            meta.name,
            state,
            dir.display()
        );
    }
    Ok(())
}
