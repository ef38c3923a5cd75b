// src/commands/adapter.rs
//! Adapter management commands

use super::Context;
use aeris::AdapterInfo;
use anyhow::{Result, bail};
use std::collections::BTreeMap;
use tracing::info;

/// List registered adapters
pub fn cmd_adapter_list(ctx: &Context, json: bool) -> Result<()> {
    let adapters: Vec<AdapterInfo> = ctx
        .manager
        .list_adapters_with_status()
        .into_iter()
        .map(|(mut info, enabled)| {
            info.enabled = enabled;
            info
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&adapters)?);
        return Ok(());
    }

    if adapters.is_empty() {
        println!("No adapters found.");
        println!("\nInstall pacman, apt or dnf, or add a plugin with 'aeris plugin install'.");
        return Ok(());
    }

    println!("Adapters ({}):", adapters.len());
    for info in &adapters {
        let kind = if info.is_builtin { "built-in" } else { "plugin" };
        let state = if info.enabled { "" } else { " [disabled]" };
        println!(
            "  {:<12} {} {} ({}){}",
            info.id, info.name, info.version, kind, state
        );
    }
    Ok(())
}

/// Show one adapter in detail
pub fn cmd_adapter_info(ctx: &Context, id: &str) -> Result<()> {
    let Some(adapter) = ctx.manager.get_adapter(id) else {
        bail!("Adapter '{}' not found", id);
    };
    let info = adapter.info();

    println!("Adapter: {}", info.id);
    println!("  Name: {}", info.name);
    println!("  Version: {}", info.version);
    println!(
        "  Enabled: {}",
        if ctx.manager.is_enabled(id) { "yes" } else { "no" }
    );
    if !info.description.is_empty() {
        println!("  Description: {}", info.description);
    }
    match &info.plugin_path {
        Some(path) => println!("  Plugin: {}", path.display()),
        None => println!("  Built-in: yes"),
    }
    println!("  Capabilities: {}", adapter.capabilities().summary().join(", "));

    if let Some(schema) = adapter.config_schema() {
        println!("  Settings ({}):", schema.fields.len());
        for field in &schema.fields {
            let current = ctx.config.get_adapter_setting(id, &field.key);
            print!("    {} - {}", field.key, field.label);
            match (current, &field.default) {
                (Some(value), _) => print!(" = {}", value),
                (None, Some(default)) => print!(" = {} (default)", default),
                (None, None) => {}
            }
            println!();
        }
    }
    Ok(())
}

/// Enable an adapter and remember it in the config file
pub fn cmd_adapter_enable(ctx: &mut Context, id: &str) -> Result<()> {
    set_enabled(ctx, id, true)
}

/// Disable an adapter and remember it in the config file
pub fn cmd_adapter_disable(ctx: &mut Context, id: &str) -> Result<()> {
    set_enabled(ctx, id, false)
}

fn set_enabled(ctx: &mut Context, id: &str, enabled: bool) -> Result<()> {
    if ctx.manager.get_adapter(id).is_none() {
        bail!("Adapter '{}' not found", id);
    }
    if ctx.manager.is_enabled(id) == enabled {
        println!(
            "Adapter '{}' is already {}",
            id,
            if enabled { "enabled" } else { "disabled" }
        );
        return Ok(());
    }

    ctx.config.set_adapter_disabled(id, !enabled);
    ctx.save_config()?;
    ctx.manager.set_adapter_enabled(id, enabled);
    info!("Adapter {} {}", id, if enabled { "enabled" } else { "disabled" });
    println!(
        "[OK] Adapter '{}' {}",
        id,
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

/// Check adapter health
pub async fn cmd_adapter_health(ctx: &Context, id: Option<&str>) -> Result<()> {
    let outcomes: BTreeMap<_, _> = match id {
        Some(id) => {
            let adapter = ctx.manager.enabled_adapter(id)?;
            [(id.to_string(), adapter.health_check().await)]
                .into_iter()
                .collect()
        }
        None => ctx.manager.health_all().await,
    };

    let mut unhealthy = 0;
    for (adapter_id, outcome) in &outcomes {
        match outcome {
            Ok(status) => {
                let tag = if status.healthy { "[OK]" } else { "[WARN]" };
                if !status.healthy {
                    unhealthy += 1;
                }
                print!("{} {}", tag, adapter_id);
                if !status.message.is_empty() {
                    print!(": {}", status.message);
                }
                if let Some(count) = status.package_count {
                    print!(" ({} packages", count);
                    if let Some(repos) = status.repo_count {
                        print!(", {} repositories", repos);
                    }
                    print!(")");
                }
                println!();
            }
            Err(e) => {
                unhealthy += 1;
                println!("[FAILED] {}: {}", adapter_id, e);
            }
        }
    }
    if unhealthy > 0 {
        bail!("{} adapter(s) unhealthy", unhealthy);
    }
    Ok(())
}
