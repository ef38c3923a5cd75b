// src/commands/repo.rs
//! Repository management commands

use super::Context;
use aeris::Repository;
use anyhow::{Context as _, Result, bail};
use tracing::info;

/// List repositories of one adapter
pub async fn cmd_repo_list(ctx: &Context, adapter_id: &str) -> Result<()> {
    let adapter = ctx.manager.enabled_adapter(adapter_id)?;
    if !adapter.capabilities().can_list_repos {
        bail!("Adapter '{}' cannot list repositories", adapter_id);
    }
    let repos = adapter.list_repositories().await?;

    if repos.is_empty() {
        println!("No repositories configured for {}.", adapter_id);
        return Ok(());
    }

    println!("Repositories for {} ({}):", adapter_id, repos.len());
    for repo in &repos {
        let mark = if repo.enabled { "x" } else { " " };
        print!("  [{}] {}", mark, repo.name);
        if !repo.url.is_empty() {
            print!(" {}", repo.url);
        }
        if let Some(desc) = &repo.description {
            print!(" - {}", desc);
        }
        println!();
    }
    Ok(())
}

/// Add a repository
pub async fn cmd_repo_add(
    ctx: &Context,
    adapter_id: &str,
    name: &str,
    url: &str,
    description: Option<&str>,
    disabled: bool,
) -> Result<()> {
    let adapter = ctx.manager.enabled_adapter(adapter_id)?;
    if !adapter.capabilities().can_add_repo {
        bail!("Adapter '{}' cannot add repositories", adapter_id);
    }
    url::Url::parse(url).with_context(|| format!("Invalid repository URL '{}'", url))?;

    let repo = Repository {
        name: name.to_string(),
        url: url.to_string(),
        enabled: !disabled,
        description: description.map(str::to_string),
    };
    adapter
        .add_repository(&repo)
        .await
        .with_context(|| format!("Failed to add repository '{}'", name))?;
    info!("Added repository {} to {}", name, adapter_id);
    println!("[OK] Added repository '{}' to {}", name, adapter_id);
    Ok(())
}

/// Remove a repository
pub async fn cmd_repo_remove(ctx: &Context, adapter_id: &str, name: &str) -> Result<()> {
    let adapter = ctx.manager.enabled_adapter(adapter_id)?;
    if !adapter.capabilities().can_remove_repo {
        bail!("Adapter '{}' cannot remove repositories", adapter_id);
    }
    adapter
        .remove_repository(name)
        .await
        .with_context(|| format!("Failed to remove repository '{}'", name))?;
    println!("[OK] Removed repository '{}' from {}", name, adapter_id);
    Ok(())
}

/// Enable or disable a repository
pub async fn cmd_repo_set_enabled(
    ctx: &Context,
    adapter_id: &str,
    name: &str,
    enabled: bool,
) -> Result<()> {
    let adapter = ctx.manager.enabled_adapter(adapter_id)?;
    let verb = if enabled { "enable" } else { "disable" };
    adapter
        .set_repo_enabled(name, enabled, ctx.mode)
        .await
        .with_context(|| format!("Failed to {} repository '{}'", verb, name))?;
    println!("[OK] Repository '{}' {}d in {}", name, verb, adapter_id);
    Ok(())
}
