// src/commands/profile.rs
//! Profile commands

use super::Context;
use anyhow::{Context as _, Result, bail};

/// List an adapter's profiles
pub async fn cmd_profile_list(ctx: &Context, adapter_id: &str) -> Result<()> {
    let adapter = ctx.manager.enabled_adapter(adapter_id)?;
    if !adapter.capabilities().has_profiles {
        bail!("Adapter '{}' has no profiles", adapter_id);
    }
    let profiles = adapter.list_profiles().await?;

    if profiles.is_empty() {
        println!("No profiles defined for {}.", adapter_id);
        return Ok(());
    }

    println!("Profiles for {} ({}):", adapter_id, profiles.len());
    for profile in &profiles {
        let marker = if profile.is_active { "*" } else { " " };
        println!(
            "  {} {} - {} ({} packages)",
            marker, profile.id, profile.name, profile.package_count
        );
    }
    Ok(())
}

/// Switch an adapter to another profile
pub async fn cmd_profile_switch(ctx: &Context, adapter_id: &str, profile_id: &str) -> Result<()> {
    let adapter = ctx.manager.enabled_adapter(adapter_id)?;
    if !adapter.capabilities().has_profiles {
        bail!("Adapter '{}' has no profiles", adapter_id);
    }
    adapter
        .switch_profile(profile_id)
        .await
        .with_context(|| format!("Failed to switch {} to profile '{}'", adapter_id, profile_id))?;
    let active = adapter.active_profile().await.ok();
    match active {
        Some(profile) => println!("[OK] {} is now using profile '{}'", adapter_id, profile.name),
        None => println!("[OK] {} switched to profile '{}'", adapter_id, profile_id),
    }
    Ok(())
}
