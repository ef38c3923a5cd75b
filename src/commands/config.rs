// src/commands/config.rs
//! Adapter settings commands
//!
//! Aeris-managed fields are stored in the Aeris config file and picked up
//! on the next run. Other fields belong to the backend and are written
//! through the adapter's own `set_config`.

use super::Context;
use aeris::{Adapter, ConfigField, ConfigSchema, ConfigValue};
use anyhow::{Context as _, Result, anyhow, bail};
use std::sync::Arc;

fn adapter_schema(ctx: &Context, adapter_id: &str) -> Result<(Arc<dyn Adapter>, ConfigSchema)> {
    let adapter = ctx
        .manager
        .get_adapter(adapter_id)
        .ok_or_else(|| anyhow!("Adapter '{}' not found", adapter_id))?;
    let schema = adapter
        .config_schema()
        .ok_or_else(|| anyhow!("Adapter '{}' has no settings", adapter_id))?;
    Ok((adapter, schema))
}

fn schema_field<'a>(schema: &'a ConfigSchema, key: &str) -> Result<&'a ConfigField> {
    schema.field(key).ok_or_else(|| {
        let keys: Vec<&str> = schema.fields.iter().map(|f| f.key.as_str()).collect();
        anyhow!(
            "Unknown setting '{}' for {} (known: {})",
            key,
            schema.adapter_id,
            keys.join(", ")
        )
    })
}

/// Current value of a field and whether it is the default
async fn current_value(
    ctx: &Context,
    adapter: &dyn Adapter,
    field: &ConfigField,
) -> (Option<String>, bool) {
    let id = &adapter.info().id;
    let stored = if field.aeris_managed {
        ctx.config
            .get_adapter_setting(id, &field.key)
            .map(str::to_string)
    } else {
        adapter
            .get_config()
            .await
            .ok()
            .and_then(|config| config.get(&field.key).map(ConfigValue::to_string))
    };
    match stored {
        Some(value) => (Some(value), false),
        None => (field.default.as_ref().map(ConfigValue::to_string), true),
    }
}

/// Show the config file, or one adapter's settings
pub async fn cmd_config_show(ctx: &Context, adapter_id: Option<&str>) -> Result<()> {
    let Some(adapter_id) = adapter_id else {
        println!("# {}", ctx.config_path.display());
        print!("{}", toml::to_string_pretty(&ctx.config)?);
        return Ok(());
    };

    let (adapter, schema) = adapter_schema(ctx, adapter_id)?;
    println!("Settings for {} ({}):", adapter_id, schema.fields.len());
    for field in &schema.fields {
        let (value, is_default) = current_value(ctx, adapter.as_ref(), field).await;
        print!("  {}", field.key);
        match value {
            Some(value) if is_default => print!(" = {} (default)", value),
            Some(value) => print!(" = {}", value),
            None => print!(" (unset)"),
        }
        println!();
        if let Some(desc) = &field.description {
            println!("      {}", desc);
        }
    }
    Ok(())
}

/// Print one setting
pub async fn cmd_config_get(ctx: &Context, adapter_id: &str, key: &str) -> Result<()> {
    let (adapter, schema) = adapter_schema(ctx, adapter_id)?;
    let field = schema_field(&schema, key)?;
    match current_value(ctx, adapter.as_ref(), field).await {
        (Some(value), _) => println!("{}", value),
        (None, _) => bail!("{}.{} is not set", adapter_id, key),
    }
    Ok(())
}

/// Validate and store one setting
pub async fn cmd_config_set(ctx: &mut Context, adapter_id: &str, key: &str, input: &str) -> Result<()> {
    let (adapter, schema) = adapter_schema(ctx, adapter_id)?;
    let field = schema_field(&schema, key)?;
    let value = ConfigValue::parse_for(&field.field_type, input)
        .with_context(|| format!("Invalid value for {}.{}", adapter_id, key))?;

    if field.aeris_managed {
        ctx.config
            .set_adapter_setting(adapter_id, key, &value.to_string());
        ctx.save_config()?;
        println!("[OK] {}.{} = {} (applies on next run)", adapter_id, key, value);
        return Ok(());
    }

    let mut config = adapter.get_config().await.unwrap_or_else(|_| schema.defaults());
    config.set(key, value.clone());
    adapter
        .set_config_for_mode(&config, ctx.mode)
        .await
        .with_context(|| format!("Failed to write {} settings", adapter_id))?;
    println!("[OK] {}.{} = {}", adapter_id, key, value);
    Ok(())
}

/// Remove a setting so the default applies again
pub async fn cmd_config_unset(ctx: &mut Context, adapter_id: &str, key: &str) -> Result<()> {
    let (adapter, schema) = adapter_schema(ctx, adapter_id)?;
    let field = schema_field(&schema, key)?;

    if field.aeris_managed {
        if ctx.config.remove_adapter_setting(adapter_id, key).is_none() {
            println!("{}.{} was not set", adapter_id, key);
            return Ok(());
        }
        ctx.save_config()?;
        println!("[OK] Removed {}.{}", adapter_id, key);
        return Ok(());
    }

    let Some(default) = field.default.clone() else {
        bail!("{}.{} has no default to restore", adapter_id, key);
    };
    let mut config = adapter.get_config().await.unwrap_or_else(|_| schema.defaults());
    config.set(key, default.clone());
    adapter
        .set_config_for_mode(&config, ctx.mode)
        .await
        .with_context(|| format!("Failed to write {} settings", adapter_id))?;
    println!("[OK] {}.{} reset to {}", adapter_id, key, default);
    Ok(())
}
