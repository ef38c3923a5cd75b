// src/commands/package.rs
//! Package commands: search, info, install, remove, update, list, sync, run

use super::progress::{CliProgress, with_progress};
use super::{Context, pick_candidate, print_results, split_qualified, truncate};
use aeris::{Adapter, InstalledPackage, Package, PackageDetail, format_bytes};
use anyhow::{Context as _, Result, bail};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Search enabled adapters
pub async fn cmd_search(
    ctx: &Context,
    query: &str,
    adapters: &[String],
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    info!("Searching for '{}'", query);
    if !ctx.manager.any_enabled() {
        println!("No adapters enabled.");
        println!("\nUse 'aeris adapter list' to see what is available.");
        return Ok(());
    }

    let results = ctx
        .manager
        .search_with_limit(query, adapters, limit, ctx.mode)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No packages found matching '{}'", query);
        return Ok(());
    }

    println!("Found {} package(s):", results.len());
    for pkg in &results {
        let marker = if pkg.installed { " [installed]" } else { "" };
        print!("  {} {}{}", pkg.qualified_id(), pkg.version, marker);
        if let Some(desc) = &pkg.description {
            print!(" - {}", truncate(desc, 60));
        }
        println!();
    }
    Ok(())
}

/// Show details for `adapter:package`
pub async fn cmd_info(ctx: &Context, target: &str, json: bool) -> Result<()> {
    let Some((adapter_id, package_id)) = split_qualified(&ctx.manager, target) else {
        bail!("Expected adapter:package, got '{}'", target);
    };
    let adapter = ctx.manager.enabled_adapter(adapter_id)?;

    let detail = match adapter.package_detail(package_id).await {
        Ok(detail) => detail,
        Err(e) if e.is_not_supported() => {
            debug!("{} has no package detail, falling back to search", adapter_id);
            let pkg = lookup(ctx, adapter_id, package_id).await?;
            PackageDetail::new(pkg)
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to get details for {}", target)),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let pkg = &detail.package;
    println!("Package: {}", pkg.name);
    println!("  Adapter: {}", pkg.adapter_id);
    println!("  Version: {}", pkg.version);
    println!("  Installed: {}", if pkg.installed { "yes" } else { "no" });
    if let Some(desc) = &pkg.description {
        println!("  Description: {}", desc);
    }
    if let Some(size) = pkg.size {
        println!("  Size: {}", format_bytes(size));
    }
    if let Some(license) = &pkg.license {
        println!("  License: {}", license);
    }
    if let Some(homepage) = &pkg.homepage {
        println!("  Homepage: {}", homepage);
    }
    if !detail.maintainers.is_empty() {
        println!("  Maintainers: {}", detail.maintainers.join(", "));
    }
    if let Some(date) = &detail.build_date {
        println!("  Built: {}", date);
    }
    if !detail.dependencies.is_empty() {
        println!("  Dependencies ({}):", detail.dependencies.len());
        for dep in &detail.dependencies {
            print!("    {}", dep.name);
            if let Some(req) = &dep.version_req {
                print!(" {}", req);
            }
            if dep.optional {
                print!(" (optional)");
            }
            println!();
        }
    }
    if let Some(readme) = &detail.readme {
        println!();
        println!("{}", readme);
    }
    Ok(())
}

/// Find `name` in one adapter's search results, by id or name
async fn lookup(ctx: &Context, adapter_id: &str, name: &str) -> Result<Package> {
    let results = ctx
        .manager
        .search(name, &[adapter_id.to_string()], ctx.mode)
        .await?;
    results
        .into_iter()
        .find(|p| p.id == name || p.name == name)
        .ok_or_else(|| anyhow::anyhow!("Package '{}' not found in {}", name, adapter_id))
}

/// Resolve a command-line package for installation
async fn resolve_available(ctx: &Context, target: &str, adapter: Option<&str>) -> Result<Package> {
    if let Some((adapter_id, name)) = split_qualified(&ctx.manager, target) {
        ctx.manager.enabled_adapter(adapter_id)?;
        return match lookup(ctx, adapter_id, name).await {
            Ok(pkg) => Ok(pkg),
            Err(e) => {
                debug!("{}; passing '{}' through unresolved", e, target);
                Ok(Package::new(adapter_id, name, ""))
            }
        };
    }

    let sources: Vec<String> = adapter.into_iter().map(str::to_string).collect();
    let candidates = ctx.manager.search(target, &sources, ctx.mode).await?;
    pick_candidate(
        target,
        candidates,
        adapter.or(ctx.config.default_adapter.as_deref()),
    )
}

/// Resolve a command-line package against what is installed
fn resolve_installed(
    ctx: &Context,
    target: &str,
    adapter: Option<&str>,
    installed: &[InstalledPackage],
) -> Result<Package> {
    if let Some((adapter_id, name)) = split_qualified(&ctx.manager, target) {
        let found = installed
            .iter()
            .map(|i| &i.package)
            .find(|p| p.adapter_id == adapter_id && (p.id == name || p.name == name));
        return Ok(found
            .cloned()
            .unwrap_or_else(|| Package::new(adapter_id, name, "")));
    }

    let candidates: Vec<Package> = installed
        .iter()
        .map(|i| i.package.clone())
        .filter(|p| adapter.is_none_or(|a| p.adapter_id == a))
        .collect();
    pick_candidate(
        target,
        candidates,
        adapter.or(ctx.config.default_adapter.as_deref()),
    )
    .with_context(|| format!("'{}' is not installed", target))
}

/// Install packages
pub async fn cmd_install(ctx: &Context, targets: &[String], adapter: Option<&str>) -> Result<()> {
    let mut packages = Vec::new();
    for target in targets {
        let pkg = resolve_available(ctx, target, adapter).await?;
        if pkg.installed {
            println!("[SKIP] {} is already installed", pkg.qualified_id());
            continue;
        }
        packages.push(pkg);
    }
    if packages.is_empty() {
        println!("Nothing to install.");
        return Ok(());
    }

    info!("Installing {} package(s)", packages.len());
    let progress = CliProgress::new(packages.len() as u64, "Installing", ctx.quiet);
    let (outcome, progress) = with_progress(progress, |tx| {
        ctx.manager.install(&packages, tx, ctx.mode)
    })
    .await;
    let results = outcome?;

    let failed = print_results("Installed", &results);
    if failed > 0 {
        progress.finish_with_error(&format!("{} of {} failed", failed, results.len()));
        bail!("{} package(s) failed to install", failed);
    }
    progress.finish_with(&format!("Installed {} package(s)", results.len()));
    Ok(())
}

/// Remove installed packages
pub async fn cmd_remove(ctx: &Context, targets: &[String], adapter: Option<&str>) -> Result<()> {
    let installed = ctx.manager.list_installed(ctx.mode).await?;
    let packages = targets
        .iter()
        .map(|target| resolve_installed(ctx, target, adapter, &installed))
        .collect::<Result<Vec<_>>>()?;

    info!("Removing {} package(s)", packages.len());
    let progress = CliProgress::new(packages.len() as u64, "Removing", ctx.quiet);
    let (outcomes, progress) = with_progress(progress, |tx| {
        ctx.manager.remove(&packages, tx, ctx.mode)
    })
    .await;

    let mut failed = 0;
    for (adapter_id, outcome) in &outcomes {
        let names: Vec<&str> = packages
            .iter()
            .filter(|p| &p.adapter_id == adapter_id)
            .map(|p| p.name.as_str())
            .collect();
        match outcome {
            Ok(()) => println!("[OK] Removed {} ({})", names.join(", "), adapter_id),
            Err(e) => {
                failed += names.len();
                println!("[FAILED] Remove {} ({}): {}", names.join(", "), adapter_id, e);
            }
        }
    }
    if failed > 0 {
        progress.finish_with_error("Removal failed");
        bail!("{} package(s) failed to remove", failed);
    }
    progress.finish_with(&format!("Removed {} package(s)", packages.len()));
    Ok(())
}

/// Update named packages, or everything when `targets` is empty
pub async fn cmd_update(ctx: &Context, targets: &[String], adapter: Option<&str>) -> Result<()> {
    if targets.is_empty() {
        return update_everything(ctx, adapter).await;
    }

    let installed = ctx.manager.list_installed(ctx.mode).await?;
    let packages = targets
        .iter()
        .map(|target| resolve_installed(ctx, target, adapter, &installed))
        .collect::<Result<Vec<_>>>()?;

    let progress = CliProgress::new(packages.len() as u64, "Updating", ctx.quiet);
    let (outcome, progress) = with_progress(progress, |tx| {
        ctx.manager.update(&packages, tx, ctx.mode)
    })
    .await;
    let results = outcome?;

    let failed = print_results("Updated", &results);
    if failed > 0 {
        progress.finish_with_error(&format!("{} of {} failed", failed, results.len()));
        bail!("{} package(s) failed to update", failed);
    }
    progress.finish_with(&format!("Updated {} package(s)", results.len()));
    Ok(())
}

async fn update_everything(ctx: &Context, adapter: Option<&str>) -> Result<()> {
    let progress = CliProgress::new(0, "Updating all packages", ctx.quiet);
    let (outcomes, progress) = match adapter {
        Some(id) => {
            let adapter = ctx.manager.enabled_adapter(id)?;
            let (outcome, progress) = with_progress(progress, |tx| {
                adapter.update(&[], tx, ctx.mode)
            })
            .await;
            (BTreeMap::from([(id.to_string(), outcome)]), progress)
        }
        None => with_progress(progress, |tx| ctx.manager.update_all(tx, ctx.mode)).await,
    };

    if outcomes.is_empty() {
        progress.finish_with("No adapter can update packages");
        return Ok(());
    }

    let mut failed = 0;
    for (adapter_id, outcome) in &outcomes {
        match outcome {
            Ok(results) if results.is_empty() => println!("[OK] {}: up to date", adapter_id),
            Ok(results) => failed += print_results("Updated", results),
            Err(e) => {
                failed += 1;
                println!("[FAILED] {}: {}", adapter_id, e);
            }
        }
    }
    if failed > 0 {
        progress.finish_with_error("Update finished with errors");
        bail!("Update failed for {} item(s)", failed);
    }
    progress.finish_with("Update complete");
    Ok(())
}

/// List installed packages
pub async fn cmd_list(ctx: &Context, adapter: Option<&str>, json: bool) -> Result<()> {
    let mut installed = match adapter {
        Some(id) => ctx.manager.enabled_adapter(id)?.list_installed(ctx.mode).await?,
        None => ctx.manager.list_installed(ctx.mode).await?,
    };
    installed.sort_by(|a, b| {
        (&a.package.adapter_id, &a.package.name).cmp(&(&b.package.adapter_id, &b.package.name))
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&installed)?);
        return Ok(());
    }

    if installed.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    println!("Installed packages ({}):", installed.len());
    for item in &installed {
        let pkg = &item.package;
        print!("  {} {}", pkg.qualified_id(), pkg.version);
        if item.install_size > 0 {
            print!(" ({})", format_bytes(item.install_size));
        }
        if item.pinned {
            print!(" [pinned]");
        }
        println!();
    }
    Ok(())
}

/// List available updates
pub async fn cmd_updates(ctx: &Context, json: bool) -> Result<()> {
    let updates = ctx.manager.list_updates(ctx.mode).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&updates)?);
        return Ok(());
    }

    if updates.is_empty() {
        println!("All packages are up to date.");
        return Ok(());
    }

    let security = updates.iter().filter(|u| u.is_security).count();
    println!("Available updates ({}):", updates.len());
    for update in &updates {
        print!(
            "  {} {} -> {}",
            update.package.qualified_id(),
            update.current_version,
            update.new_version
        );
        if update.is_security {
            print!(" [security]");
        }
        println!();
    }
    if security > 0 {
        println!("\n{} security update(s)", security);
    }
    Ok(())
}

/// Refresh repository metadata
pub async fn cmd_sync(ctx: &Context, adapter: Option<&str>) -> Result<()> {
    let progress = CliProgress::new(0, "Syncing repositories", ctx.quiet);
    let (outcomes, progress) = match adapter {
        Some(id) => {
            let adapter = ctx.manager.enabled_adapter(id)?;
            if !adapter.capabilities().can_sync {
                bail!("Adapter '{}' does not support sync", id);
            }
            let (outcome, progress) = with_progress(progress, |tx| adapter.sync(tx)).await;
            (BTreeMap::from([(id.to_string(), outcome)]), progress)
        }
        None => with_progress(progress, |tx| ctx.manager.sync_all(tx)).await,
    };

    let mut failed = 0;
    for (adapter_id, outcome) in &outcomes {
        match outcome {
            Ok(()) => println!("[OK] {} synced", adapter_id),
            Err(e) => {
                failed += 1;
                println!("[FAILED] {}: {}", adapter_id, e);
            }
        }
    }
    if failed > 0 {
        progress.finish_with_error("Sync finished with errors");
        bail!("Sync failed for {} adapter(s)", failed);
    }
    progress.finish_with(&format!("Synced {} adapter(s)", outcomes.len()));
    Ok(())
}

/// Run a package through its adapter without installing it
pub async fn cmd_run(ctx: &Context, target: &str, args: &[String]) -> Result<()> {
    let Some((adapter_id, name)) = split_qualified(&ctx.manager, target) else {
        bail!("Expected adapter:package, got '{}'", target);
    };
    let adapter: Arc<dyn Adapter> = ctx.manager.enabled_adapter(adapter_id)?;
    if !adapter.capabilities().can_run {
        bail!("Adapter '{}' cannot run packages", adapter_id);
    }
    let pkg = lookup(ctx, adapter_id, name)
        .await
        .unwrap_or_else(|_| Package::new(adapter_id, name, ""));
    info!("Running {} with {} argument(s)", pkg.qualified_id(), args.len());
    adapter
        .run_package(&pkg, args)
        .await
        .with_context(|| format!("Failed to run {}", target))
}

/// Summary of adapters, installed packages and pending updates
pub async fn cmd_dashboard(ctx: &Context) -> Result<()> {
    let adapters = ctx.manager.list_adapters_with_status();
    let enabled = adapters.iter().filter(|(_, on)| *on).count();
    let (installed, updates) = tokio::join!(
        ctx.manager.list_installed(ctx.mode),
        ctx.manager.list_updates(ctx.mode)
    );
    let installed = installed?;
    let updates = updates?;

    let mut per_adapter: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for item in &installed {
        per_adapter.entry(item.package.adapter_id.as_str()).or_default().0 += 1;
    }
    for update in &updates {
        per_adapter.entry(update.package.adapter_id.as_str()).or_default().1 += 1;
    }

    println!("Aeris");
    println!("  Mode: {}", ctx.mode);
    println!("  Adapters: {} enabled / {} registered", enabled, adapters.len());
    println!("  Installed packages: {}", installed.len());
    let security = updates.iter().filter(|u| u.is_security).count();
    println!("  Available updates: {} ({} security)", updates.len(), security);

    if !adapters.is_empty() {
        println!();
        println!("Adapters:");
        for (info, on) in &adapters {
            let (count, pending) = per_adapter.get(info.id.as_str()).copied().unwrap_or_default();
            if *on {
                println!(
                    "  {:<12} {:>6} installed {:>4} update(s)",
                    info.id, count, pending
                );
            } else {
                println!("  {:<12} [disabled]", info.id);
            }
        }
    }
    Ok(())
}
