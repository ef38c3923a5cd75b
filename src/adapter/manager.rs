// src/adapter/manager.rs
//! Registry of adapters and fan-out of user operations
//!
//! Read operations (search, list, updates) query every enabled adapter
//! concurrently and merge the results; a failing adapter is logged and
//! skipped. Write operations (install, remove, update) group packages by
//! their `adapter_id` and hand each adapter its own batch. A failing batch
//! is reported per package and never aborts the other batches.
//!
//! With mode fallback on, each adapter runs in the requested mode if it
//! supports it and in the mode it does support otherwise. The CLI turns it
//! on when the user chose neither `--system` nor a configured default.

use super::{Adapter, AdapterId, AdapterInfo, HealthStatus};
use crate::error::{Error, Result};
use crate::package::{InstallResult, InstalledPackage, Package, Update};
use crate::privilege::PackageMode;
use crate::progress::ProgressSender;
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Owns the registered adapters and their enabled state
#[derive(Default)]
pub struct AdapterManager {
    adapters: BTreeMap<AdapterId, Arc<dyn Adapter>>,
    disabled: HashSet<String>,
    mode_fallback: bool,
}

impl AdapterManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any adapter with the same id
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        let id = adapter.info().id.clone();
        debug!("Registering adapter: {}", id);
        if self.adapters.insert(id.clone(), adapter).is_some() {
            warn!("Adapter '{}' registered twice; keeping the newest", id);
        }
    }

    pub fn unregister(&mut self, id: &str) {
        self.adapters.remove(id);
        self.disabled.remove(id);
    }

    pub fn set_mode_fallback(&mut self, enabled: bool) {
        self.mode_fallback = enabled;
    }

    /// Mode an adapter actually runs in for a `requested` operation
    pub fn mode_for(&self, adapter: &dyn Adapter, requested: PackageMode) -> PackageMode {
        let capabilities = adapter.capabilities();
        if !self.mode_fallback || capabilities.supports_mode(requested) {
            return requested;
        }
        let other = match requested {
            PackageMode::User => PackageMode::System,
            PackageMode::System => PackageMode::User,
        };
        if capabilities.supports_mode(other) {
            debug!(
                "{} has no {} mode, using {}",
                adapter.info().id,
                requested,
                other
            );
            other
        } else {
            requested
        }
    }

    pub fn set_disabled(&mut self, disabled: HashSet<String>) {
        self.disabled = disabled;
    }

    pub fn set_adapter_enabled(&mut self, id: &str, enabled: bool) {
        if enabled {
            self.disabled.remove(id);
        } else {
            self.disabled.insert(id.to_string());
        }
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        !self.disabled.contains(id)
    }

    pub fn any_enabled(&self) -> bool {
        self.adapters.keys().any(|id| self.is_enabled(id))
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn get_adapter(&self, id: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(id).cloned()
    }

    /// Look up an adapter that is registered and enabled
    pub fn enabled_adapter(&self, id: &str) -> Result<Arc<dyn Adapter>> {
        let adapter = self
            .get_adapter(id)
            .ok_or_else(|| Error::AdapterNotFound(id.to_string()))?;
        if !self.is_enabled(id) {
            return Err(Error::AdapterDisabled(id.to_string()));
        }
        Ok(adapter)
    }

    /// Adapters sorted by id
    pub fn list_adapters(&self) -> Vec<&AdapterInfo> {
        self.adapters.values().map(|a| a.info()).collect()
    }

    pub fn list_adapters_with_status(&self) -> Vec<(AdapterInfo, bool)> {
        self.adapters
            .values()
            .map(|a| {
                let info = a.info().clone();
                let enabled = self.is_enabled(&info.id);
                (info, enabled)
            })
            .collect()
    }

    fn enabled_adapters(&self) -> Vec<Arc<dyn Adapter>> {
        self.adapters
            .iter()
            .filter(|(id, _)| self.is_enabled(id))
            .map(|(_, a)| a.clone())
            .collect()
    }

    fn search_targets(&self, sources: &[String]) -> Vec<Arc<dyn Adapter>> {
        let candidates = if sources.is_empty() {
            self.enabled_adapters()
        } else {
            sources
                .iter()
                .filter_map(|id| {
                    let adapter = self.adapters.get(id).cloned();
                    if adapter.is_none() {
                        warn!("Unknown adapter in search sources: {}", id);
                    }
                    adapter
                })
                .filter(|a| self.is_enabled(&a.info().id))
                .collect()
        };
        candidates
            .into_iter()
            .filter(|a| a.capabilities().can_search)
            .collect()
    }

    /// Search all enabled adapters, or only `sources` when non-empty
    pub async fn search(
        &self,
        query: &str,
        sources: &[String],
        mode: PackageMode,
    ) -> Result<Vec<Package>> {
        self.search_with_limit(query, sources, None, mode).await
    }

    pub async fn search_with_limit(
        &self,
        query: &str,
        sources: &[String],
        limit: Option<usize>,
        mode: PackageMode,
    ) -> Result<Vec<Package>> {
        let targets = self.search_targets(sources);
        let outcomes = join_all(targets.iter().map(|adapter| async move {
            let mode = self.mode_for(adapter.as_ref(), mode);
            (adapter.info().id.clone(), adapter.search(query, limit, mode).await)
        }))
        .await;

        let mut results = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(pkgs) => {
                    debug!("{} returned {} results for '{}'", id, pkgs.len(), query);
                    results.extend(pkgs);
                }
                Err(e) => warn!("Search failed for {}: {}", id, e),
            }
        }
        Ok(results)
    }

    pub async fn list_installed(&self, mode: PackageMode) -> Result<Vec<InstalledPackage>> {
        let adapters: Vec<_> = self
            .enabled_adapters()
            .into_iter()
            .filter(|a| a.capabilities().can_list)
            .collect();
        let outcomes = join_all(adapters.iter().map(|adapter| async move {
            let mode = self.mode_for(adapter.as_ref(), mode);
            (adapter.info().id.clone(), adapter.list_installed(mode).await)
        }))
        .await;

        let mut results = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(pkgs) => results.extend(pkgs),
                Err(e) => warn!("List failed for {}: {}", id, e),
            }
        }
        Ok(results)
    }

    pub async fn list_updates(&self, mode: PackageMode) -> Result<Vec<Update>> {
        let adapters: Vec<_> = self
            .enabled_adapters()
            .into_iter()
            .filter(|a| a.capabilities().can_update)
            .collect();
        let outcomes = join_all(adapters.iter().map(|adapter| async move {
            let mode = self.mode_for(adapter.as_ref(), mode);
            (adapter.info().id.clone(), adapter.list_updates(mode).await)
        }))
        .await;

        let mut results = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(updates) => results.extend(updates),
                Err(Error::NotSupported) => debug!("{} cannot list updates", id),
                Err(e) => warn!("Update check failed for {}: {}", id, e),
            }
        }
        Ok(results)
    }

    /// Split packages into per-adapter batches, keeping input order within a batch
    fn group_by_adapter(packages: &[Package]) -> BTreeMap<&str, Vec<Package>> {
        let mut by_adapter: BTreeMap<&str, Vec<Package>> = BTreeMap::new();
        for pkg in packages {
            by_adapter
                .entry(pkg.adapter_id.as_str())
                .or_default()
                .push(pkg.clone());
        }
        by_adapter
    }

    pub async fn install(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<Vec<InstallResult>> {
        self.apply_batches(packages, progress, mode, BatchOp::Install)
            .await
    }

    /// Update the given packages across adapters
    pub async fn update(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<Vec<InstallResult>> {
        self.apply_batches(packages, progress, mode, BatchOp::Update)
            .await
    }

    /// Ask every enabled adapter with updates to upgrade everything it manages
    ///
    /// Adapters receive an empty batch, which they treat as a full upgrade.
    pub async fn update_all(
        &self,
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> BTreeMap<AdapterId, Result<Vec<InstallResult>>> {
        let adapters: Vec<_> = self
            .enabled_adapters()
            .into_iter()
            .filter(|a| a.capabilities().can_update)
            .collect();
        let outcomes = join_all(adapters.iter().map(|adapter| {
            let progress = progress.clone();
            async move {
                let id = adapter.info().id.clone();
                let mode = self.mode_for(adapter.as_ref(), mode);
                let outcome = adapter.update(&[], progress, mode).await;
                if let Err(e) = &outcome {
                    error!("Update failed for {}: {}", id, e);
                }
                (id, outcome)
            }
        }))
        .await;
        outcomes.into_iter().collect()
    }

    async fn apply_batches(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
        op: BatchOp,
    ) -> Result<Vec<InstallResult>> {
        let batches = Self::group_by_adapter(packages);
        let outcomes = join_all(batches.into_iter().map(|(adapter_id, batch)| {
            let progress = progress.clone();
            async move {
                let adapter = match self.enabled_adapter(adapter_id) {
                    Ok(adapter) => adapter,
                    Err(e) => return Self::fail_batch(&batch, &e),
                };
                let mode = self.mode_for(adapter.as_ref(), mode);
                let outcome = match op {
                    BatchOp::Install => adapter.install(&batch, progress, mode).await,
                    BatchOp::Update => adapter.update(&batch, progress, mode).await,
                };
                match outcome {
                    Ok(results) => results,
                    Err(e) => {
                        error!("{} failed for {}: {}", op.verb(), adapter_id, e);
                        Self::fail_batch(&batch, &e)
                    }
                }
            }
        }))
        .await;

        Ok(outcomes.into_iter().flatten().collect())
    }

    fn fail_batch(batch: &[Package], err: &Error) -> Vec<InstallResult> {
        batch
            .iter()
            .map(|pkg| InstallResult::failed(pkg, err.to_string()))
            .collect()
    }

    /// Remove packages; returns one outcome per adapter batch
    pub async fn remove(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> BTreeMap<AdapterId, Result<()>> {
        let batches = Self::group_by_adapter(packages);
        let outcomes = join_all(batches.into_iter().map(|(adapter_id, batch)| {
            let progress = progress.clone();
            async move {
                let outcome = match self.enabled_adapter(adapter_id) {
                    Ok(adapter) => {
                        let mode = self.mode_for(adapter.as_ref(), mode);
                        adapter.remove(&batch, progress, mode).await
                    }
                    Err(e) => Err(e),
                };
                if let Err(e) = &outcome {
                    error!("Remove failed for {}: {}", adapter_id, e);
                }
                (adapter_id.to_string(), outcome)
            }
        }))
        .await;
        outcomes.into_iter().collect()
    }

    /// Sync every enabled adapter that supports it
    pub async fn sync_all(&self, progress: Option<ProgressSender>) -> BTreeMap<AdapterId, Result<()>> {
        let adapters: Vec<_> = self
            .enabled_adapters()
            .into_iter()
            .filter(|a| a.capabilities().can_sync)
            .collect();
        let outcomes = join_all(adapters.iter().map(|adapter| {
            let progress = progress.clone();
            async move { (adapter.info().id.clone(), adapter.sync(progress).await) }
        }))
        .await;
        outcomes.into_iter().collect()
    }

    pub async fn health_all(&self) -> BTreeMap<AdapterId, Result<HealthStatus>> {
        let adapters = self.enabled_adapters();
        let outcomes = join_all(adapters.iter().map(|adapter| async move {
            (adapter.info().id.clone(), adapter.health_check().await)
        }))
        .await;
        outcomes.into_iter().collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum BatchOp {
    Install,
    Update,
}

impl BatchOp {
    fn verb(self) -> &'static str {
        match self {
            BatchOp::Install => "Install",
            BatchOp::Update => "Update",
        }
    }
}
