// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use aeris::progress::emit;
use aeris::{
    Adapter, AdapterInfo, Capabilities, Error, HealthStatus, InstallResult, InstalledPackage,
    Package, PackageMode, ProgressEvent, ProgressSender, Result, Update,
};
use async_trait::async_trait;
use std::sync::Mutex;

/// Capabilities of a mock that can do every core operation in user mode
pub fn full_capabilities() -> Capabilities {
    Capabilities {
        can_search: true,
        can_install: true,
        can_remove: true,
        can_update: true,
        can_list: true,
        can_sync: true,
        supports_user_packages: true,
        ..Default::default()
    }
}

/// In-memory adapter with canned data and a call log
pub struct MockAdapter {
    info: AdapterInfo,
    pub available: Vec<Package>,
    pub installed: Vec<Package>,
    pub updates: Vec<(String, String, String)>,
    pub fail_search: bool,
    pub fail_install: bool,
    pub fail_remove: bool,
    pub fail_sync: bool,
    pub unhealthy: bool,
    calls: Mutex<Vec<String>>,
    install_modes: Mutex<Vec<PackageMode>>,
}

impl MockAdapter {
    pub fn new(id: &str) -> Self {
        Self {
            info: AdapterInfo {
                id: id.to_string(),
                name: format!("Mock {}", id),
                version: "1.0.0".to_string(),
                capabilities: full_capabilities(),
                enabled: true,
                is_builtin: false,
                plugin_path: None,
                description: String::new(),
                icon: None,
            },
            available: Vec::new(),
            installed: Vec::new(),
            updates: Vec::new(),
            fail_search: false,
            fail_install: false,
            fail_remove: false,
            fail_sync: false,
            unhealthy: false,
            calls: Mutex::new(Vec::new()),
            install_modes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.info.capabilities = capabilities;
        self
    }

    /// Add a package that search can find
    pub fn with_available(mut self, name: &str, version: &str) -> Self {
        let pkg = Package::new(&self.info.id, name, version);
        self.available.push(pkg);
        self
    }

    pub fn with_installed(mut self, name: &str, version: &str) -> Self {
        let mut pkg = Package::new(&self.info.id, name, version);
        pkg.installed = true;
        self.installed.push(pkg);
        self
    }

    pub fn with_update(mut self, name: &str, current: &str, new: &str) -> Self {
        self.updates
            .push((name.to_string(), current.to_string(), new.to_string()));
        self
    }

    pub fn failing_install(mut self) -> Self {
        self.fail_install = true;
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn failing_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    pub fn failing_sync(mut self) -> Self {
        self.fail_sync = true;
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.unhealthy = true;
        self
    }

    /// Modes passed to `install`, in call order
    pub fn install_modes(&self) -> Vec<PackageMode> {
        self.install_modes.lock().unwrap().clone()
    }

    /// Operations received so far, as `op:arg,arg`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &str, packages: &[Package]) {
        let names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}", op, names.join(",")));
    }

    fn id(&self) -> &str {
        &self.info.id
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn info(&self) -> &AdapterInfo {
        &self.info
    }

    fn capabilities(&self) -> &Capabilities {
        &self.info.capabilities
    }

    async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        _mode: PackageMode,
    ) -> Result<Vec<Package>> {
        self.calls.lock().unwrap().push(format!("search:{}", query));
        if self.fail_search {
            return Err(Error::Network("mock search failure".into()));
        }
        let mut found: Vec<Package> = self
            .available
            .iter()
            .filter(|p| p.name.contains(query))
            .cloned()
            .collect();
        if let Some(limit) = limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn install(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<Vec<InstallResult>> {
        self.record("install", packages);
        self.install_modes.lock().unwrap().push(mode);
        if self.fail_install {
            return Err(Error::Other("mock install failure".into()));
        }
        Ok(packages
            .iter()
            .map(|pkg| {
                emit(
                    &progress,
                    ProgressEvent::Completed {
                        adapter_id: self.id().to_string(),
                        package_name: pkg.name.clone(),
                    },
                );
                InstallResult::ok(pkg)
            })
            .collect())
    }

    async fn remove(
        &self,
        packages: &[Package],
        _progress: Option<ProgressSender>,
        _mode: PackageMode,
    ) -> Result<()> {
        self.record("remove", packages);
        if self.fail_remove {
            return Err(Error::Other("mock remove failure".into()));
        }
        Ok(())
    }

    async fn update(
        &self,
        packages: &[Package],
        _progress: Option<ProgressSender>,
        _mode: PackageMode,
    ) -> Result<Vec<InstallResult>> {
        self.record("update", packages);
        if packages.is_empty() {
            return Ok(self
                .updates
                .iter()
                .map(|(name, _, new)| InstallResult::ok(&Package::new(self.id(), name, new)))
                .collect());
        }
        Ok(packages.iter().map(InstallResult::ok).collect())
    }

    async fn list_installed(&self, _mode: PackageMode) -> Result<Vec<InstalledPackage>> {
        Ok(self
            .installed
            .iter()
            .cloned()
            .map(InstalledPackage::new)
            .collect())
    }

    async fn list_updates(&self, _mode: PackageMode) -> Result<Vec<Update>> {
        Ok(self
            .updates
            .iter()
            .map(|(name, current, new)| Update::new(self.id(), name, current, new))
            .collect())
    }

    async fn sync(&self, _progress: Option<ProgressSender>) -> Result<()> {
        self.calls.lock().unwrap().push("sync".to_string());
        if self.fail_sync {
            return Err(Error::Network("mock sync failure".into()));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        Ok(HealthStatus {
            healthy: !self.unhealthy,
            message: if self.unhealthy { "broken" } else { "ok" }.to_string(),
            package_count: Some(self.installed.len() as u64),
            ..Default::default()
        })
    }
}

/// Write an executable shell plugin with its manifest into `root/<id>`
#[cfg(unix)]
pub fn write_shell_plugin(root: &std::path::Path, id: &str, manifest_extra: &str, script: &str) {
    use std::os::unix::fs::PermissionsExt;

    let dir = root.join(id);
    std::fs::create_dir_all(&dir).unwrap();
    let manifest = format!(
        "[adapter]\nid = \"{id}\"\nname = \"{id} plugin\"\nversion = \"0.1.0\"\n{manifest_extra}"
    );
    std::fs::write(dir.join("manifest.toml"), manifest).unwrap();
    let exe = dir.join("plugin");
    std::fs::write(&exe, script).unwrap();
    std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
}
