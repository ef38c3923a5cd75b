// src/plugin/adapter.rs

//! Adapter backed by an external plugin executable
//!
//! Each operation starts the plugin with [`PLUGIN_FLAG`] inside its
//! [`SandboxPolicy`], sends one request and services host calls until the
//! plugin reports a result. A plugin still running when the configured
//! timeout expires is killed, whether or not it already answered.

use super::host::HostState;
use super::manifest::{MANIFEST_FILE, PLUGIN_EXECUTABLE, PluginManifest, load_manifest};
use super::protocol::{
    HostReply, LogLevel, NOT_SUPPORTED, PLUGIN_FLAG, PluginMessage, Request,
};
use super::sandbox::{SandboxPolicy, landlock_supported};
use crate::adapter::{
    Adapter, AdapterConfig, AdapterInfo, Capabilities, ConfigSchema, HealthStatus,
};
use crate::error::{Error, Result};
use crate::package::{
    InstallResult, InstalledPackage, Package, PackageDetail, Profile, Repository, Update,
};
use crate::privilege::PackageMode;
use crate::progress::{ProgressSender, emit};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout, Command};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Optional overrides a plugin may report from its `info` method
#[derive(Debug, Default, Deserialize)]
struct ReportedInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    icon: Option<String>,
}

pub struct PluginAdapter {
    info: AdapterInfo,
    manifest: PluginManifest,
    dir: PathBuf,
    executable: PathBuf,
    host: HostState,
    sandbox: SandboxPolicy,
    timeout: Duration,
    next_id: AtomicU64,
}

impl PluginAdapter {
    /// Load the plugin in `dir` and query its info and capabilities
    pub async fn load(dir: &Path, timeout: Duration) -> Result<Self> {
        let manifest = load_manifest(&dir.join(MANIFEST_FILE))?;
        Self::from_manifest(dir, manifest, timeout).await
    }

    pub async fn from_manifest(
        dir: &Path,
        manifest: PluginManifest,
        timeout: Duration,
    ) -> Result<Self> {
        let host = HostState::new(manifest.adapter.id.clone(), manifest.permissions.clone());
        Self::with_host(dir, manifest, host, timeout).await
    }

    /// Load with explicit host state, used when the data directory is not the default
    pub async fn with_host(
        dir: &Path,
        manifest: PluginManifest,
        host: HostState,
        timeout: Duration,
    ) -> Result<Self> {
        let dir = dir.canonicalize().map_err(|e| {
            Error::Plugin(format!("Plugin directory {}: {}", dir.display(), e))
        })?;
        let executable = dir.join(PLUGIN_EXECUTABLE);
        if !executable.is_file() {
            return Err(Error::Plugin(format!(
                "Plugin executable not found: {}",
                executable.display()
            )));
        }

        if let Err(e) = std::fs::create_dir_all(&host.data_dir) {
            warn!(
                "Cannot create data directory {} for plugin {}: {}",
                host.data_dir.display(),
                manifest.adapter.id,
                e
            );
        }
        let sandbox = SandboxPolicy::for_plugin(&dir, &host);
        if !landlock_supported() {
            warn!(
                "Landlock is not available; plugin {} runs without file system confinement",
                manifest.adapter.id
            );
        }

        let info = AdapterInfo {
            id: manifest.adapter.id.clone(),
            name: manifest.adapter.name.clone(),
            version: manifest.adapter.version.clone(),
            capabilities: manifest.capabilities,
            enabled: true,
            is_builtin: false,
            plugin_path: Some(dir.clone()),
            description: manifest.adapter.description.clone(),
            icon: None,
        };

        let mut adapter = Self {
            info,
            manifest,
            dir,
            executable,
            host,
            sandbox,
            timeout,
            next_id: AtomicU64::new(1),
        };

        match adapter.call::<ReportedInfo>("info", Value::Null, None).await {
            Ok(reported) => {
                if let Some(name) = reported.name {
                    adapter.info.name = name;
                }
                if let Some(version) = reported.version {
                    adapter.info.version = version;
                }
                if let Some(description) = reported.description {
                    adapter.info.description = description;
                }
                adapter.info.icon = reported.icon;
            }
            Err(e) if e.is_not_supported() => {}
            Err(e) => warn!("Plugin {} info call failed: {}", adapter.info.id, e),
        }

        match adapter.call::<Capabilities>("capabilities", Value::Null, None).await {
            Ok(capabilities) => adapter.info.capabilities = capabilities,
            Err(e) if e.is_not_supported() => {}
            Err(e) => warn!(
                "Plugin {} capabilities call failed, using manifest: {}",
                adapter.info.id, e
            ),
        }

        info!(
            "Loaded plugin {} {} from {}",
            adapter.info.id,
            adapter.info.version,
            adapter.dir.display()
        );
        Ok(adapter)
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    pub fn data_dir(&self) -> &Path {
        &self.host.data_dir
    }

    /// Run one request against the plugin and decode its result
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        progress: Option<ProgressSender>,
    ) -> Result<T> {
        let request = Request {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: method.to_string(),
            params,
        };
        debug!("plugin {} -> {} (request {})", self.info.id, method, request.id);

        let mut cmd = Command::new(&self.executable);
        cmd.arg(PLUGIN_FLAG)
            .current_dir(&self.dir)
            .env("AERIS_PLUGIN_DATA", &self.host.data_dir)
            .env("TMPDIR", &self.host.data_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        self.sandbox.apply(&mut cmd)?;

        let deadline = Instant::now() + self.timeout;
        let mut child = cmd.spawn().map_err(|e| {
            Error::Plugin(format!(
                "Failed to start plugin {}: {}",
                self.executable.display(),
                e
            ))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Plugin("Plugin stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Plugin("Plugin stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            let id = self.info.id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(plugin = %id, "stderr: {}", line);
                }
            });
        }

        let mut line = serde_json::to_string(&request)?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;

        let outcome =
            tokio::time::timeout_at(deadline, self.converse(&mut stdin, stdout, &progress)).await;

        drop(stdin);
        let value = match outcome {
            Ok(result) => {
                match tokio::time::timeout_at(deadline, child.wait()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => debug!("plugin {} wait failed: {}", self.info.id, e),
                    Err(_) => {
                        debug!("plugin {} still running at its deadline, killing", self.info.id);
                        if let Err(e) = child.kill().await {
                            warn!("Failed to kill plugin {}: {}", self.info.id, e);
                        }
                    }
                }
                result?
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill plugin {}: {}", self.info.id, e);
                }
                return Err(Error::Plugin(format!(
                    "Plugin {} timed out after {} seconds in {}",
                    self.info.id,
                    self.timeout.as_secs(),
                    method
                )));
            }
        };

        serde_json::from_value(value).map_err(|e| {
            Error::Plugin(format!(
                "Plugin {} returned an invalid {} result: {}",
                self.info.id, method, e
            ))
        })
    }

    /// Read plugin messages until a result or error arrives
    async fn converse(
        &self,
        stdin: &mut ChildStdin,
        stdout: ChildStdout,
        progress: &Option<ProgressSender>,
    ) -> Result<Value> {
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let message: PluginMessage = match serde_json::from_str(&line) {
                Ok(message) => message,
                Err(e) => {
                    warn!(plugin = %self.info.id, "Ignoring malformed line ({}): {}", e, line);
                    continue;
                }
            };

            match message {
                PluginMessage::Log { level, message } => self.relay_log(level, &message),
                PluginMessage::Progress { event } => emit(progress, event),
                PluginMessage::HostCall { call_id, call } => {
                    let reply = HostReply::from_result(call_id, self.host.handle(call).await);
                    let mut out = serde_json::to_string(&reply)?;
                    out.push('\n');
                    stdin.write_all(out.as_bytes()).await?;
                    stdin.flush().await?;
                }
                PluginMessage::Result { value } => return Ok(value),
                PluginMessage::Error { message, code } => {
                    if code.as_deref() == Some(NOT_SUPPORTED) {
                        return Err(Error::NotSupported);
                    }
                    return Err(Error::Plugin(format!("{}: {}", self.info.id, message)));
                }
            }
        }
        Err(Error::Plugin(format!(
            "Plugin {} exited without a result",
            self.info.id
        )))
    }

    fn relay_log(&self, level: LogLevel, message: &str) {
        let id = self.info.id.as_str();
        match level {
            LogLevel::Error => error!(plugin = %id, "{}", message),
            LogLevel::Warn => warn!(plugin = %id, "{}", message),
            LogLevel::Info => info!(plugin = %id, "{}", message),
            LogLevel::Debug => debug!(plugin = %id, "{}", message),
            LogLevel::Trace => trace!(plugin = %id, "{}", message),
        }
    }

    fn require(&self, supported: bool) -> Result<()> {
        if supported {
            Ok(())
        } else {
            Err(Error::NotSupported)
        }
    }

    /// Plugins own their packages; never trust a foreign adapter id
    fn claim(&self, mut packages: Vec<Package>) -> Vec<Package> {
        for pkg in &mut packages {
            pkg.adapter_id = self.info.id.clone();
        }
        packages
    }
}

fn mode_param(mode: PackageMode) -> String {
    mode.to_string()
}

#[async_trait]
impl Adapter for PluginAdapter {
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
        mode: PackageMode,
    ) -> Result<Vec<Package>> {
        let packages: Vec<Package> = self
            .call(
                "search",
                json!({ "query": query, "limit": limit, "mode": mode_param(mode) }),
                None,
            )
            .await?;
        let mut packages = self.claim(packages);
        if let Some(limit) = limit {
            packages.truncate(limit);
        }
        Ok(packages)
    }

    async fn package_detail(&self, package_id: &str) -> Result<PackageDetail> {
        self.require(self.info.capabilities.has_package_detail)?;
        let mut detail: PackageDetail = self
            .call("package_detail", json!({ "package_id": package_id }), None)
            .await?;
        detail.package.adapter_id = self.info.id.clone();
        Ok(detail)
    }

    async fn install(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<Vec<InstallResult>> {
        self.require(self.info.capabilities.can_install)?;
        self.call(
            "install",
            json!({ "packages": packages, "mode": mode_param(mode) }),
            progress,
        )
        .await
    }

    async fn remove(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<()> {
        self.require(self.info.capabilities.can_remove)?;
        self.call::<Value>(
            "remove",
            json!({ "packages": packages, "mode": mode_param(mode) }),
            progress,
        )
        .await
        .map(|_| ())
    }

    async fn update(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<Vec<InstallResult>> {
        self.require(self.info.capabilities.can_update)?;
        self.call(
            "update",
            json!({ "packages": packages, "mode": mode_param(mode) }),
            progress,
        )
        .await
    }

    async fn list_installed(&self, mode: PackageMode) -> Result<Vec<InstalledPackage>> {
        let mut installed: Vec<InstalledPackage> = self
            .call("list_installed", json!({ "mode": mode_param(mode) }), None)
            .await?;
        for pkg in &mut installed {
            pkg.package.adapter_id = self.info.id.clone();
            pkg.package.installed = true;
        }
        Ok(installed)
    }

    async fn list_updates(&self, mode: PackageMode) -> Result<Vec<Update>> {
        let mut updates: Vec<Update> = self
            .call("list_updates", json!({ "mode": mode_param(mode) }), None)
            .await?;
        for update in &mut updates {
            update.package.adapter_id = self.info.id.clone();
        }
        Ok(updates)
    }

    async fn sync(&self, progress: Option<ProgressSender>) -> Result<()> {
        self.require(self.info.capabilities.can_sync)?;
        self.call::<Value>("sync", Value::Null, progress)
            .await
            .map(|_| ())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.require(self.info.capabilities.has_profiles)?;
        self.call("list_profiles", Value::Null, None).await
    }

    async fn active_profile(&self) -> Result<Profile> {
        self.require(self.info.capabilities.has_profiles)?;
        self.call("active_profile", Value::Null, None).await
    }

    async fn switch_profile(&self, profile_id: &str) -> Result<()> {
        self.require(self.info.capabilities.has_profiles)?;
        self.call::<Value>("switch_profile", json!({ "profile_id": profile_id }), None)
            .await
            .map(|_| ())
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>> {
        self.require(self.info.capabilities.can_list_repos)?;
        self.call("list_repositories", Value::Null, None).await
    }

    async fn add_repository(&self, repo: &Repository) -> Result<()> {
        self.require(self.info.capabilities.can_add_repo)?;
        self.call::<Value>("add_repository", json!({ "repo": repo }), None)
            .await
            .map(|_| ())
    }

    async fn remove_repository(&self, repo_name: &str) -> Result<()> {
        self.require(self.info.capabilities.can_remove_repo)?;
        self.call::<Value>("remove_repository", json!({ "name": repo_name }), None)
            .await
            .map(|_| ())
    }

    async fn set_repo_enabled(&self, name: &str, enabled: bool, mode: PackageMode) -> Result<()> {
        self.call::<Value>(
            "set_repo_enabled",
            json!({ "name": name, "enabled": enabled, "mode": mode_param(mode) }),
            None,
        )
        .await
        .map(|_| ())
    }

    fn config_schema(&self) -> Option<ConfigSchema> {
        if self.manifest.config.is_empty() {
            return None;
        }
        Some(ConfigSchema {
            adapter_id: self.info.id.clone(),
            fields: self.manifest.config.clone(),
        })
    }

    fn initial_config(&self) -> Option<AdapterConfig> {
        self.config_schema().map(|schema| schema.defaults())
    }

    async fn get_config(&self) -> Result<AdapterConfig> {
        self.call("get_config", Value::Null, None).await
    }

    async fn set_config(&self, config: &AdapterConfig) -> Result<()> {
        self.call::<Value>("set_config", json!({ "config": config }), None)
            .await
            .map(|_| ())
    }

    async fn set_config_for_mode(&self, config: &AdapterConfig, mode: PackageMode) -> Result<()> {
        self.call::<Value>(
            "set_config",
            json!({ "config": config, "mode": mode_param(mode) }),
            None,
        )
        .await
        .map(|_| ())
    }

    async fn run_package(&self, package: &Package, args: &[String]) -> Result<()> {
        self.require(self.info.capabilities.can_run)?;
        self.call::<Value>("run_package", json!({ "package": package, "args": args }), None)
            .await
            .map(|_| ())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        match self.call("health_check", Value::Null, None).await {
            Err(e) if e.is_not_supported() => Ok(HealthStatus {
                healthy: true,
                message: "plugin responded".to_string(),
                ..Default::default()
            }),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::manifest::Permissions;
    use crate::progress::{SilentProgress, drain, progress_channel};
    use std::os::unix::fs::PermissionsExt;

    const MANIFEST: &str = r#"
[adapter]
id = "demo"
name = "Demo"
version = "0.1.0"

[capabilities]
can_search = true
can_install = true
"#;

    /// Write a shell-script plugin answering every request with `body`
    fn write_plugin(dir: &Path, body: &str) {
        std::fs::write(dir.join(MANIFEST_FILE), MANIFEST).unwrap();
        let script = format!("#!/bin/sh\nread request\n{}\n", body);
        let path = dir.join(PLUGIN_EXECUTABLE);
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    async fn load(dir: &Path, timeout: Duration) -> Result<PluginAdapter> {
        let manifest = load_manifest(&dir.join(MANIFEST_FILE))?;
        let host = HostState::with_data_dir(
            "demo",
            Permissions::default(),
            dir.join("data"),
        );
        PluginAdapter::with_host(dir, manifest, host, timeout).await
    }

    #[tokio::test]
    async fn test_manifest_fallback_when_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(
            dir.path(),
            r#"echo '{"type":"error","message":"no","code":"not_supported"}'"#,
        );
        let adapter = load(dir.path(), Duration::from_secs(10)).await.unwrap();
        assert_eq!(adapter.info().name, "Demo");
        assert!(adapter.capabilities().can_search);
        assert!(!adapter.info().is_builtin);
        assert!(matches!(
            adapter.sync(None).await,
            Err(Error::NotSupported)
        ));
    }

    #[tokio::test]
    async fn test_search_result_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(
            dir.path(),
            r#"case "$request" in
  *'"method":"search"'*)
    echo '{"type":"log","level":"info","message":"searching"}'
    echo '{"type":"result","value":[{"id":"hello","name":"hello","version":"2.12","adapter_id":"other"}]}'
    ;;
  *) echo '{"type":"error","message":"no","code":"not_supported"}' ;;
esac"#,
        );
        let adapter = load(dir.path(), Duration::from_secs(10)).await.unwrap();
        let pkgs = adapter.search("hello", None, PackageMode::User).await.unwrap();
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].name, "hello");
        assert_eq!(pkgs[0].adapter_id, "demo");
    }

    #[tokio::test]
    async fn test_host_call_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(
            dir.path(),
            r#"case "$request" in
  *'"method":"search"'*)
    echo '{"type":"host_call","call_id":1,"call":{"op":"fs_exists","path":"marker"}}'
    read reply
    case "$reply" in
      *'"ok":false'*) echo '{"type":"result","value":[]}' ;;
      *) echo '{"type":"error","message":"unexpected reply"}' ;;
    esac
    ;;
  *) echo '{"type":"error","message":"no","code":"not_supported"}' ;;
esac"#,
        );
        let adapter = load(dir.path(), Duration::from_secs(10)).await.unwrap();
        let pkgs = adapter.search("x", None, PackageMode::User).await.unwrap();
        assert!(pkgs.is_empty());
    }

    #[tokio::test]
    async fn test_install_forwards_progress() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(
            dir.path(),
            r#"case "$request" in
  *'"method":"install"'*)
    echo '{"type":"progress","event":{"kind":"completed","adapter_id":"demo","package_name":"hello"}}'
    echo '{"type":"result","value":[{"package_name":"hello","package_id":"hello","version":"2.12","success":true}]}'
    ;;
  *) echo '{"type":"error","message":"no","code":"not_supported"}' ;;
esac"#,
        );
        let adapter = load(dir.path(), Duration::from_secs(10)).await.unwrap();
        let (tx, rx) = progress_channel();
        let pkgs = vec![Package::new("demo", "hello", "2.12")];
        let results = adapter
            .install(&pkgs, Some(tx), PackageMode::User)
            .await
            .unwrap();
        assert!(results[0].success);
        let observer = drain(rx, SilentProgress::new()).await;
        assert_eq!(observer.completed(), 1);
    }

    #[tokio::test]
    async fn test_plugin_error_and_silent_exit() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(
            dir.path(),
            r#"case "$request" in
  *'"method":"search"'*) echo '{"type":"error","message":"index missing"}' ;;
  *'"method":"list_updates"'*) echo 'garbage' ;;
  *) echo '{"type":"error","message":"no","code":"not_supported"}' ;;
esac"#,
        );
        let adapter = load(dir.path(), Duration::from_secs(10)).await.unwrap();
        let err = adapter.search("x", None, PackageMode::User).await.unwrap_err();
        assert!(err.to_string().contains("index missing"));

        let err = adapter.list_updates(PackageMode::User).await.unwrap_err();
        assert!(err.to_string().contains("exited without a result"));
    }

    #[tokio::test]
    async fn test_timeout_kills_plugin() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(
            dir.path(),
            r#"case "$request" in
  *'"method":"search"'*) sleep 30 ;;
  *) echo '{"type":"error","message":"no","code":"not_supported"}' ;;
esac"#,
        );
        let adapter = load(dir.path(), Duration::from_millis(500)).await.unwrap();
        let err = adapter.search("x", None, PackageMode::User).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_lingering_plugin_is_killed_at_deadline() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(
            dir.path(),
            r#"case "$request" in
  *'"method":"search"'*)
    echo '{"type":"result","value":[]}'
    exec >&-
    sleep 6
    ;;
  *) echo '{"type":"error","message":"no","code":"not_supported"}' ;;
esac"#,
        );
        let adapter = load(dir.path(), Duration::from_secs(1)).await.unwrap();
        let started = std::time::Instant::now();
        let pkgs = adapter.search("x", None, PackageMode::User).await.unwrap();
        assert!(pkgs.is_empty());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_plugin_runs_with_data_dir_as_tmpdir() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(
            dir.path(),
            r#"case "$request" in
  *'"method":"search"'*)
    echo scratch > "$TMPDIR/scratch"
    echo '{"type":"result","value":[]}'
    ;;
  *) echo '{"type":"error","message":"no","code":"not_supported"}' ;;
esac"#,
        );
        let adapter = load(dir.path(), Duration::from_secs(10)).await.unwrap();
        adapter.search("x", None, PackageMode::User).await.unwrap();
        assert!(adapter.data_dir().join("scratch").is_file());
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), MANIFEST).unwrap();
        assert!(matches!(
            PluginAdapter::load(dir.path(), Duration::from_secs(1)).await,
            Err(Error::Plugin(_))
        ));
    }
}
