// src/adapters/soar.rs

//! Portable packages through the `soar` command-line tool
//!
//! Soar installs into the user's home by default and system-wide with
//! `--system`, so this is the one built-in backend that serves both modes.
//! Package ids are `<repo>.<pkg_id>`; soar itself takes `name#pkg_id:repo`
//! queries. Machine-readable output comes from the global `--json` flag,
//! and soar's own `config.toml` backs the adapter settings.

use super::common::run_batch;
use super::exec::{self, CommandRunner, args, resolve_executable, run_checked};
use crate::adapter::{
    Adapter, AdapterConfig, AdapterInfo, Capabilities, ConfigField, ConfigFieldType, ConfigSchema,
    ConfigValue, HealthStatus,
};
use crate::error::{Error, Result};
use crate::package::{InstallResult, InstalledPackage, Package, Repository, Update};
use crate::privilege::{PackageMode, PrivilegeManager};
use crate::progress::ProgressSender;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SOAR_ID: &str = "soar";

/// Keys of soar's config file exposed as adapter settings
fn soar_fields() -> Vec<ConfigField> {
    let toggle = |key: &str, label: &str, default: bool| ConfigField {
        key: key.to_string(),
        label: label.to_string(),
        field_type: ConfigFieldType::Toggle,
        default: Some(ConfigValue::Bool(default)),
        ..Default::default()
    };
    let number = |key: &str, label: &str, default: i64| ConfigField {
        key: key.to_string(),
        label: label.to_string(),
        field_type: ConfigFieldType::Number,
        default: Some(ConfigValue::Integer(default)),
        ..Default::default()
    };
    vec![
        toggle("parallel", "Parallel downloads", true),
        number("parallel_limit", "Parallel download limit", 4),
        number("search_limit", "Search result limit", 20),
        toggle("signature_verification", "Verify signatures", true),
        toggle("desktop_integration", "Desktop integration", false),
    ]
}

pub struct SoarAdapter {
    info: AdapterInfo,
    runner: Arc<dyn CommandRunner>,
    executable: String,
    config_path: PathBuf,
}

impl SoarAdapter {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: &BTreeMap<String, String>) -> Self {
        let executable = match settings.get("executable_path").map(|p| p.trim()) {
            Some(path) if !path.is_empty() => path.to_string(),
            _ => find_executable(),
        };
        let config_path = settings
            .get("config_path")
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path);
        let system = PrivilegeManager::is_root() || PrivilegeManager::detect_elevator().is_some();

        Self {
            info: AdapterInfo {
                id: SOAR_ID.to_string(),
                name: "Soar".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                capabilities: Capabilities {
                    can_search: true,
                    can_install: true,
                    can_remove: true,
                    can_update: true,
                    can_list: true,
                    can_sync: true,
                    can_list_repos: true,
                    has_size_info: true,
                    supports_batch_install: true,
                    supports_portable: true,
                    supports_user_packages: true,
                    supports_system_packages: system,
                    ..Default::default()
                },
                enabled: true,
                is_builtin: true,
                plugin_path: None,
                description: "Portable packages via soar".to_string(),
                icon: None,
            },
            runner,
            executable,
            config_path,
        }
    }

    pub fn is_available(settings: &BTreeMap<String, String>) -> bool {
        let configured = settings.get("executable_path").map(String::as_str);
        match configured.filter(|p| !p.trim().is_empty()) {
            Some(path) => exec::is_available(&resolve_executable(Some(path), "soar")),
            None => exec::is_available(&find_executable()),
        }
    }

    fn check_mode(&self, mode: PackageMode) -> Result<()> {
        if mode == PackageMode::System && !self.info.capabilities.supports_system_packages {
            return Err(Error::PermissionDenied(
                "soar system mode needs root or an elevator (pkexec, sudo, doas)".to_string(),
            ));
        }
        Ok(())
    }

    /// `<subcommand> [--system] <rest>`
    fn command(subcommand: &str, mode: PackageMode, rest: &[&str]) -> Vec<String> {
        let mut argv = vec![subcommand.to_string()];
        if mode == PackageMode::System {
            argv.push("--system".to_string());
        }
        argv.extend(rest.iter().map(|s| s.to_string()));
        argv
    }

    async fn json(&self, mut argv: Vec<String>, mode: PackageMode) -> Result<Vec<SoarPackage>> {
        argv.insert(0, "--json".to_string());
        let stdout = run_checked(self.runner.as_ref(), &self.executable, &argv, mode).await?;
        parse_records(&stdout)
    }

    async fn transaction(
        &self,
        subcommand: &str,
        rest: &[&str],
        packages: &[Package],
        phase: &str,
        progress: &Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<Vec<InstallResult>> {
        self.check_mode(mode)?;
        let mut argv = Self::command(subcommand, mode, rest);
        for pkg in packages {
            argv.push(package_query(pkg)?);
        }
        run_batch(
            SOAR_ID,
            self.runner.as_ref(),
            &self.executable,
            &argv,
            packages,
            phase,
            progress,
            mode,
        )
        .await
    }

    fn read_config_table(&self) -> Result<toml::Table> {
        match std::fs::read_to_string(&self.config_path) {
            Ok(content) => Ok(content.parse::<toml::Table>()?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(toml::Table::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// First soar binary found in the usual install locations, else `soar` on PATH
fn find_executable() -> String {
    let mut candidates = vec![
        PathBuf::from("/usr/local/bin/soar"),
        PathBuf::from("/usr/bin/soar"),
    ];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".cargo/bin/soar"));
        candidates.push(home.join(".local/bin/soar"));
    }
    candidates
        .into_iter()
        .find(|p| p.is_file())
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "soar".to_string())
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("soar")
        .join("config.toml")
}

/// Query soar resolves to exactly one package: `name#pkg_id:repo`
///
/// Packages without a `<repo>.<pkg_id>` id are passed by name.
pub fn package_query(pkg: &Package) -> Result<String> {
    if pkg.name.is_empty() || pkg.name.starts_with('-') {
        return Err(Error::PackageNotFound(pkg.name.clone()));
    }
    if pkg.id == pkg.name {
        return Ok(pkg.name.clone());
    }
    match pkg.id.split_once('.') {
        Some((repo, pkg_id)) if !repo.is_empty() && !pkg_id.is_empty() => {
            Ok(format!("{}#{}:{}", pkg.name, pkg_id, repo))
        }
        _ => Ok(pkg.name.clone()),
    }
}

/// One package record in soar's JSON output
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SoarPackage {
    #[serde(alias = "name")]
    pub pkg_name: String,
    pub pkg_id: String,
    #[serde(alias = "repo")]
    pub repo_name: String,
    pub version: String,
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_u64", alias = "ghcr_size")]
    pub size: Option<u64>,
    pub homepages: Option<Vec<String>>,
    pub licenses: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub installed: bool,
    pub installed_date: Option<String>,
    pub installed_path: Option<String>,
    pub pinned: bool,
    pub profile: Option<String>,
    pub is_healthy: Option<bool>,
}

impl SoarPackage {
    fn into_package(self) -> Package {
        let id = if self.repo_name.is_empty() || self.pkg_id.is_empty() {
            self.pkg_name.clone()
        } else {
            format!("{}.{}", self.repo_name, self.pkg_id)
        };
        let mut pkg = Package::new(SOAR_ID, self.pkg_name, self.version);
        pkg.id = id;
        pkg.description = self.description.filter(|d| !d.is_empty());
        pkg.size = self.size;
        pkg.homepage = self.homepages.and_then(|h| h.into_iter().next());
        pkg.license = self.licenses.and_then(|l| l.into_iter().next());
        pkg.category = self.categories.and_then(|c| c.into_iter().next());
        pkg.installed = self.installed;
        pkg
    }

    fn into_installed(self) -> InstalledPackage {
        let installed_at = self.installed_date.clone().unwrap_or_default();
        let install_path = self.installed_path.clone();
        let pinned = self.pinned;
        let profile = self.profile.clone();
        let healthy = self.is_healthy.unwrap_or(true);

        let mut installed = InstalledPackage::new(self.into_package());
        installed.installed_at = installed_at;
        installed.install_path = install_path;
        installed.pinned = pinned;
        installed.profile = profile;
        installed.is_healthy = healthy;
        installed
    }
}

/// Sizes show up both as numbers and as numeric strings
fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Package records from `soar --json` output
///
/// The records are either the top-level array or the first array field of
/// the top-level object. Records that do not parse are skipped.
pub fn parse_records(output: &str) -> Result<Vec<SoarPackage>> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(output)
        .map_err(|e| Error::Parse(format!("Unexpected soar output: {}", e)))?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => return Err(Error::Parse("Unexpected soar output".to_string())),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<SoarPackage>(item) {
            Ok(pkg) if !pkg.pkg_name.is_empty() => Some(pkg),
            Ok(_) => None,
            Err(e) => {
                warn!("Skipping malformed soar record: {}", e);
                None
            }
        })
        .collect())
}

/// `[[repositories]]` entries of soar's config file
pub fn parse_repositories(config: &toml::Table) -> Vec<Repository> {
    config
        .get("repositories")
        .and_then(toml::Value::as_array)
        .map(|repos| {
            repos
                .iter()
                .filter_map(|repo| {
                    let name = repo.get("name")?.as_str()?;
                    Some(Repository {
                        name: name.to_string(),
                        url: repo
                            .get("url")
                            .and_then(toml::Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        enabled: repo
                            .get("enabled")
                            .and_then(toml::Value::as_bool)
                            .unwrap_or(true),
                        description: None,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn toml_to_config_value(value: &toml::Value) -> Option<ConfigValue> {
    match value {
        toml::Value::String(s) => Some(ConfigValue::String(s.clone())),
        toml::Value::Integer(i) => Some(ConfigValue::Integer(*i)),
        toml::Value::Boolean(b) => Some(ConfigValue::Bool(*b)),
        toml::Value::Array(items) => Some(ConfigValue::StringList(
            items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect(),
        )),
        _ => None,
    }
}

fn config_value_to_toml(value: &ConfigValue) -> Option<toml::Value> {
    match value {
        ConfigValue::String(s) if s.trim().is_empty() => None,
        ConfigValue::String(s) => Some(toml::Value::String(s.clone())),
        ConfigValue::Integer(i) => Some(toml::Value::Integer(*i)),
        ConfigValue::Bool(b) => Some(toml::Value::Boolean(*b)),
        ConfigValue::StringList(list) => Some(toml::Value::Array(
            list.iter().cloned().map(toml::Value::String).collect(),
        )),
    }
}

fn write_config_table(path: &Path, table: &toml::Table) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(table)
        .map_err(|e| Error::Config(format!("Failed to serialize soar config: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

#[async_trait]
impl Adapter for SoarAdapter {
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
        let records = self
            .json(vec!["search".to_string(), query.to_string()], PackageMode::User)
            .await?;
        let mut packages: Vec<Package> = records.into_iter().map(SoarPackage::into_package).collect();
        if let Some(limit) = limit {
            packages.truncate(limit);
        }
        Ok(packages)
    }

    async fn install(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<Vec<InstallResult>> {
        self.transaction("install", &["--yes"], packages, "Installing", &progress, mode)
            .await
    }

    async fn remove(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<()> {
        let results = self
            .transaction("remove", &[], packages, "Removing", &progress, mode)
            .await?;
        match results.into_iter().find(|r| !r.success) {
            Some(failed) => Err(Error::Other(failed.error.unwrap_or_default())),
            None => Ok(()),
        }
    }

    async fn update(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<Vec<InstallResult>> {
        if packages.is_empty() {
            self.check_mode(mode)?;
            let argv = Self::command("update", mode, &[]);
            run_checked(self.runner.as_ref(), &self.executable, &argv, mode).await?;
            info!("soar: updated all {} packages", mode);
            return Ok(Vec::new());
        }
        self.transaction("update", &[], packages, "Upgrading", &progress, mode)
            .await
    }

    async fn list_installed(&self, mode: PackageMode) -> Result<Vec<InstalledPackage>> {
        self.check_mode(mode)?;
        let records = self.json(Self::command("info", mode, &[]), mode).await?;
        Ok(records
            .into_iter()
            .map(SoarPackage::into_installed)
            .collect())
    }

    /// soar only reports updates while applying them
    async fn list_updates(&self, _mode: PackageMode) -> Result<Vec<Update>> {
        Err(Error::NotSupported)
    }

    async fn sync(&self, _progress: Option<ProgressSender>) -> Result<()> {
        run_checked(
            self.runner.as_ref(),
            &self.executable,
            &args(["sync"]),
            PackageMode::User,
        )
        .await
        .map(|_| ())
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>> {
        Ok(parse_repositories(&self.read_config_table()?))
    }

    fn config_schema(&self) -> Option<ConfigSchema> {
        let mut fields = vec![
            ConfigField {
                key: "executable_path".to_string(),
                label: "soar binary path".to_string(),
                description: Some("Path to soar (auto-detected if empty)".to_string()),
                field_type: ConfigFieldType::ExecutablePath,
                aeris_managed: true,
                ..Default::default()
            },
            ConfigField {
                key: "config_path".to_string(),
                label: "soar config file".to_string(),
                description: Some("Defaults to ~/.config/soar/config.toml".to_string()),
                field_type: ConfigFieldType::Text,
                aeris_managed: true,
                ..Default::default()
            },
        ];
        fields.extend(soar_fields());
        Some(ConfigSchema {
            adapter_id: SOAR_ID.to_string(),
            fields,
        })
    }

    fn initial_config(&self) -> Option<AdapterConfig> {
        let mut config = self.config_schema()?.defaults();
        config.set("executable_path", ConfigValue::String(self.executable.clone()));
        config.set(
            "config_path",
            ConfigValue::String(self.config_path.display().to_string()),
        );
        Some(config)
    }

    async fn get_config(&self) -> Result<AdapterConfig> {
        let table = self.read_config_table()?;
        let mut config = self.initial_config().unwrap_or_default();
        for field in soar_fields() {
            if let Some(value) = table.get(&field.key).and_then(toml_to_config_value) {
                config.set(field.key, value);
            }
        }
        Ok(config)
    }

    async fn set_config(&self, config: &AdapterConfig) -> Result<()> {
        let mut table = self.read_config_table()?;
        for field in soar_fields() {
            let Some(value) = config.get(&field.key) else {
                continue;
            };
            match config_value_to_toml(value) {
                Some(value) => {
                    table.insert(field.key, value);
                }
                None => {
                    table.remove(&field.key);
                }
            }
        }
        write_config_table(&self.config_path, &table)?;
        debug!("Wrote soar settings to {}", self.config_path.display());
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let output = self
            .runner
            .run(&self.executable, &args(["--version"]), PackageMode::User)
            .await?;
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(HealthStatus {
            healthy: output.status.success(),
            message: if version.is_empty() {
                format!("{} did not report a version", self.executable)
            } else {
                version
            },
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::exec::testing::ScriptedRunner;
    use super::*;

    const SEARCH: &str = r#"[
  {"pkg_name":"ripgrep","pkg_id":"github.com.BurntSushi.ripgrep","repo_name":"bincache",
   "version":"14.1.1","description":"Recursive grep","size":"2048000",
   "homepages":["https://github.com/BurntSushi/ripgrep"],"licenses":["MIT"]},
  {"pkg_name":"rg-lite","pkg_id":"rg-lite","repo_name":"pkgcache","version":"0.1","size":10},
  {"pkg_id":"nameless"}
]"#;

    const INFO: &str = r#"{"packages":[
  {"pkg_name":"fd","pkg_id":"fd","repo_name":"bincache","version":"10.2.0",
   "installed_date":"2025-01-05T10:00:00Z","installed_path":"/home/u/.local/share/soar/packages/fd",
   "profile":"default","pinned":true,"size":1200}
]}"#;

    fn adapter(runner: ScriptedRunner) -> (SoarAdapter, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let mut settings = BTreeMap::new();
        settings.insert("executable_path".to_string(), "soar".to_string());
        let adapter = SoarAdapter::new(runner.clone(), &settings);
        (adapter, runner)
    }

    fn with_system(mut adapter: SoarAdapter) -> SoarAdapter {
        adapter.info.capabilities.supports_system_packages = true;
        adapter
    }

    #[test]
    fn test_parse_records() {
        let records = parse_records(SEARCH).unwrap();
        assert_eq!(records.len(), 2);
        let pkg = records[0].clone().into_package();
        assert_eq!(pkg.id, "bincache.github.com.BurntSushi.ripgrep");
        assert_eq!(pkg.adapter_id, SOAR_ID);
        assert_eq!(pkg.size, Some(2048000));
        assert_eq!(pkg.license.as_deref(), Some("MIT"));
        assert_eq!(records[1].size, Some(10));

        let installed = parse_records(INFO).unwrap().remove(0).into_installed();
        assert!(installed.package.installed);
        assert!(installed.pinned);
        assert_eq!(installed.profile.as_deref(), Some("default"));
        assert!(installed.installed_at.starts_with("2025-01-05"));

        assert!(parse_records("").unwrap().is_empty());
        assert!(matches!(parse_records("not json"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_package_query() {
        let mut pkg = Package::new(SOAR_ID, "ripgrep", "14.1.1");
        pkg.id = "bincache.github.com.BurntSushi.ripgrep".to_string();
        assert_eq!(
            package_query(&pkg).unwrap(),
            "ripgrep#github.com.BurntSushi.ripgrep:bincache"
        );
        assert_eq!(
            package_query(&Package::new(SOAR_ID, "fd", "")).unwrap(),
            "fd"
        );
        assert_eq!(
            package_query(&Package::new(SOAR_ID, "python3.12", "")).unwrap(),
            "python3.12"
        );
        assert!(package_query(&Package::new(SOAR_ID, "--yes", "")).is_err());
    }

    #[tokio::test]
    async fn test_search_applies_limit() {
        let (adapter, runner) =
            adapter(ScriptedRunner::new().on("soar --json search rip", 0, SEARCH));
        let pkgs = adapter.search("rip", Some(1), PackageMode::User).await.unwrap();
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].name, "ripgrep");
        assert_eq!(runner.calls()[0].1, PackageMode::User);
    }

    #[tokio::test]
    async fn test_user_install_runs_unelevated() {
        let (adapter, runner) = adapter(ScriptedRunner::new().on(
            "soar install --yes ripgrep#github.com.BurntSushi.ripgrep:bincache",
            0,
            "",
        ));
        let mut pkg = Package::new(SOAR_ID, "ripgrep", "14.1.1");
        pkg.id = "bincache.github.com.BurntSushi.ripgrep".to_string();
        let results = adapter
            .install(&[pkg], None, PackageMode::User)
            .await
            .unwrap();
        assert!(results[0].success);
        assert_eq!(runner.calls()[0].1, PackageMode::User);
    }

    #[tokio::test]
    async fn test_system_install_passes_system_flag() {
        let (adapter, runner) =
            adapter(ScriptedRunner::new().on("soar install --system --yes fd", 0, ""));
        let adapter = with_system(adapter);
        let results = adapter
            .install(&[Package::new(SOAR_ID, "fd", "")], None, PackageMode::System)
            .await
            .unwrap();
        assert!(results[0].success);
        assert_eq!(runner.calls()[0].1, PackageMode::System);
    }

    #[tokio::test]
    async fn test_system_mode_without_elevator_is_denied() {
        let (mut adapter, runner) = adapter(ScriptedRunner::new());
        adapter.info.capabilities.supports_system_packages = false;
        let err = adapter
            .remove(&[Package::new(SOAR_ID, "fd", "")], None, PackageMode::System)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_list_installed_and_update_all() {
        let (adapter, runner) = adapter(
            ScriptedRunner::new()
                .on("soar --json info", 0, INFO)
                .on("soar update", 0, ""),
        );
        let installed = adapter.list_installed(PackageMode::User).await.unwrap();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].package.name, "fd");

        let results = adapter.update(&[], None, PackageMode::User).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_settings_live_in_soar_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("soar").join("config.toml");
        std::fs::create_dir_all(config_path.parent().unwrap()).unwrap();
        std::fs::write(
            &config_path,
            r#"parallel_limit = 8

[[repositories]]
name = "bincache"
url = "https://meta.pkgforge.dev/bincache/x86_64-Linux.sdb.zstd"

[[repositories]]
name = "pkgcache"
url = "https://meta.pkgforge.dev/pkgcache/x86_64-Linux.sdb.zstd"
enabled = false
"#,
        )
        .unwrap();

        let mut settings = BTreeMap::new();
        settings.insert("config_path".to_string(), config_path.display().to_string());
        let adapter = SoarAdapter::new(Arc::new(ScriptedRunner::new()), &settings);

        let repos = adapter.list_repositories().await.unwrap();
        assert_eq!(repos.len(), 2);
        assert!(repos[0].enabled);
        assert!(!repos[1].enabled);

        let mut config = adapter.get_config().await.unwrap();
        assert_eq!(config.get("parallel_limit"), Some(&ConfigValue::Integer(8)));
        assert_eq!(config.get("search_limit"), Some(&ConfigValue::Integer(20)));

        config.set("desktop_integration", ConfigValue::Bool(true));
        adapter.set_config(&config).await.unwrap();

        let written: toml::Table = std::fs::read_to_string(&config_path)
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(written["desktop_integration"].as_bool(), Some(true));
        assert_eq!(written["repositories"].as_array().unwrap().len(), 2);
        assert!(written.get("executable_path").is_none());
    }
}
