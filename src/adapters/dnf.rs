// src/adapters/dnf.rs

//! Fedora backend: dnf for repositories and transactions, rpm for the
//! installed database
//!
//! Both dnf4 and dnf5 are driven through the same `dnf` command. Where
//! their output or syntax differs, the generation is read once from
//! `dnf --version`.

use super::common::{
    non_empty, package_args, parse_key_value_blocks, parse_size, run_batch, run_system,
};
use super::exec::{self, CommandRunner, args, require_system, resolve_executable, run_allowing};
use crate::adapter::{
    Adapter, AdapterConfig, AdapterInfo, Capabilities, ConfigField, ConfigFieldType, ConfigSchema,
    ConfigValue, HealthStatus,
};
use crate::error::{Error, Result};
use crate::package::{InstallResult, InstalledPackage, Package, PackageDetail, Repository, Update};
use crate::privilege::PackageMode;
use crate::progress::ProgressSender;
use async_trait::async_trait;
use chrono::DateTime;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

pub const DNF_ID: &str = "dnf";

const RPM_FORMAT: &str =
    "%{NAME}\\t%{VERSION}-%{RELEASE}\\t%{SIZE}\\t%{INSTALLTIME}\\t%{SUMMARY}\\n";

const ARCHES: &[&str] = &[
    "x86_64", "i686", "noarch", "aarch64", "armv7hl", "ppc64le", "s390x", "src",
];

pub struct DnfAdapter {
    info: AdapterInfo,
    runner: Arc<dyn CommandRunner>,
    executable: String,
    best: bool,
    dnf5: OnceCell<bool>,
}

impl DnfAdapter {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: &BTreeMap<String, String>) -> Self {
        let executable =
            resolve_executable(settings.get("executable_path").map(String::as_str), "dnf");
        let best = settings.get("best").is_some_and(|v| v == "true");
        Self {
            info: AdapterInfo {
                id: DNF_ID.to_string(),
                name: "DNF".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                capabilities: Capabilities {
                    can_search: true,
                    can_install: true,
                    can_remove: true,
                    can_update: true,
                    can_list: true,
                    can_sync: true,
                    can_list_repos: true,
                    has_groups: true,
                    has_size_info: true,
                    has_package_detail: true,
                    supports_batch_install: true,
                    supports_locks: true,
                    supports_system_packages: true,
                    ..Default::default()
                },
                enabled: true,
                is_builtin: true,
                plugin_path: None,
                description: "Fedora packages via dnf and rpm".to_string(),
                icon: None,
            },
            runner,
            executable,
            best,
            dnf5: OnceCell::new(),
        }
    }

    /// Whether `dnf` is dnf5, which changed several subcommands
    async fn is_dnf5(&self) -> bool {
        *self
            .dnf5
            .get_or_init(|| async {
                match self
                    .runner
                    .run(&self.executable, &args(["--version"]), PackageMode::User)
                    .await
                {
                    Ok(output) => String::from_utf8_lossy(&output.stdout).contains("dnf5"),
                    Err(e) => {
                        debug!("dnf --version failed, assuming dnf4: {}", e);
                        false
                    }
                }
            })
            .await
    }

    pub fn is_available(settings: &BTreeMap<String, String>) -> bool {
        exec::is_available(&resolve_executable(
            settings.get("executable_path").map(String::as_str),
            "dnf",
        )) && exec::is_available("rpm")
    }

    async fn installed_index(&self) -> Result<Vec<InstalledPackage>> {
        let stdout = exec::run_checked(
            self.runner.as_ref(),
            "rpm",
            &args(["-qa", "--qf", RPM_FORMAT]),
            PackageMode::User,
        )
        .await?;
        Ok(parse_rpm_query(DNF_ID, &stdout))
    }

    fn transaction_args(&self, verb: &str, packages: &[Package]) -> Result<Vec<String>> {
        let mut argv = args([verb, "-y"]);
        if self.best {
            argv.push("--best".to_string());
        }
        argv.extend(package_args(packages)?);
        Ok(argv)
    }
}

/// Strip a known architecture suffix: `vim-enhanced.x86_64` -> `vim-enhanced`
fn strip_arch(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((base, arch)) if ARCHES.contains(&arch) => base,
        _ => name,
    }
}

/// Parse `dnf search` output
///
/// dnf4 prints `name.arch : summary` under `=== ... Matched ===` banners.
/// dnf5 prints ` name.arch\tsummary`, indented under `Matched fields:`
/// headers. Indented lines without a tab are dnf4 summary continuations.
pub fn parse_search(adapter_id: &str, output: &str) -> Vec<Package> {
    let mut seen = std::collections::HashSet::new();
    output
        .lines()
        .filter(|line| !line.starts_with('='))
        .filter_map(|line| {
            let (left, summary) = if line.starts_with(char::is_whitespace) {
                line.trim_start().split_once('\t')?
            } else {
                line.split_once(" : ")?
            };
            let left = left.trim();
            if left.contains(char::is_whitespace) {
                return None;
            }
            let name = strip_arch(left);
            if !seen.insert(name.to_string()) {
                return None;
            }
            let mut pkg = Package::new(adapter_id, name, "");
            pkg.description = Some(summary.trim().to_string());
            Some(pkg)
        })
        .collect()
}

/// Parse tab-separated `rpm -qa --qf` output
pub fn parse_rpm_query(adapter_id: &str, output: &str) -> Vec<InstalledPackage> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 4 {
                if !line.trim().is_empty() {
                    warn!("Skipping malformed rpm line: {}", line);
                }
                return None;
            }
            // Imported signing keys show up as packages
            if fields[0] == "gpg-pubkey" {
                return None;
            }
            let mut pkg = Package::new(adapter_id, fields[0], fields[1]);
            pkg.size = fields[2].trim().parse().ok();
            pkg.description = fields
                .get(4)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            let mut installed = InstalledPackage::new(pkg);
            installed.installed_at = fields[3]
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default();
            Some(installed)
        })
        .collect()
}

/// Parse `dnf check-update` lines: `name.arch  version  repo`
///
/// `installed` maps package names to their current versions.
pub fn parse_check_update(
    adapter_id: &str,
    output: &str,
    installed: &HashMap<String, String>,
) -> Vec<Update> {
    let mut updates = Vec::new();
    for line in output.lines() {
        // Obsoletes are listed after the updates and are not upgrades themselves
        if line.starts_with("Obsoleting") {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 3 || line.starts_with(' ') {
            continue;
        }
        let name = strip_arch(parts[0]);
        if name == parts[0] {
            debug!("Ignoring check-update line without arch: {}", line);
            continue;
        }
        let current = installed.get(name).cloned().unwrap_or_default();
        let mut update = Update::new(adapter_id, name, current, parts[1]);
        update.package.category = Some(parts[2].to_string());
        updates.push(update);
    }
    updates
}

/// Parse `dnf repolist --all`
pub fn parse_repolist(output: &str) -> Vec<Repository> {
    output
        .lines()
        .filter(|line| !line.starts_with("repo id") && !line.trim().is_empty())
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let (id, rest) = parts.split_first()?;
            let (enabled, name_parts) = match rest.split_last() {
                Some((&"enabled", name)) => (true, name),
                Some((&"disabled", name)) => (false, name),
                _ => (true, rest),
            };
            Some(Repository {
                name: id.to_string(),
                url: String::new(),
                enabled,
                description: Some(name_parts.join(" ")).filter(|s| !s.is_empty()),
            })
        })
        .collect()
}

/// Parse `dnf info` for one package
pub fn parse_info(adapter_id: &str, output: &str) -> Option<PackageDetail> {
    let block = parse_key_value_blocks(output).into_iter().next()?;
    let name = block.get("Name")?;
    let version = match (block.get("Version"), block.get("Release")) {
        (Some(v), Some(r)) => format!("{}-{}", v, r),
        (Some(v), None) => v.clone(),
        _ => return None,
    };
    let mut pkg = Package::new(adapter_id, name.as_str(), version);
    pkg.description = non_empty(block.get("Summary"));
    pkg.homepage = non_empty(block.get("URL"));
    pkg.license = non_empty(block.get("License"));
    pkg.category = non_empty(block.get("Repository")).or_else(|| non_empty(block.get("Repo")));
    pkg.size = block
        .get("Size")
        .or_else(|| block.get("Installed size"))
        .and_then(|s| parse_size(s));
    let mut detail = PackageDetail::new(pkg);
    detail.readme = non_empty(block.get("Description"));
    Some(detail)
}

#[async_trait]
impl Adapter for DnfAdapter {
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
        // dnf search exits 1 when nothing matches
        let (_, stdout) = run_allowing(
            self.runner.as_ref(),
            &self.executable,
            &args(["search", "-q", query]),
            PackageMode::User,
            &[1],
        )
        .await?;
        let mut packages = parse_search(DNF_ID, &stdout);
        if let Some(limit) = limit {
            packages.truncate(limit);
        }
        if packages.is_empty() {
            return Ok(packages);
        }

        let installed: HashMap<String, String> = match self.installed_index().await {
            Ok(index) => index
                .into_iter()
                .map(|p| (p.package.name, p.package.version))
                .collect(),
            Err(e) => {
                warn!("Could not read rpm database: {}", e);
                HashMap::new()
            }
        };
        for pkg in &mut packages {
            if let Some(version) = installed.get(&pkg.name) {
                pkg.installed = true;
                pkg.version = version.clone();
            }
        }
        Ok(packages)
    }

    async fn package_detail(&self, package_id: &str) -> Result<PackageDetail> {
        let (code, stdout) = run_allowing(
            self.runner.as_ref(),
            &self.executable,
            &args(["info", "-q", package_id]),
            PackageMode::User,
            &[1],
        )
        .await?;
        if code != 0 {
            return Err(Error::PackageNotFound(package_id.to_string()));
        }
        parse_info(DNF_ID, &stdout)
            .ok_or_else(|| Error::Parse(format!("Unexpected dnf info output for {}", package_id)))
    }

    async fn install(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<Vec<InstallResult>> {
        require_system(DNF_ID, mode)?;
        let argv = self.transaction_args("install", packages)?;
        run_batch(
            DNF_ID,
            self.runner.as_ref(),
            &self.executable,
            &argv,
            packages,
            "Installing",
            &progress,
            PackageMode::System,
        )
        .await
    }

    async fn remove(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<()> {
        require_system(DNF_ID, mode)?;
        let mut argv = args(["remove", "-y"]);
        argv.extend(package_args(packages)?);
        let results = run_batch(
            DNF_ID,
            self.runner.as_ref(),
            &self.executable,
            &argv,
            packages,
            "Removing",
            &progress,
            PackageMode::System,
        )
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
        require_system(DNF_ID, mode)?;
        let argv = self.transaction_args("upgrade", packages)?;
        if packages.is_empty() {
            run_system(self.runner.as_ref(), &self.executable, &argv).await?;
            return Ok(Vec::new());
        }
        run_batch(
            DNF_ID,
            self.runner.as_ref(),
            &self.executable,
            &argv,
            packages,
            "Upgrading",
            &progress,
            PackageMode::System,
        )
        .await
    }

    async fn list_installed(&self, _mode: PackageMode) -> Result<Vec<InstalledPackage>> {
        self.installed_index().await
    }

    async fn list_updates(&self, _mode: PackageMode) -> Result<Vec<Update>> {
        // check-update exits 100 when updates are available
        let (code, stdout) = run_allowing(
            self.runner.as_ref(),
            &self.executable,
            &args(["check-update", "-q"]),
            PackageMode::User,
            &[100],
        )
        .await?;
        if code == 0 {
            return Ok(Vec::new());
        }
        let installed: HashMap<String, String> = self
            .installed_index()
            .await?
            .into_iter()
            .map(|p| (p.package.name, p.package.version))
            .collect();
        Ok(parse_check_update(DNF_ID, &stdout, &installed))
    }

    async fn sync(&self, _progress: Option<ProgressSender>) -> Result<()> {
        run_system(self.runner.as_ref(), &self.executable, &args(["makecache"])).await
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>> {
        let stdout = exec::run_checked(
            self.runner.as_ref(),
            &self.executable,
            &args(["repolist", "--all"]),
            PackageMode::User,
        )
        .await?;
        Ok(parse_repolist(&stdout))
    }

    async fn set_repo_enabled(&self, name: &str, enabled: bool, mode: PackageMode) -> Result<()> {
        require_system(DNF_ID, mode)?;
        if name.is_empty() || name.starts_with('-') {
            return Err(Error::Other(format!("Invalid repository name: {:?}", name)));
        }
        let argv = if self.is_dnf5().await {
            let value = if enabled { 1 } else { 0 };
            vec![
                "config-manager".to_string(),
                "setopt".to_string(),
                format!("{}.enabled={}", name, value),
            ]
        } else {
            let flag = if enabled {
                "--set-enabled"
            } else {
                "--set-disabled"
            };
            args(["config-manager", flag, name])
        };
        run_system(self.runner.as_ref(), &self.executable, &argv).await
    }

    fn config_schema(&self) -> Option<ConfigSchema> {
        Some(ConfigSchema {
            adapter_id: DNF_ID.to_string(),
            fields: vec![
                ConfigField {
                    key: "executable_path".to_string(),
                    label: "dnf binary path".to_string(),
                    description: Some("Path to dnf (auto-detected if empty)".to_string()),
                    field_type: ConfigFieldType::ExecutablePath,
                    aeris_managed: true,
                    ..Default::default()
                },
                ConfigField {
                    key: "best".to_string(),
                    label: "Require best candidate".to_string(),
                    description: Some("Pass --best to install and upgrade".to_string()),
                    field_type: ConfigFieldType::Toggle,
                    default: Some(ConfigValue::Bool(false)),
                    aeris_managed: true,
                    ..Default::default()
                },
            ],
        })
    }

    fn initial_config(&self) -> Option<AdapterConfig> {
        let mut config = AdapterConfig::default();
        config.set("executable_path", ConfigValue::String(self.executable.clone()));
        config.set("best", ConfigValue::Bool(self.best));
        Some(config)
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let installed = self.installed_index().await?;
        let repo_count = match self.list_repositories().await {
            Ok(repos) => Some(repos.iter().filter(|r| r.enabled).count() as u32),
            Err(e) => {
                warn!("dnf repolist failed: {}", e);
                None
            }
        };
        Ok(HealthStatus {
            healthy: repo_count.is_some(),
            message: format!("{} and rpm are responding", self.executable),
            package_count: Some(installed.len() as u64),
            repo_count,
            cache_size: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::exec::testing::ScriptedRunner;
    use super::*;

    const RPM: &str = "\
vim-enhanced\t9.1.083-1.fc40\t4123456\t1714000000\tA version of the VIM editor
gpg-pubkey\ta15b79cc-63d04c2c\t0\t1714000000\tFedora key
bash\t5.2.26-3.fc40\t8297583\t1713000000\tThe GNU Bourne Again shell
";

    fn rpm_line() -> String {
        format!("rpm -qa --qf {}", RPM_FORMAT)
    }

    fn adapter(runner: ScriptedRunner) -> (DnfAdapter, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let adapter = DnfAdapter::new(runner.clone(), &BTreeMap::new());
        (adapter, runner)
    }

    #[test]
    fn test_strip_arch() {
        assert_eq!(strip_arch("vim-enhanced.x86_64"), "vim-enhanced");
        assert_eq!(strip_arch("python3.12"), "python3.12");
        assert_eq!(strip_arch("bash"), "bash");
    }

    #[test]
    fn test_parse_search() {
        let out = "\
================ Name Exactly Matched: vim ================
vim-enhanced.x86_64 : A version of the VIM editor which includes recent enhancements
vim-enhanced.i686 : A version of the VIM editor which includes recent enhancements
=================== Name & Summary Matched: vim ===================
neovim.x86_64 : Vim-fork focused on extensibility and agility
";
        let pkgs = parse_search(DNF_ID, out);
        assert_eq!(pkgs.len(), 2);
        assert_eq!(pkgs[0].name, "vim-enhanced");
        assert_eq!(pkgs[1].name, "neovim");
    }

    #[test]
    fn test_parse_dnf5_search() {
        let out = "Updating and loading repositories:
Repositories loaded.
Matched fields: name (exact)
 vim-enhanced.x86_64\tVi IMproved - enhanced version
Matched fields: name, summary
 vim-enhanced.i686\tVi IMproved - enhanced version
 neovim.x86_64\tVim-fork focused on extensibility and usability
";
        let pkgs = parse_search(DNF_ID, out);
        assert_eq!(pkgs.len(), 2);
        assert_eq!(pkgs[0].name, "vim-enhanced");
        assert_eq!(
            pkgs[0].description.as_deref(),
            Some("Vi IMproved - enhanced version")
        );
        assert_eq!(pkgs[1].name, "neovim");
    }

    #[test]
    fn test_parse_dnf4_search_skips_continuations() {
        let out = "\
=================== Name Matched: gimp ===================
gimp.x86_64 : GNU Image Manipulation Program
            : with extra plug-ins
";
        let pkgs = parse_search(DNF_ID, out);
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].name, "gimp");
    }

    #[test]
    fn test_parse_rpm_query() {
        let pkgs = parse_rpm_query(DNF_ID, RPM);
        assert_eq!(pkgs.len(), 2);
        assert_eq!(pkgs[0].package.version, "9.1.083-1.fc40");
        assert_eq!(pkgs[0].install_size, 4123456);
        assert!(pkgs[0].installed_at.starts_with("2024-04-24"));
        assert_eq!(pkgs[1].package.name, "bash");
    }

    #[test]
    fn test_parse_check_update() {
        let out = "
bash.x86_64                 5.2.26-4.fc40          updates
kernel-core.x86_64          6.9.4-200.fc40         updates
Obsoleting Packages
grub2-tools.x86_64          1:2.06-120.fc40        updates
";
        let mut installed = HashMap::new();
        installed.insert("bash".to_string(), "5.2.26-3.fc40".to_string());
        let updates = parse_check_update(DNF_ID, out, &installed);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].current_version, "5.2.26-3.fc40");
        assert_eq!(updates[0].new_version, "5.2.26-4.fc40");
        assert_eq!(updates[1].current_version, "");
        assert_eq!(updates[1].package.category.as_deref(), Some("updates"));
    }

    #[test]
    fn test_parse_repolist() {
        let out = "\
repo id                      repo name                                   status
fedora                       Fedora 40 - x86_64                          enabled
updates-testing              Fedora 40 - x86_64 - Test Updates           disabled
";
        let repos = parse_repolist(out);
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].name, "fedora");
        assert_eq!(repos[0].description.as_deref(), Some("Fedora 40 - x86_64"));
        assert!(!repos[1].enabled);
    }

    #[test]
    fn test_parse_info() {
        let out = "\
Installed Packages
Name         : vim-enhanced
Epoch        : 2
Version      : 9.1.083
Release      : 1.fc40
Architecture : x86_64
Size         : 4.0 M
Repository   : @System
Summary      : A version of the VIM editor which includes recent enhancements
URL          : http://www.vim.org/
License      : Vim AND MIT
Description  : VIM (VIsual editor iMproved) is an updated and improved version of
             : the vi editor.
";
        let detail = parse_info(DNF_ID, out).unwrap();
        assert_eq!(detail.package.version, "9.1.083-1.fc40");
        assert_eq!(detail.package.size, Some(4 * 1024 * 1024));
        assert_eq!(detail.package.license.as_deref(), Some("Vim AND MIT"));
        assert!(detail.readme.as_deref().unwrap().ends_with("the vi editor."));
    }

    #[tokio::test]
    async fn test_list_updates_none_available() {
        let (adapter, runner) = adapter(ScriptedRunner::new().on("dnf check-update -q", 0, ""));
        let updates = adapter.list_updates(PackageMode::User).await.unwrap();
        assert!(updates.is_empty());
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_list_updates_exit_100() {
        let (adapter, _) = adapter(
            ScriptedRunner::new()
                .on(
                    "dnf check-update -q",
                    100,
                    "bash.x86_64    5.2.26-4.fc40    updates\n",
                )
                .on(&rpm_line(), 0, RPM),
        );
        let updates = adapter.list_updates(PackageMode::User).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].current_version, "5.2.26-3.fc40");
    }

    #[tokio::test]
    async fn test_check_update_error_propagates() {
        let (adapter, _) = adapter(
            ScriptedRunner::new().on_err("dnf check-update -q", 1, "Failed to download metadata"),
        );
        assert!(adapter.list_updates(PackageMode::User).await.is_err());
    }

    #[tokio::test]
    async fn test_upgrade_all_with_best() {
        let mut settings = BTreeMap::new();
        settings.insert("best".to_string(), "true".to_string());
        let runner = Arc::new(ScriptedRunner::new().on("dnf upgrade -y --best", 0, ""));
        let adapter = DnfAdapter::new(runner.clone(), &settings);
        let results = adapter.update(&[], None, PackageMode::System).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(runner.calls()[0].1, PackageMode::System);
    }

    #[tokio::test]
    async fn test_set_repo_enabled() {
        let (adapter, runner) = adapter(
            ScriptedRunner::new()
                .on("dnf --version", 0, "4.19.2\n  Installed: dnf-0:4.19.2-1.fc40.noarch\n")
                .on("dnf config-manager --set-disabled updates-testing", 0, ""),
        );
        adapter
            .set_repo_enabled("updates-testing", false, PackageMode::System)
            .await
            .unwrap();
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].1, PackageMode::System);
    }

    #[tokio::test]
    async fn test_set_repo_enabled_dnf5_uses_setopt() {
        let (adapter, runner) = adapter(
            ScriptedRunner::new()
                .on("dnf --version", 0, "dnf5 version 5.2.6.2\ndnf5 plugin API version 2.0\n")
                .on("dnf config-manager setopt updates-testing.enabled=1", 0, "")
                .on("dnf config-manager setopt fedora.enabled=0", 0, ""),
        );
        adapter
            .set_repo_enabled("updates-testing", true, PackageMode::System)
            .await
            .unwrap();
        adapter
            .set_repo_enabled("fedora", false, PackageMode::System)
            .await
            .unwrap();
        // `dnf --version` runs once per adapter
        let versions = runner
            .calls()
            .iter()
            .filter(|(line, _)| line == "dnf --version")
            .count();
        assert_eq!(versions, 1);
        assert_eq!(runner.calls().len(), 3);
    }
}
