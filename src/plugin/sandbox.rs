// src/plugin/sandbox.rs

//! Kernel-level confinement for plugin processes
//!
//! Host calls are checked against the manifest, but nothing stops a plugin
//! from touching the system directly. Before the plugin executable starts,
//! the child restricts itself:
//!
//! - landlock: read and execute access to system directories and the plugin
//!   directory, read-write access only to the plugin data directory and the
//!   manifest's `filesystem` paths
//! - seccomp: unless the manifest grants `network`, creating an IPv4 or IPv6
//!   socket fails with `EACCES`
//!
//! Landlock runs in best-effort mode. On kernels without it the plugin still
//! starts, unconfined, and a warning is logged when the plugin loads.

use super::host::{HostState, expand_home};
use crate::error::{Error, Result};
use landlock::{
    ABI, Access, AccessFs, Ruleset, RulesetAttr, RulesetCreated, RulesetCreatedAttr,
    path_beneath_rules,
};
use seccompiler::{
    BpfProgram, SeccompAction, SeccompCmpArgLen, SeccompCmpOp, SeccompCondition, SeccompFilter,
    SeccompRule, TargetArch,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

const LANDLOCK_ABI: ABI = ABI::V2;

/// System locations every plugin may read and execute from
const SYSTEM_READ_PATHS: &[&str] = &[
    "/usr", "/bin", "/sbin", "/lib", "/lib64", "/etc", "/opt", "/nix", "/proc", "/dev/urandom",
];

/// Device files a plugin may write to
const SYSTEM_WRITE_PATHS: &[&str] = &["/dev/null"];

/// File system and network policy for one plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    pub read_exec: Vec<PathBuf>,
    pub read_write: Vec<PathBuf>,
    pub network: bool,
}

impl SandboxPolicy {
    /// Policy for the plugin installed in `plugin_dir`
    ///
    /// Paths that do not exist are left out; landlock can only attach rules
    /// to existing files.
    pub fn for_plugin(plugin_dir: &Path, host: &HostState) -> Self {
        let mut read_exec: Vec<PathBuf> = SYSTEM_READ_PATHS.iter().map(PathBuf::from).collect();
        read_exec.push(plugin_dir.to_path_buf());

        let mut read_write: Vec<PathBuf> = SYSTEM_WRITE_PATHS.iter().map(PathBuf::from).collect();
        read_write.push(host.data_dir.clone());
        read_write.extend(
            host.permissions
                .filesystem
                .iter()
                .filter_map(|p| expand_home(p)),
        );

        read_exec.retain(|p| p.exists());
        read_write.retain(|p| p.exists());

        Self {
            read_exec,
            read_write,
            network: host.permissions.network,
        }
    }

    /// Install the restrictions on `cmd`, applied in the child right before exec
    pub fn apply(&self, cmd: &mut Command) -> Result<()> {
        let mut ruleset = Some(self.ruleset()?);
        let mut filter = if self.network {
            None
        } else {
            network_filter()?
        };

        // SAFETY: the closure runs between fork and exec and only issues the
        // prctl, landlock and seccomp syscalls; everything it needs was
        // built in the parent.
        unsafe {
            cmd.pre_exec(move || {
                if let Some(ruleset) = ruleset.take() {
                    ruleset.restrict_self().map_err(std::io::Error::other)?;
                }
                if let Some(program) = filter.take() {
                    seccompiler::apply_filter(&program).map_err(std::io::Error::other)?;
                }
                Ok(())
            });
        }
        Ok(())
    }

    fn ruleset(&self) -> Result<RulesetCreated> {
        let abi = LANDLOCK_ABI;
        Ruleset::default()
            .handle_access(AccessFs::from_all(abi))
            .and_then(|r| r.create())
            .and_then(|r| r.add_rules(path_beneath_rules(&self.read_exec, AccessFs::from_read(abi))))
            .and_then(|r| r.add_rules(path_beneath_rules(&self.read_write, AccessFs::from_all(abi))))
            .map_err(|e| Error::Plugin(format!("Failed to build landlock ruleset: {}", e)))
    }
}

/// Seccomp program that refuses IPv4 and IPv6 sockets
///
/// Returns `None` on architectures seccompiler cannot target.
pub fn network_filter() -> Result<Option<BpfProgram>> {
    let arch = match TargetArch::try_from(std::env::consts::ARCH) {
        Ok(arch) => arch,
        Err(e) => {
            debug!("No seccomp network filter on {}: {}", std::env::consts::ARCH, e);
            return Ok(None);
        }
    };

    let deny_family = |family: libc::c_int| {
        SeccompCondition::new(0, SeccompCmpArgLen::Dword, SeccompCmpOp::Eq, family as u64)
            .and_then(|cond| SeccompRule::new(vec![cond]))
    };
    let rules = vec![deny_family(libc::AF_INET), deny_family(libc::AF_INET6)]
        .into_iter()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(seccomp_error)?;

    let mut syscalls: BTreeMap<i64, Vec<SeccompRule>> = BTreeMap::new();
    syscalls.insert(i64::from(libc::SYS_socket), rules);

    let filter = SeccompFilter::new(
        syscalls,
        SeccompAction::Allow,
        SeccompAction::Errno(libc::EACCES as u32),
        arch,
    )
    .map_err(seccomp_error)?;
    let program: BpfProgram = filter.try_into().map_err(seccomp_error)?;
    Ok(Some(program))
}

fn seccomp_error(e: impl std::fmt::Display) -> Error {
    Error::Plugin(format!("Failed to build seccomp filter: {}", e))
}

/// Whether the running kernel has landlock enabled
pub fn landlock_supported() -> bool {
    std::fs::read_to_string("/sys/kernel/security/lsm")
        .map(|lsm| lsm.split(',').any(|m| m.trim() == "landlock"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::manifest::Permissions;

    #[test]
    fn test_policy_paths() {
        let root = tempfile::tempdir().unwrap();
        let plugin_dir = root.path().join("demo");
        let data_dir = root.path().join("data");
        let shared = root.path().join("shared");
        for dir in [&plugin_dir, &data_dir, &shared] {
            std::fs::create_dir_all(dir).unwrap();
        }

        let permissions = Permissions {
            network: false,
            filesystem: vec![
                shared.display().to_string(),
                root.path().join("missing").display().to_string(),
            ],
            exec_commands: Vec::new(),
        };
        let host = HostState::with_data_dir("demo", permissions, data_dir.clone());
        let policy = SandboxPolicy::for_plugin(&plugin_dir, &host);

        assert!(policy.read_exec.contains(&plugin_dir));
        assert!(policy.read_exec.contains(&PathBuf::from("/usr")));
        assert!(!policy.read_write.contains(&plugin_dir));
        assert!(policy.read_write.contains(&data_dir));
        assert!(policy.read_write.contains(&shared));
        assert!(!policy.read_write.contains(&root.path().join("missing")));
        assert!(!policy.read_write.contains(&root.path().to_path_buf()));
        assert!(!policy.network);
    }

    #[test]
    fn test_network_permission_carries_over() {
        let root = tempfile::tempdir().unwrap();
        let permissions = Permissions {
            network: true,
            ..Default::default()
        };
        let host = HostState::with_data_dir("net", permissions, root.path().to_path_buf());
        assert!(SandboxPolicy::for_plugin(root.path(), &host).network);
    }

    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    #[test]
    fn test_network_filter_compiles() {
        let program = network_filter().unwrap().unwrap();
        assert!(!program.is_empty());
    }

    #[test]
    fn test_apply_builds_ruleset() {
        let root = tempfile::tempdir().unwrap();
        let host = HostState::with_data_dir("demo", Permissions::default(), root.path().to_path_buf());
        let policy = SandboxPolicy::for_plugin(root.path(), &host);
        let mut cmd = Command::new("true");
        policy.apply(&mut cmd).unwrap();
    }
}
