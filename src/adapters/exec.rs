// src/adapters/exec.rs
//! Subprocess execution shared by the built-in backends
//!
//! Backends never spawn processes directly: they go through a
//! [`CommandRunner`] so that system-mode calls are elevated consistently
//! and tests can substitute canned output.

use crate::error::{Error, Result};
use crate::privilege::{PackageMode, PrivilegeManager};
use async_trait::async_trait;
use std::process::Output;
use std::sync::Arc;
use tracing::debug;

/// Runs a backend command, elevating in system mode
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String], mode: PackageMode) -> Result<Output>;
}

/// Runner backed by real processes and a [`PrivilegeManager`]
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    privilege: PrivilegeManager,
}

impl SystemRunner {
    pub fn new(privilege: PrivilegeManager) -> Self {
        Self { privilege }
    }

    pub fn shared(privilege: PrivilegeManager) -> Arc<dyn CommandRunner> {
        Arc::new(Self::new(privilege))
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String], mode: PackageMode) -> Result<Output> {
        Ok(self.privilege.run(mode, program, args).await?)
    }
}

/// Convert `&str` arguments into owned ones
pub fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items.into_iter().map(|s| s.as_ref().to_string()).collect()
}

/// Run and return stdout, failing on a non-zero exit
pub async fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[String],
    mode: PackageMode,
) -> Result<String> {
    let output = runner.run(program, args, mode).await?;
    if !output.status.success() {
        return Err(Error::command_failed(program, &output));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run and return stdout, treating the listed exit codes as success
pub async fn run_allowing(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[String],
    mode: PackageMode,
    allowed: &[i32],
) -> Result<(i32, String)> {
    let output = runner.run(program, args, mode).await?;
    let code = output.status.code().unwrap_or(-1);
    if !output.status.success() && !allowed.contains(&code) {
        return Err(Error::command_failed(program, &output));
    }
    debug!("{} exited with {}", program, code);
    Ok((code, String::from_utf8_lossy(&output.stdout).into_owned()))
}

/// Built-in backends only manage system packages
pub fn require_system(adapter_id: &str, mode: PackageMode) -> Result<()> {
    if mode == PackageMode::User {
        return Err(Error::PermissionDenied(format!(
            "{} manages system packages only; rerun with --system",
            adapter_id
        )));
    }
    Ok(())
}

/// Resolve the backend binary: a configured path wins over the default name
pub fn resolve_executable(configured: Option<&str>, default: &str) -> String {
    configured
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default.to_string())
}

/// True when `program` resolves on PATH (or is an existing path)
pub fn is_available(program: &str) -> bool {
    which::which(program).is_ok()
}
