// src/plugin/host.rs

//! Host services offered to plugins
//!
//! Every host call is checked against the plugin's [`Permissions`] before
//! anything touches the system. Denials are reported back to the plugin as
//! an error reply; they never fail the operation on the host side.

use super::manifest::Permissions;
use super::protocol::{ExecOutput, HostCall, HttpResponse};
use crate::error::{Error, Result};
use serde_json::{Value, json};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Per-plugin sandbox state
#[derive(Debug, Clone)]
pub struct HostState {
    pub adapter_id: String,
    pub permissions: Permissions,
    pub data_dir: PathBuf,
}

/// `<data dir>/aeris/plugin-data/<id>`
pub fn plugin_data_dir(adapter_id: &str) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| std::env::temp_dir().join("aeris"))
        .join("aeris")
        .join("plugin-data")
        .join(adapter_id)
}

/// Expand a leading `~/` in a manifest path
pub fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

impl HostState {
    pub fn new(adapter_id: impl Into<String>, permissions: Permissions) -> Self {
        let adapter_id = adapter_id.into();
        let data_dir = plugin_data_dir(&adapter_id);
        Self::with_data_dir(adapter_id, permissions, data_dir)
    }

    pub fn with_data_dir(
        adapter_id: impl Into<String>,
        permissions: Permissions,
        data_dir: PathBuf,
    ) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            permissions,
            data_dir,
        }
    }

    /// Resolve a plugin-supplied path and check it against the allowlist
    ///
    /// Relative paths resolve inside the plugin data directory, which is
    /// always accessible.
    pub fn validate_path(&self, path: &str) -> Result<PathBuf> {
        let requested = Path::new(path);
        if requested
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(Error::PermissionDenied(format!(
                "Path traversal not allowed: {}",
                path
            )));
        }

        let resolved = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.data_dir.join(requested)
        };

        if resolved.starts_with(&self.data_dir) {
            return Ok(resolved);
        }

        for allowed in &self.permissions.filesystem {
            if let Some(allowed_path) = expand_home(allowed)
                && resolved.starts_with(&allowed_path)
            {
                return Ok(resolved);
            }
        }

        Err(Error::PermissionDenied(format!(
            "Path not allowed for plugin '{}': {}",
            self.adapter_id, path
        )))
    }

    /// Check a command against the allowlist and resolve it on PATH
    pub fn validate_command(&self, command: &str) -> Result<PathBuf> {
        let basename = Path::new(command)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(command);

        if !self.permissions.exec_commands.iter().any(|c| c == basename) {
            return Err(Error::PermissionDenied(format!(
                "Command '{}' not in allowlist for plugin '{}'",
                basename, self.adapter_id
            )));
        }

        which::which(basename).map_err(|_| Error::Other(format!("Command not found: {}", basename)))
    }

    pub fn has_network_permission(&self) -> bool {
        self.permissions.network
    }

    /// Perform a host call, returning the reply payload or an error message
    pub async fn handle(&self, call: HostCall) -> std::result::Result<Value, String> {
        debug!("plugin {} host call: {:?}", self.adapter_id, call);
        self.dispatch(call).await.map_err(|e| e.to_string())
    }

    async fn dispatch(&self, call: HostCall) -> Result<Value> {
        match call {
            HostCall::Exec { command, args } => {
                let program = self.validate_command(&command)?;
                let output = tokio::process::Command::new(&program)
                    .args(&args)
                    .stdin(std::process::Stdio::null())
                    .output()
                    .await?;
                Ok(serde_json::to_value(ExecOutput {
                    exit_code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })?)
            }
            HostCall::FsRead { path } => {
                let path = self.validate_path(&path)?;
                let content = tokio::fs::read_to_string(&path).await?;
                Ok(json!({ "content": content }))
            }
            HostCall::FsWrite { path, content } => {
                let path = self.validate_path(&path)?;
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, content).await?;
                Ok(Value::Null)
            }
            HostCall::FsExists { path } => {
                let path = self.validate_path(&path)?;
                Ok(Value::Bool(tokio::fs::try_exists(&path).await.unwrap_or(false)))
            }
            HostCall::HttpGet { url } => {
                if !self.has_network_permission() {
                    return Err(Error::PermissionDenied(format!(
                        "Plugin '{}' has no network permission",
                        self.adapter_id
                    )));
                }
                let url = url::Url::parse(&url)
                    .map_err(|e| Error::Network(format!("Invalid URL '{}': {}", url, e)))?;
                let response = reqwest::get(url)
                    .await
                    .map_err(|e| Error::Network(e.to_string()))?;
                let status = response.status().as_u16();
                let body = response
                    .text()
                    .await
                    .map_err(|e| Error::Network(e.to_string()))?;
                Ok(serde_json::to_value(HttpResponse { status, body })?)
            }
        }
    }
}
