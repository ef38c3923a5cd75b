// src/adapters/common.rs
//! Helpers shared by the built-in backends

use super::exec::CommandRunner;
use crate::error::{Error, Result};
use crate::package::{InstallResult, Package};
use crate::privilege::PackageMode;
use crate::progress::{ProgressEvent, ProgressSender, emit};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Run one backend command for a whole batch and report per-package results
///
/// Backends install a batch in a single transaction, so the batch either
/// succeeds or fails as a unit.
#[allow(clippy::too_many_arguments)]
pub async fn run_batch(
    adapter_id: &str,
    runner: &dyn CommandRunner,
    program: &str,
    args: &[String],
    packages: &[Package],
    phase: &str,
    progress: &Option<ProgressSender>,
    mode: PackageMode,
) -> Result<Vec<InstallResult>> {
    let total = packages.len() as u32;
    for pkg in packages {
        emit(
            progress,
            ProgressEvent::Phase {
                adapter_id: adapter_id.to_string(),
                package_name: pkg.name.clone(),
                phase: phase.to_string(),
                progress_percent: 0.0,
            },
        );
    }

    let output = runner.run(program, args, mode).await?;
    if output.status.success() {
        info!("{}: {} {} package(s)", adapter_id, phase, packages.len());
        for pkg in packages {
            emit(
                progress,
                ProgressEvent::Completed {
                    adapter_id: adapter_id.to_string(),
                    package_name: pkg.name.clone(),
                },
            );
        }
        emit(
            progress,
            ProgressEvent::BatchProgress {
                adapter_id: adapter_id.to_string(),
                completed: total,
                total,
                failed: 0,
            },
        );
        return Ok(packages.iter().map(InstallResult::ok).collect());
    }

    let error = Error::command_failed(program, &output).to_string();
    warn!("{}: {} failed: {}", adapter_id, phase, error);
    for pkg in packages {
        emit(
            progress,
            ProgressEvent::Failed {
                adapter_id: adapter_id.to_string(),
                package_name: pkg.name.clone(),
                error: error.clone(),
            },
        );
    }
    emit(
        progress,
        ProgressEvent::BatchProgress {
            adapter_id: adapter_id.to_string(),
            completed: 0,
            total,
            failed: total,
        },
    );
    Ok(packages
        .iter()
        .map(|pkg| InstallResult::failed(pkg, error.clone()))
        .collect())
}

/// Package names as backend arguments
///
/// Every backend would parse a name starting with `-` as an option, so
/// such names are refused before anything runs.
pub fn package_args(packages: &[Package]) -> Result<Vec<String>> {
    packages
        .iter()
        .map(|pkg| {
            if pkg.name.is_empty() || pkg.name.starts_with('-') {
                Err(Error::PackageNotFound(pkg.name.clone()))
            } else {
                Ok(pkg.name.clone())
            }
        })
        .collect()
}

/// Run a command whose failure fails the whole operation
pub async fn run_system(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[String],
) -> Result<()> {
    let output = runner.run(program, args, PackageMode::System).await?;
    if !output.status.success() {
        return Err(Error::command_failed(program, &output));
    }
    Ok(())
}

/// Parse a size such as "1.5 MiB" or "100 KiB" into bytes
pub fn parse_size(s: &str) -> Option<u64> {
    let parts: Vec<&str> = s.split_whitespace().collect();
    if parts.len() != 2 {
        return None;
    }

    let num: f64 = parts[0].replace(',', ".").parse().ok()?;
    let multiplier = match parts[1] {
        "B" => 1.0,
        "KiB" | "k" | "KB" => 1024.0,
        "MiB" | "M" | "MB" => 1024.0 * 1024.0,
        "GiB" | "G" | "GB" => 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };

    Some((num * multiplier) as u64)
}

/// Parse `Key : Value` blocks separated by blank lines
///
/// Lines without a separator continue the previous value. Used for
/// `pacman -Qi`, `pacman -Si` and `dnf info`.
pub fn parse_key_value_blocks(text: &str) -> Vec<BTreeMap<String, String>> {
    let mut blocks = Vec::new();
    let mut current: BTreeMap<String, String> = BTreeMap::new();
    let mut last_key: Option<String> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            last_key = None;
            continue;
        }

        if !line.starts_with(char::is_whitespace) {
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim().to_string();
                current.insert(key.clone(), value.trim().to_string());
                last_key = Some(key);
            }
            continue;
        }

        let Some(existing) = last_key.as_ref().and_then(|k| current.get_mut(k)) else {
            continue;
        };
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix(':') {
            // dnf continuation: "             : more text"
            existing.push(' ');
            existing.push_str(rest.trim());
        } else {
            existing.push('\n');
            existing.push_str(trimmed.trim_end());
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// `None` for empty strings and the backend placeholder "None"
pub fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && *v != "None" && *v != "(none)")
        .map(str::to_string)
}
