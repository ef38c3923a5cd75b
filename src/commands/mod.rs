// src/commands/mod.rs
//! Command handlers for the Aeris CLI

mod adapter;
mod config;
mod package;
mod plugin;
mod profile;
pub mod progress;
mod repo;

pub use adapter::{
    cmd_adapter_disable, cmd_adapter_enable, cmd_adapter_health, cmd_adapter_info,
    cmd_adapter_list,
};
pub use config::{cmd_config_get, cmd_config_set, cmd_config_show, cmd_config_unset};
pub use package::{
    cmd_dashboard, cmd_info, cmd_install, cmd_list, cmd_remove, cmd_run, cmd_search, cmd_sync,
    cmd_update, cmd_updates,
};
pub use plugin::{cmd_plugin_available, cmd_plugin_install, cmd_plugin_list, cmd_plugin_remove};
pub use profile::{cmd_profile_list, cmd_profile_switch};
pub use repo::{cmd_repo_add, cmd_repo_list, cmd_repo_remove, cmd_repo_set_enabled};

use aeris::{AdapterManager, AerisConfig, InstallResult, PackageMode, Package};
use anyhow::{Result, bail};
use std::path::PathBuf;

/// State shared by every command handler
pub struct Context {
    pub manager: AdapterManager,
    pub config: AerisConfig,
    pub config_path: PathBuf,
    pub mode: PackageMode,
    pub quiet: bool,
}

impl Context {
    /// Persist the config file
    pub fn save_config(&self) -> Result<()> {
        self.config.save_to(&self.config_path)?;
        Ok(())
    }
}

/// Split `adapter:name` when the prefix names a registered adapter
///
/// Names such as `libc6:amd64` keep their colon when `libc6` is not an adapter.
pub fn split_qualified<'a>(manager: &AdapterManager, target: &'a str) -> Option<(&'a str, &'a str)> {
    let (adapter, name) = target.split_once(':')?;
    if adapter.is_empty() || name.is_empty() || manager.get_adapter(adapter).is_none() {
        return None;
    }
    Some((adapter, name))
}

/// Pick the package a plain name refers to among exact-name candidates
///
/// One candidate wins outright. With several, the default adapter wins the tie;
/// otherwise the user must qualify the name.
pub fn pick_candidate(
    name: &str,
    mut candidates: Vec<Package>,
    default_adapter: Option<&str>,
) -> Result<Package> {
    candidates.retain(|p| p.name == name);
    match candidates.len() {
        0 => bail!("Package '{}' not found in any enabled adapter", name),
        1 => Ok(candidates.remove(0)),
        _ => {
            if let Some(default) = default_adapter
                && let Some(pos) = candidates.iter().position(|p| p.adapter_id == default)
            {
                return Ok(candidates.swap_remove(pos));
            }
            let choices: Vec<String> = candidates.iter().map(Package::qualified_id).collect();
            bail!(
                "Package '{}' is provided by several adapters: {}\nUse adapter:name to choose one.",
                name,
                choices.join(", ")
            )
        }
    }
}

/// Print one line per result and return the number of failures
pub fn print_results(verb: &str, results: &[InstallResult]) -> usize {
    let mut failed = 0;
    for result in results {
        if result.success {
            if result.version.is_empty() {
                println!("[OK] {} {}", verb, result.package_name);
            } else {
                println!("[OK] {} {} {}", verb, result.package_name, result.version);
            }
        } else {
            failed += 1;
            println!(
                "[FAILED] {} {}: {}",
                verb,
                result.package_name,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    failed
}

/// Truncate `text` to `max` characters, adding an ellipsis when cut
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(adapter: &str, name: &str) -> Package {
        Package::new(adapter, name, "1.0")
    }

    #[test]
    fn test_pick_single_exact_match() {
        let candidates = vec![pkg("apt", "vim"), pkg("apt", "vim-gtk3")];
        let picked = pick_candidate("vim", candidates, None).unwrap();
        assert_eq!(picked.qualified_id(), "apt:vim");
    }

    #[test]
    fn test_pick_default_adapter_wins_tie() {
        let candidates = vec![pkg("apt", "vim"), pkg("pacman", "vim")];
        let picked = pick_candidate("vim", candidates, Some("pacman")).unwrap();
        assert_eq!(picked.adapter_id, "pacman");
    }

    #[test]
    fn test_pick_ambiguous_without_default() {
        let candidates = vec![pkg("apt", "vim"), pkg("pacman", "vim")];
        let err = pick_candidate("vim", candidates, Some("dnf")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("apt:vim"));
        assert!(msg.contains("pacman:vim"));
    }

    #[test]
    fn test_pick_not_found() {
        let err = pick_candidate("vim", vec![pkg("apt", "neovim")], None).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long summary", 10), "a very ...");
    }

    #[test]
    fn test_print_results_counts_failures() {
        let package = pkg("apt", "vim");
        let results = vec![
            InstallResult::ok(&package),
            InstallResult::failed(&package, "held"),
        ];
        assert_eq!(print_results("Installed", &results), 1);
    }
}
