// src/adapters/mod.rs

//! Built-in adapters for the distribution package managers and soar
//!
//! Only backends whose binaries are present on the host are registered.

pub mod apt;
mod common;
pub mod dnf;
pub mod exec;
pub mod pacman;
pub mod soar;

pub use apt::AptAdapter;
pub use dnf::DnfAdapter;
pub use exec::{CommandRunner, SystemRunner};
pub use pacman::PacmanAdapter;
pub use soar::SoarAdapter;

use crate::adapter::Adapter;
use crate::config::AerisConfig;
use std::sync::Arc;
use tracing::{debug, info};

/// Ids of every built-in adapter, whether or not it is available here
pub const BUILTIN_IDS: [&str; 4] = [pacman::PACMAN_ID, apt::APT_ID, dnf::DNF_ID, soar::SOAR_ID];

/// Create the built-in adapters whose backend binaries are installed
pub fn detect_builtin_adapters(
    config: &AerisConfig,
    runner: Arc<dyn CommandRunner>,
) -> Vec<Arc<dyn Adapter>> {
    let mut adapters: Vec<Arc<dyn Adapter>> = Vec::new();

    let settings = config.adapter_settings(pacman::PACMAN_ID);
    if PacmanAdapter::is_available(&settings) {
        adapters.push(Arc::new(PacmanAdapter::new(runner.clone(), &settings)));
    } else {
        debug!("pacman not found, skipping");
    }

    let settings = config.adapter_settings(apt::APT_ID);
    if AptAdapter::is_available(&settings) {
        adapters.push(Arc::new(AptAdapter::new(runner.clone(), &settings)));
    } else {
        debug!("apt-get not found, skipping");
    }

    let settings = config.adapter_settings(dnf::DNF_ID);
    if DnfAdapter::is_available(&settings) {
        adapters.push(Arc::new(DnfAdapter::new(runner.clone(), &settings)));
    } else {
        debug!("dnf not found, skipping");
    }

    let settings = config.adapter_settings(soar::SOAR_ID);
    if SoarAdapter::is_available(&settings) {
        adapters.push(Arc::new(SoarAdapter::new(runner, &settings)));
    } else {
        debug!("soar not found, skipping");
    }

    info!("Detected {} built-in adapter(s)", adapters.len());
    adapters
}

/// True if `id` names a built-in adapter
pub fn is_builtin(id: &str) -> bool {
    BUILTIN_IDS.contains(&id)
}
