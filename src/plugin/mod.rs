// src/plugin/mod.rs

//! External adapter plugins
//!
//! Plugins are standalone executables described by a `manifest.toml`. The
//! host talks to them over a JSON-lines protocol on stdin/stdout and
//! performs privileged work (commands, files, HTTP) on their behalf within
//! the permissions the manifest declares. The plugin process itself runs
//! confined to those permissions, see [`sandbox`].

pub mod adapter;
pub mod host;
pub mod manifest;
pub mod protocol;
pub mod sandbox;

pub use adapter::PluginAdapter;
pub use host::HostState;
pub use manifest::{
    AdapterMeta, Permissions, PluginManifest, discover_plugins, load_manifest,
    plugin_search_paths, user_plugin_dir,
};

use crate::error::Result;
use futures::future::join_all;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Load every discovered plugin; one result per plugin directory
pub async fn load_all_plugins(timeout: Duration) -> Vec<(PathBuf, Result<PluginAdapter>)> {
    load_plugins_from(&plugin_search_paths(), timeout).await
}

/// Load the plugins found in `search_dirs`
pub async fn load_plugins_from(
    search_dirs: &[PathBuf],
    timeout: Duration,
) -> Vec<(PathBuf, Result<PluginAdapter>)> {
    let discovered = manifest::discover_plugins_in(search_dirs);
    join_all(discovered.into_iter().map(|(dir, manifest)| async move {
        let loaded = PluginAdapter::from_manifest(&dir, manifest, timeout).await;
        if let Err(e) = &loaded {
            warn!("Failed to load plugin at {}: {}", dir.display(), e);
        }
        (dir, loaded)
    }))
    .await
}
