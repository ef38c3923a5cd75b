// tests/backends.rs

//! Integration tests for built-in backends driven by stored settings.

#![cfg(unix)]

use aeris::adapters::{AptAdapter, CommandRunner, DnfAdapter, PacmanAdapter};
use aeris::{Adapter, AdapterManager, AerisConfig, Error, Package, PackageMode, Result};
use async_trait::async_trait;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};

/// Runner that records command lines and fails when told to
#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<(String, PackageMode)>>,
    fail_with: Option<String>,
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &str, args: &[String], mode: PackageMode) -> Result<Output> {
        let line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push((line, mode));
        let (code, stderr) = match &self.fail_with {
            Some(message) => (1, message.clone()),
            None => (0, String::new()),
        };
        Ok(Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: Vec::new(),
            stderr: stderr.into_bytes(),
        })
    }
}

fn config_from(toml: &str) -> AerisConfig {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, toml).unwrap();
    AerisConfig::load_from(&path).unwrap()
}

#[tokio::test]
async fn test_stored_settings_shape_the_command_line() {
    let config = config_from(
        r#"
[adapters.pacman]
executable_path = "/opt/arch/bin/pacman"
needed = "false"
"#,
    );
    let runner = Arc::new(RecordingRunner::default());
    let adapter = PacmanAdapter::new(runner.clone(), &config.adapter_settings("pacman"));

    let packages = vec![Package::new("pacman", "ripgrep", "14.1.0-1")];
    let results = adapter
        .install(&packages, None, PackageMode::System)
        .await
        .unwrap();
    assert!(results[0].success);

    let calls = runner.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![(
            "/opt/arch/bin/pacman -S --noconfirm ripgrep".to_string(),
            PackageMode::System
        )]
    );
}

#[tokio::test]
async fn test_user_mode_mutation_is_refused() {
    let runner = Arc::new(RecordingRunner::default());
    let adapter = PacmanAdapter::new(runner.clone(), &Default::default());

    let err = adapter
        .remove(&[Package::new("pacman", "vim", "9.1")], None, PackageMode::User)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
    assert!(runner.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_backend_failure_marks_every_package() {
    let runner = Arc::new(RecordingRunner {
        fail_with: Some("error: target not found: nope".to_string()),
        ..Default::default()
    });
    let mut manager = AdapterManager::new();
    manager.register(Arc::new(PacmanAdapter::new(runner, &Default::default())));

    let packages = vec![
        Package::new("pacman", "nope", ""),
        Package::new("pacman", "vim", ""),
    ];
    let results = manager
        .install(&packages, None, PackageMode::System)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| !r.success));
    assert!(
        results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("target not found")
    );
}

#[test]
fn test_disabled_adapters_from_config() {
    let config = config_from("disabled_adapters = [\"pacman\"]\n");
    let mut manager = AdapterManager::new();
    manager.register(Arc::new(PacmanAdapter::new(
        Arc::new(RecordingRunner::default()),
        &Default::default(),
    )));
    manager.set_disabled(config.disabled_adapters.iter().cloned().collect());

    assert!(!manager.is_enabled("pacman"));
    assert!(matches!(
        manager.enabled_adapter("pacman"),
        Err(Error::AdapterDisabled(_))
    ));
}

#[test]
fn test_schema_validates_settings() {
    let adapter = PacmanAdapter::new(Arc::new(RecordingRunner::default()), &Default::default());
    let schema = adapter.config_schema().unwrap();
    assert!(schema.parse_value("needed", "off").is_ok());
    assert!(schema.parse_value("needed", "maybe").is_err());
    assert!(schema.parse_value("colour", "yes").is_err());
    assert!(schema.field("executable_path").unwrap().aeris_managed);
}

#[tokio::test]
async fn test_option_like_package_names_never_reach_a_backend() {
    let runner = Arc::new(RecordingRunner::default());
    let backends: Vec<Arc<dyn Adapter>> = vec![
        Arc::new(PacmanAdapter::new(runner.clone(), &Default::default())),
        Arc::new(AptAdapter::new(runner.clone(), &Default::default())),
        Arc::new(DnfAdapter::new(runner.clone(), &Default::default())),
    ];

    for backend in backends {
        let id = backend.info().id.clone();
        let packages = vec![
            Package::new(&id, "vim", "9.1"),
            Package::new(&id, "--overwrite=*", "1"),
        ];
        assert!(matches!(
            backend.install(&packages, None, PackageMode::System).await,
            Err(Error::PackageNotFound(_))
        ));
        assert!(matches!(
            backend.remove(&packages, None, PackageMode::System).await,
            Err(Error::PackageNotFound(_))
        ));
        assert!(matches!(
            backend.update(&packages, None, PackageMode::System).await,
            Err(Error::PackageNotFound(_))
        ));
    }
    assert!(runner.calls.lock().unwrap().is_empty());
}
