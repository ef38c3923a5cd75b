// src/privilege.rs

//! Privilege elevation for system-wide package operations
//!
//! User-mode operations run backend commands directly. System-mode
//! operations are wrapped in the first elevator found on `PATH`
//! (pkexec, then sudo, then doas). After a successful elevated run the
//! elevator is cached for a configurable period so sudo can be invoked
//! non-interactively (`sudo -n`) while its own credential cache is warm.
//!
//! Backend output is parsed, so every backend command runs with
//! `LC_ALL=C`. Elevators may reset the environment, so elevated commands
//! set it again through `env` inside the elevator.

use std::process::Output;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Default time an elevation stays cached
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(300);

/// Locale forced on backend commands
const BACKEND_LOCALE: (&str, &str) = ("LC_ALL", "C");

/// Scope of a package operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PackageMode {
    /// Per-user packages, no elevation
    #[default]
    User,
    /// System-wide packages, requires root
    System,
}

/// Tool used to run a command as root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ElevatorType {
    Pkexec,
    Sudo,
    Doas,
}

/// Errors raised while elevating a command
#[derive(Error, Debug)]
pub enum PrivilegeError {
    #[error("No privilege elevation tool found (sudo, doas, or pkexec required)")]
    NoElevatorFound,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Operation cancelled by user")]
    Cancelled,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy)]
struct ElevationState {
    elevator: ElevatorType,
    elevated_at: Instant,
}

/// Runs commands with or without elevation and remembers recent elevations
///
/// Clones share the same cache.
#[derive(Debug, Clone)]
pub struct PrivilegeManager {
    cache_duration: Duration,
    state: Arc<Mutex<Option<ElevationState>>>,
}

impl Default for PrivilegeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PrivilegeManager {
    pub fn new() -> Self {
        Self::with_cache_duration(DEFAULT_CACHE_DURATION)
    }

    pub fn with_cache_duration(duration: Duration) -> Self {
        Self {
            cache_duration: duration,
            state: Arc::new(Mutex::new(None)),
        }
    }

    /// Find an elevator on PATH, preferring pkexec, then sudo, then doas
    pub fn detect_elevator() -> Option<ElevatorType> {
        [ElevatorType::Pkexec, ElevatorType::Sudo, ElevatorType::Doas]
            .into_iter()
            .find(|e| which::which(e.to_string()).is_ok())
    }

    /// True when the process already runs as root
    pub fn is_root() -> bool {
        // SAFETY: geteuid has no preconditions and cannot fail.
        unsafe { libc::geteuid() == 0 }
    }

    pub fn needs_elevation(mode: PackageMode) -> bool {
        matches!(mode, PackageMode::System)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Option<ElevationState>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_elevation_cached(&self) -> bool {
        self.cached_elevator().is_some()
    }

    pub fn cached_elevator(&self) -> Option<ElevatorType> {
        let state = self.lock_state();
        state
            .filter(|s| s.elevated_at.elapsed() < self.cache_duration)
            .map(|s| s.elevator)
    }

    pub fn cache_elevation(&self, elevator: ElevatorType) {
        *self.lock_state() = Some(ElevationState {
            elevator,
            elevated_at: Instant::now(),
        });
    }

    pub fn clear_cache(&self) {
        *self.lock_state() = None;
    }

    /// Remaining lifetime of the cached elevation
    pub fn time_until_expiry(&self) -> Option<Duration> {
        let state = self.lock_state();
        let s = (*state)?;
        self.cache_duration
            .checked_sub(s.elevated_at.elapsed())
            .filter(|d| !d.is_zero())
    }

    /// Build the command for `program args` in the given mode
    pub fn elevated_command(
        &self,
        mode: PackageMode,
        program: &str,
        args: &[String],
    ) -> Result<(Command, Option<ElevatorType>), PrivilegeError> {
        if !Self::needs_elevation(mode) || Self::is_root() {
            let mut cmd = Command::new(program);
            cmd.args(args).env(BACKEND_LOCALE.0, BACKEND_LOCALE.1);
            return Ok((cmd, None));
        }

        let cached = self.cached_elevator();
        let elevator = cached
            .or_else(Self::detect_elevator)
            .ok_or(PrivilegeError::NoElevatorFound)?;

        let argv = elevated_argv(elevator, cached.is_some(), program, args);
        let mut cmd = Command::new(elevator.to_string());
        cmd.args(&argv).env(BACKEND_LOCALE.0, BACKEND_LOCALE.1);
        if elevator == ElevatorType::Pkexec {
            for var in ["DISPLAY", "XAUTHORITY", "WAYLAND_DISPLAY"] {
                if let Ok(value) = std::env::var(var) {
                    cmd.env(var, value);
                }
            }
        }
        Ok((cmd, Some(elevator)))
    }

    /// Run `program args`, elevating in system mode
    ///
    /// A non-zero exit is returned as `Ok(output)` unless stderr shows an
    /// authentication failure or a cancelled prompt.
    pub async fn run(
        &self,
        mode: PackageMode,
        program: &str,
        args: &[String],
    ) -> Result<Output, PrivilegeError> {
        let (mut cmd, elevator) = self.elevated_command(mode, program, args)?;
        debug!(
            "Running {} {} (mode: {}, elevator: {:?})",
            program,
            args.join(" "),
            mode,
            elevator
        );

        let output = cmd
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|source| PrivilegeError::Spawn {
                program: elevator.map(|e| e.to_string()).unwrap_or_else(|| program.to_string()),
                source,
            })?;

        if !output.status.success() {
            if elevator.is_some()
                && let Some(err) = classify_failure(&String::from_utf8_lossy(&output.stderr))
            {
                self.clear_cache();
                return Err(err);
            }
            return Ok(output);
        }

        if let Some(elevator) = elevator {
            self.cache_elevation(elevator);
        }
        Ok(output)
    }
}

/// Arguments passed to the elevator binary
fn elevated_argv(
    elevator: ElevatorType,
    cached: bool,
    program: &str,
    args: &[String],
) -> Vec<String> {
    let mut argv = Vec::with_capacity(args.len() + 4);
    if elevator == ElevatorType::Sudo && cached {
        argv.push("-n".to_string());
    }
    argv.push("env".to_string());
    argv.push(format!("{}={}", BACKEND_LOCALE.0, BACKEND_LOCALE.1));
    argv.push(program.to_string());
    argv.extend(args.iter().cloned());
    argv
}

/// Map elevator stderr to a privilege error
fn classify_failure(stderr: &str) -> Option<PrivilegeError> {
    let lower = stderr.to_lowercase();
    if lower.contains("incorrect password") || stderr.contains("Sorry, try again") {
        return Some(PrivilegeError::AuthenticationFailed(
            "Incorrect password".to_string(),
        ));
    }
    if lower.contains("a password is required") {
        return Some(PrivilegeError::AuthenticationFailed(
            "Password required".to_string(),
        ));
    }
    if lower.contains("cancelled") || lower.contains("dismissed") {
        return Some(PrivilegeError::Cancelled);
    }
    if lower.contains("not authorized") || lower.contains("not in the sudoers") {
        return Some(PrivilegeError::PermissionDenied);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_package_mode_parse_and_display() {
        assert_eq!(PackageMode::from_str("system").unwrap(), PackageMode::System);
        assert_eq!(PackageMode::from_str("USER").unwrap(), PackageMode::User);
        assert!(PackageMode::from_str("global").is_err());
        assert_eq!(PackageMode::System.to_string(), "system");
        assert_eq!(PackageMode::default(), PackageMode::User);
    }

    #[test]
    fn test_needs_elevation() {
        assert!(PrivilegeManager::needs_elevation(PackageMode::System));
        assert!(!PrivilegeManager::needs_elevation(PackageMode::User));
    }

    #[test]
    fn test_elevated_argv_sudo_noninteractive_when_cached() {
        let args = vec!["-S".to_string(), "ripgrep".to_string()];
        assert_eq!(
            elevated_argv(ElevatorType::Sudo, true, "pacman", &args),
            vec!["-n", "env", "LC_ALL=C", "pacman", "-S", "ripgrep"]
        );
        assert_eq!(
            elevated_argv(ElevatorType::Sudo, false, "pacman", &args),
            vec!["env", "LC_ALL=C", "pacman", "-S", "ripgrep"]
        );
        assert_eq!(
            elevated_argv(ElevatorType::Doas, true, "pacman", &args),
            vec!["env", "LC_ALL=C", "pacman", "-S", "ripgrep"]
        );
        assert_eq!(
            elevated_argv(ElevatorType::Pkexec, false, "apt-get", &args),
            vec!["env", "LC_ALL=C", "apt-get", "-S", "ripgrep"]
        );
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure("sudo: 3 incorrect password attempts"),
            Some(PrivilegeError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            classify_failure("Error executing command as another user: Request dismissed"),
            Some(PrivilegeError::Cancelled)
        ));
        assert!(matches!(
            classify_failure("alice is not in the sudoers file."),
            Some(PrivilegeError::PermissionDenied)
        ));
        assert!(classify_failure("error: target not found: foo").is_none());
    }

    #[test]
    fn test_cache_roundtrip() {
        let manager = PrivilegeManager::with_cache_duration(Duration::from_secs(60));
        assert!(!manager.is_elevation_cached());
        assert!(manager.time_until_expiry().is_none());

        manager.cache_elevation(ElevatorType::Sudo);
        assert_eq!(manager.cached_elevator(), Some(ElevatorType::Sudo));
        assert!(manager.time_until_expiry().is_some());

        // Clones share the cache
        let clone = manager.clone();
        clone.clear_cache();
        assert!(!manager.is_elevation_cached());
    }

    #[test]
    fn test_cache_expires() {
        let manager = PrivilegeManager::with_cache_duration(Duration::ZERO);
        manager.cache_elevation(ElevatorType::Doas);
        assert!(manager.cached_elevator().is_none());
        assert!(manager.time_until_expiry().is_none());
    }

    #[test]
    fn test_user_mode_command_is_not_wrapped() {
        let manager = PrivilegeManager::new();
        let (_cmd, elevator) = manager
            .elevated_command(PackageMode::User, "echo", &["hi".to_string()])
            .unwrap();
        assert!(elevator.is_none());
    }

    #[test]
    fn test_direct_command_forces_c_locale() {
        let manager = PrivilegeManager::new();
        let (cmd, _) = manager
            .elevated_command(PackageMode::User, "pacman", &["-Q".to_string()])
            .unwrap();
        let std_cmd = cmd.as_std();
        assert_eq!(std_cmd.get_program(), "pacman");
        assert!(
            std_cmd
                .get_envs()
                .any(|(k, v)| k == "LC_ALL" && v == Some(std::ffi::OsStr::new("C")))
        );
    }

    #[tokio::test]
    async fn test_run_sees_c_locale() {
        let manager = PrivilegeManager::new();
        let output = manager
            .run(PackageMode::User, "sh", &["-c".to_string(), "echo $LC_ALL".to_string()])
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "C");
    }

    #[tokio::test]
    async fn test_run_user_mode_returns_output() {
        let manager = PrivilegeManager::new();
        let output = manager
            .run(PackageMode::User, "sh", &["-c".to_string(), "echo hello".to_string()])
            .await
            .unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_missing_program_is_spawn_error() {
        let manager = PrivilegeManager::new();
        let err = manager
            .run(PackageMode::User, "aeris-definitely-missing-binary", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, PrivilegeError::Spawn { .. }));
    }
}
