// src/error.rs

//! Error types shared by adapters, the adapter manager and plugins

use crate::privilege::PrivilegeError;
use crate::registry::RegistryError;
use thiserror::Error;

/// Errors produced by Aeris library operations
#[derive(Error, Debug)]
pub enum Error {
    /// No adapter registered under this id
    #[error("Adapter not found: {0}")]
    AdapterNotFound(String),

    #[error("Adapter is disabled: {0}")]
    AdapterDisabled(String),

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Network error: {0}")]
    Network(String),

    /// Backend output or plugin message could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// The adapter does not implement this operation
    #[error("Operation not supported")]
    NotSupported,

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A backend command exited unsuccessfully
    #[error("{program} failed ({status}): {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error(transparent)]
    Privilege(#[from] PrivilegeError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

/// Result alias for Aeris library operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a `CommandFailed` from a finished process
    pub fn command_failed(program: &str, output: &std::process::Output) -> Self {
        let status = match output.status.code() {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        Error::CommandFailed {
            program: program.to_string(),
            status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    /// True for errors that mean "this adapter cannot do that" rather than a failure
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Error::NotSupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("no such file"));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(Error::NotSupported.to_string(), "Operation not supported");
        assert_eq!(
            Error::AdapterNotFound("pacman".to_string()).to_string(),
            "Adapter not found: pacman"
        );
        let err = Error::CommandFailed {
            program: "pacman".to_string(),
            status: "exit code 1".to_string(),
            stderr: "target not found: foo".to_string(),
        };
        assert_eq!(err.to_string(), "pacman failed (exit code 1): target not found: foo");
    }

    #[test]
    fn test_privilege_error_is_transparent() {
        let err: Error = PrivilegeError::Cancelled.into();
        assert_eq!(err.to_string(), PrivilegeError::Cancelled.to_string());
    }

    #[test]
    fn test_is_not_supported() {
        assert!(Error::NotSupported.is_not_supported());
        assert!(!Error::Other("x".to_string()).is_not_supported());
    }
}
