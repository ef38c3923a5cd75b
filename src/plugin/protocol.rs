// src/plugin/protocol.rs

//! JSON-lines messages exchanged with plugin processes
//!
//! The host writes one [`Request`] to the plugin's stdin. The plugin answers
//! on stdout with any number of [`PluginMessage`] lines and finishes with a
//! `result` or `error`. A `host_call` is answered with a [`HostReply`] line
//! on stdin before the plugin continues.

use crate::progress::ProgressEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command-line flag every plugin is started with
pub const PLUGIN_FLAG: &str = "--aeris-plugin";

/// Error code a plugin uses for operations it does not implement
pub const NOT_SUPPORTED: &str = "not_supported";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PluginMessage {
    Log {
        level: LogLevel,
        message: String,
    },
    Progress {
        event: ProgressEvent,
    },
    HostCall {
        call_id: u64,
        call: HostCall,
    },
    Result {
        #[serde(default)]
        value: Value,
    },
    Error {
        message: String,
        #[serde(default)]
        code: Option<String>,
    },
}

/// Services the host performs on a plugin's behalf, subject to its permissions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostCall {
    Exec {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    FsRead {
        path: String,
    },
    FsWrite {
        path: String,
        content: String,
    },
    FsExists {
        path: String,
    },
    HttpGet {
        url: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostReply {
    pub call_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HostReply {
    pub fn from_result(call_id: u64, result: std::result::Result<Value, String>) -> Self {
        match result {
            Ok(value) => Self {
                call_id,
                ok: Some(value),
                error: None,
            },
            Err(error) => Self {
                call_id,
                ok: None,
                error: Some(error),
            },
        }
    }
}

/// `exec` host call reply payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// `http_get` host call reply payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}
