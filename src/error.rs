//! Error types for Hostaudit.
//!
//! This module defines the error types used throughout Hostaudit. Faults
//! inside a single check never abort an audit; they are classified here and
//! downgraded to a check status (`skip`, `warn`) by the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Hostaudit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Hostaudit.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Probe Errors
    // ========================================================================
    /// A required external tool is not installed on this host.
    #[error("Tool '{0}' not found on PATH")]
    ToolMissing(String),

    /// The operating system denied access to a file or command.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A probe exceeded its deadline.
    #[error("Probe '{probe}' timed out after {timeout_secs} seconds")]
    Timeout {
        /// Probe description (command or file scan)
        probe: String,
        /// Timeout in seconds
        timeout_secs: u64,
    },

    /// A command exited with a non-zero status.
    #[error("Command '{command}' failed with exit code {code}: {stderr}")]
    CommandFailed {
        /// Command name
        command: String,
        /// Exit code
        code: i32,
        /// Captured stderr tail
        stderr: String,
    },

    // ========================================================================
    // Parse Errors
    // ========================================================================
    /// Semi-structured tool output could not be parsed.
    #[error("Failed to parse {source_name} output: {message}")]
    Parse {
        /// What was being parsed (`last`, `auth.log`, ...)
        source_name: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {message}")]
    ConfigLoad {
        /// Path to the configuration file
        path: PathBuf,
        /// Error message
        message: String,
    },

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// The audit was cancelled by the caller.
    #[error("Audit cancelled")]
    Cancelled,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new parse error.
    pub fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(probe: impl Into<String>, timeout_secs: u64) -> Self {
        Self::Timeout {
            probe: probe.into(),
            timeout_secs,
        }
    }

    /// Creates a new config load error.
    pub fn config_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true when the underlying cause is a missing tool or file,
    /// i.e. the probe is not possible on this host and the check should
    /// report `skip` rather than `warn`.
    pub fn is_probe_unavailable(&self) -> bool {
        matches!(self, Error::ToolMissing(_) | Error::FileNotFound(_))
            || matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
