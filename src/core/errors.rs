/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Affinity and process-facility errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum AffinityError {
    #[error("Invalid core selection: {0}")]
    #[diagnostic(
        code(affinity::invalid_core),
        help("Core lists must be non-empty and every core index must be between 0 and 63.")
    )]
    InvalidCore(String),

    #[error("Process not found: {0}")]
    #[diagnostic(
        code(affinity::process_not_found),
        help("The process may have exited between observation and action.")
    )]
    ProcessNotFound(String),

    #[error("Permission denied for {0}")]
    #[diagnostic(
        code(affinity::permission_denied),
        help("Protected or foreign-owned processes need elevated privileges.")
    )]
    PermissionDenied(String),

    #[error("OS error: {0}")]
    #[diagnostic(
        code(affinity::os_error),
        help("The operating system rejected the affinity operation.")
    )]
    Os(String),
}

impl AffinityError {
    /// Process exit races are expected and never fatal
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, AffinityError::ProcessNotFound(_))
    }
}

/// Persistence errors for the config and rule stores
#[derive(Error, Debug, Diagnostic)]
pub enum StoreError {
    #[error("Failed to access {path}: {source}")]
    #[diagnostic(
        code(store::io_error),
        help("Check file permissions and free disk space.")
    )]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {reason}")]
    #[diagnostic(
        code(store::parse_error),
        help("The file is malformed. Fix or remove it to start from an empty store.")
    )]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to serialize {path}: {reason}")]
    #[diagnostic(code(store::serialize_error))]
    Serialize { path: PathBuf, reason: String },

    #[error("Invalid stored data: {0}")]
    #[diagnostic(
        code(store::invalid),
        help("A stored CCD group has an empty name or an invalid core list.")
    )]
    Invalid(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Rule engine and CCD registry errors
#[derive(Error, Debug, Diagnostic)]
pub enum RuleError {
    #[error("Rule for {process} references missing CCD group {ccd}")]
    #[diagnostic(
        code(rules::dangling_reference),
        help("The CCD group was deleted after the rule was created. Re-point or remove the rule.")
    )]
    DanglingRuleReference { process: String, ccd: String },

    #[error("Invalid rule: {0}")]
    #[diagnostic(code(rules::invalid_rule))]
    InvalidRule(String),

    #[error("Invalid CCD group: {0}")]
    #[diagnostic(code(rules::invalid_group))]
    InvalidCoreGroup(String),

    #[error("Unknown CCD group: {0}")]
    #[diagnostic(
        code(rules::unknown_group),
        help("Create the CCD group before selecting it.")
    )]
    UnknownCoreGroup(String),

    #[error("Store error: {0}")]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error("Affinity error: {0}")]
    #[diagnostic(transparent)]
    Affinity(#[from] AffinityError),
}

/// Daemon configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {var}: {reason}")]
    #[diagnostic(code(config::invalid_value))]
    InvalidValue {
        var: String,
        value: String,
        reason: String,
    },

    #[error("No platform configuration directory available")]
    #[diagnostic(
        code(config::no_config_dir),
        help("Set CCD_CONFIG_DIR to choose where configuration is stored.")
    )]
    NoConfigDir,
}

/// Unified daemon error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum DaemonError {
    #[error("Affinity error: {0}")]
    #[diagnostic(transparent)]
    Affinity(#[from] AffinityError),

    #[error("Store error: {0}")]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error("Rule error: {0}")]
    #[diagnostic(transparent)]
    Rule(#[from] RuleError),

    #[error("Configuration error: {0}")]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    #[diagnostic(
        code(daemon::io_error),
        help("Filesystem or I/O operation failed. Check file permissions and disk space.")
    )]
    Io(String),
}

impl From<std::io::Error> for DaemonError {
    fn from(err: std::io::Error) -> Self {
        DaemonError::Io(err.to_string())
    }
}

pub type AffinityResult<T> = Result<T, AffinityError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type RuleResult<T> = Result<T, RuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affinity_error_serialization() {
        let error = AffinityError::ProcessNotFound("pid 42".into());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("process_not_found"));
        let deserialized: AffinityError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, deserialized);
    }

    #[test]
    fn test_affinity_error_display() {
        let error = AffinityError::PermissionDenied("init(1)".into());
        assert_eq!(error.to_string(), "Permission denied for init(1)");
        assert!(!error.is_not_found());
        assert!(AffinityError::ProcessNotFound("x".into()).is_not_found());
    }

    #[test]
    fn test_rule_error_from_store_error() {
        let store = StoreError::Invalid("empty name".into());
        let rule: RuleError = store.into();
        assert!(matches!(rule, RuleError::Store(StoreError::Invalid(_))));
    }

    #[test]
    fn test_daemon_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let error: DaemonError = io.into();
        assert_eq!(error.to_string(), "I/O error: disk gone");
    }

    #[test]
    fn test_dangling_reference_display() {
        let error = RuleError::DanglingRuleReference {
            process: "game".into(),
            ccd: "ccd1".into(),
        };
        assert_eq!(
            error.to_string(),
            "Rule for game references missing CCD group ccd1"
        );
    }
}
