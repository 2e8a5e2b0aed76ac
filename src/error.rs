//! Error types for HashBridge
//!
//! Every public entry point returns [`Result`]. Failures are classified into
//! a small taxonomy (see [`ErrorKind`]) so callers can tell bad input apart
//! from misuse of a hasher or a failure inside a primitive module.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for HashBridge operations
#[derive(Error, Debug)]
pub enum HashError {
    /// The sandbox cannot execute primitive modules
    #[error("Sandbox unavailable: {0}")]
    Capability(String),

    /// A caller-supplied parameter was rejected
    #[error("Invalid {parameter}: {message}")]
    Validation {
        parameter: &'static str,
        message: String,
    },

    /// Serialized state or an encoded string could not be parsed
    #[error("Malformed {what}: {message}")]
    Format { what: &'static str, message: String },

    /// An operation was called out of sequence
    #[error("Cannot {operation} while the hasher is {state}")]
    Usage {
        operation: &'static str,
        state: &'static str,
    },

    /// A primitive module signaled failure
    #[error("Primitive '{module}' failed: {message}")]
    Computation { module: String, message: String },

    /// A primitive module image was rejected at compile time
    #[error("Failed to compile primitive module '{module}': {message}")]
    Compile { module: String, message: String },

    /// No asset with this name is registered
    #[error("Unknown primitive module: {0}")]
    UnknownModule(String),

    /// An asset with this name is already registered
    #[error("Primitive module already registered: {0}")]
    DuplicateModule(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error while reading configuration
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification of [`HashError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Sandbox unavailable or instance limits exceeded
    Capability,
    /// Bad salt, key, cost, variant or output parameters
    Validation,
    /// Malformed serialized state or encoded KDF string
    Format,
    /// update/digest/save out of sequence
    Usage,
    /// Failure inside a primitive module, including compilation
    Computation,
    /// Registry, configuration and I/O errors
    Environment,
}

impl HashError {
    /// Create a validation error
    pub fn validation(parameter: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            parameter,
            message: message.into(),
        }
    }

    /// Create a format error
    pub fn format(what: &'static str, message: impl Into<String>) -> Self {
        Self::Format {
            what,
            message: message.into(),
        }
    }

    /// Create a usage error
    pub fn usage(operation: &'static str, state: &'static str) -> Self {
        Self::Usage { operation, state }
    }

    /// Create a computation error
    pub fn computation(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Computation {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Create a compile error
    pub fn compile(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compile {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Capability(_) => ErrorKind::Capability,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Format { .. } => ErrorKind::Format,
            Self::Usage { .. } => ErrorKind::Usage,
            Self::Computation { .. } | Self::Compile { .. } => ErrorKind::Computation,
            Self::UnknownModule(_)
            | Self::DuplicateModule(_)
            | Self::ConfigError(_)
            | Self::Io { .. } => ErrorKind::Environment,
        }
    }

    /// Check if this error was caused by caller input rather than the runtime
    pub fn is_input_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation | ErrorKind::Format)
    }
}

/// Result type alias for HashBridge operations
pub type Result<T> = std::result::Result<T, HashError>;

impl From<serde_json::Error> for HashError {
    fn from(err: serde_json::Error) -> Self {
        HashError::ConfigError(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| HashError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let result: Result<()> = Err(io_err).with_path("/etc/hashbridge.json");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("/etc/hashbridge.json"));
        assert_eq!(err.kind(), ErrorKind::Environment);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            HashError::validation("salt", "too short").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            HashError::usage("update", "finalized").kind(),
            ErrorKind::Usage
        );
        assert_eq!(
            HashError::compile("sha256", "bad magic").kind(),
            ErrorKind::Computation
        );
        assert!(HashError::format("snapshot", "truncated").is_input_error());
        assert!(!HashError::Capability("disabled".into()).is_input_error());
    }

    #[test]
    fn test_error_messages() {
        let err = HashError::usage("update", "finalized");
        assert_eq!(err.to_string(), "Cannot update while the hasher is finalized");

        let err = HashError::validation("salt", "must be at least 8 bytes");
        assert_eq!(err.to_string(), "Invalid salt: must be at least 8 bytes");
    }
}
