//! # Console Error Handling
//!
//! Error types for the streaming and preview pipeline.
//!
//! ## Architecture
//!
//! Two layers of error exist, matching the two ways faults travel:
//!
//! - **`ConsoleError`**: returned through `Result` by operations that may
//!   fail synchronously for the caller (session setup, configuration, lookups
//!   on a device that is not streaming). Carries an [`ErrorContext`].
//! - **`FetchError`** (in [`crate::capture`]): a cloneable *value* that flows
//!   through the frame channel in place of a frame. The fetch loop never
//!   returns an `Err`; it publishes `FetchError` values instead.
//!
//! ## Error Classification
//!
//! - `Retryable`: transport faults the next fetch may not see again
//! - `HasSeverity`: how loudly a fault should be surfaced
//! - [`classify`]: terminal vs transient decisions used by the preview
//!
//! ## Usage
//!
//! ```rust
//! use edge_console::error::{ConsoleError, Retryable};
//!
//! let error = ConsoleError::not_streaming(7)
//!     .with_operation("get_device_stream_as_frames");
//! assert_eq!(error.category(), "not_streaming");
//! assert!(!error.is_retryable());
//! ```

use std::{error::Error as StdError, fmt, time::SystemTime};

use crate::capture::FetchError;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, nothing is affected
    Info,
    /// A frame was lost; the session continues
    Warning,
    /// The operation failed
    Error,
    /// The session cannot continue
    Fatal,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    pub context: Option<String>,
    pub severity: ErrorSeverity,
    pub metadata: std::collections::HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            severity: ErrorSeverity::Error,
            metadata: std::collections::HashMap::new(),
        }
    }
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Base error type for the console library
#[derive(Debug)]
pub enum ConsoleError {
    /// Configuration validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// Lookup on a device without a bound session
    NotStreaming { device_id: u32, context: ErrorContext },
    /// Session setup failed (provider init, subscription)
    Setup {
        device_id: u32,
        reason: String,
        context: ErrorContext,
    },
    /// Device command rejected or answered with a failure code
    Command {
        command: String,
        code: Option<i64>,
        reason: String,
        context: ErrorContext,
    },
    /// Transport errors reaching the console backend or device
    Network {
        operation: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
        context: ErrorContext,
    },
    /// Image or payload decoding failures
    Decode {
        what: String,
        reason: String,
        context: ErrorContext,
    },
    /// Inference payload matched none of the known schemas
    UnknownFormat { detail: String, context: ErrorContext },
    /// Input validation errors
    Validation {
        field: String,
        constraint: String,
        value: String,
        context: ErrorContext,
    },
    /// Invalid state transitions
    State {
        current_state: String,
        attempted_operation: String,
        context: ErrorContext,
    },
    /// External library errors
    External {
        library: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
    /// I/O errors
    Io {
        operation: String,
        source: std::io::Error,
        context: ErrorContext,
    },
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

impl ConsoleError {
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn not_streaming(device_id: u32) -> Self {
        Self::NotStreaming {
            device_id,
            context: ErrorContext::new(),
        }
    }

    pub fn setup(device_id: u32, reason: impl Into<String>) -> Self {
        Self::Setup {
            device_id,
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn command(command: impl Into<String>, code: Option<i64>, reason: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            code,
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn network(
        operation: impl Into<String>,
        source: Option<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Network {
            operation: operation.into(),
            source,
            context: ErrorContext::new(),
        }
    }

    pub fn decode(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            what: what.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn unknown_format(detail: impl Into<String>) -> Self {
        Self::UnknownFormat {
            detail: detail.into(),
            context: ErrorContext::new().with_severity_value(ErrorSeverity::Fatal),
        }
    }

    pub fn validation(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            constraint: constraint.into(),
            value: value.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn state(current_state: impl Into<String>, attempted_operation: impl Into<String>) -> Self {
        Self::State {
            current_state: current_state.into(),
            attempted_operation: attempted_operation.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn external(
        library: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            library: library.into(),
            source: Box::new(source),
            context: ErrorContext::new(),
        }
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
            context: ErrorContext::new(),
        }
    }

    /// Add free-form context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Record the operation that failed
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Config { context, .. }
            | Self::NotStreaming { context, .. }
            | Self::Setup { context, .. }
            | Self::Command { context, .. }
            | Self::Network { context, .. }
            | Self::Decode { context, .. }
            | Self::UnknownFormat { context, .. }
            | Self::Validation { context, .. }
            | Self::State { context, .. }
            | Self::External { context, .. }
            | Self::Io { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Config { context, .. }
            | Self::NotStreaming { context, .. }
            | Self::Setup { context, .. }
            | Self::Command { context, .. }
            | Self::Network { context, .. }
            | Self::Decode { context, .. }
            | Self::UnknownFormat { context, .. }
            | Self::Validation { context, .. }
            | Self::State { context, .. }
            | Self::External { context, .. }
            | Self::Io { context, .. } => context,
        }
    }

    /// Short machine-friendly category name
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::NotStreaming { .. } => "not_streaming",
            Self::Setup { .. } => "setup",
            Self::Command { .. } => "command",
            Self::Network { .. } => "network",
            Self::Decode { .. } => "decode",
            Self::UnknownFormat { .. } => "unknown_format",
            Self::Validation { .. } => "validation",
            Self::State { .. } => "state",
            Self::External { .. } => "external",
            Self::Io { .. } => "io",
        }
    }
}

impl ErrorContext {
    fn with_severity_value(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { field, value, reason, .. } => {
                write!(f, "Invalid configuration '{}' = '{}': {}", field, value, reason)?
            }
            Self::NotStreaming { device_id, .. } => {
                write!(f, "Device {} is not streaming", device_id)?
            }
            Self::Setup { device_id, reason, .. } => {
                write!(f, "Failed to stream from device {}: {}", device_id, reason)?
            }
            Self::Command { command, code, reason, .. } => match code {
                Some(code) => write!(f, "Command '{}' failed with code {}: {}", command, code, reason)?,
                None => write!(f, "Command '{}' failed: {}", command, reason)?,
            },
            Self::Network { operation, source, .. } => match source {
                Some(source) => write!(f, "Network error during {}: {}", operation, source)?,
                None => write!(f, "Network error during {}", operation)?,
            },
            Self::Decode { what, reason, .. } => write!(f, "Failed to decode {}: {}", what, reason)?,
            Self::UnknownFormat { detail, .. } => {
                write!(f, "Unknown inference format: {}", detail)?
            }
            Self::Validation { field, constraint, value, .. } => write!(
                f,
                "Validation failed for '{}': {} (got '{}')",
                field, constraint, value
            )?,
            Self::State { current_state, attempted_operation, .. } => write!(
                f,
                "Cannot {} while {}",
                attempted_operation, current_state
            )?,
            Self::External { library, source, .. } => write!(f, "{} error: {}", library, source)?,
            Self::Io { operation, source, .. } => write!(f, "I/O error during {}: {}", operation, source)?,
        }
        if let Some(context) = &self.context().context {
            write!(f, " ({})", context)?;
        }
        Ok(())
    }
}

impl StdError for ConsoleError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Network { source: Some(source), .. } => Some(source.as_ref()),
            Self::External { source, .. } => Some(source.as_ref()),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors that may clear up on the next attempt
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for ConsoleError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Command { .. } | Self::Decode { .. })
    }
}

pub trait HasSeverity {
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for ConsoleError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Error classification used by the preview policy
pub mod classify {
    use super::*;

    /// Faults that end a streaming session immediately
    pub fn is_terminal(error: &ConsoleError) -> bool {
        matches!(
            error,
            ConsoleError::UnknownFormat { .. } | ConsoleError::Config { .. } | ConsoleError::Setup { .. }
        ) || error.severity() == ErrorSeverity::Fatal
    }

    /// Faults the inactivity policy is allowed to ride out
    pub fn is_transient(error: &ConsoleError) -> bool {
        !is_terminal(error) && error.is_retryable()
    }
}

impl From<FetchError> for ConsoleError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::UnknownInferenceFormat { detail } => Self::unknown_format(detail),
            FetchError::Command { code, message } => Self::command("fetch", code, message),
            FetchError::MissingImage => Self::command("fetch", None, "response carried no image"),
            FetchError::NoNewData => Self::command("fetch", None, "no new data"),
            FetchError::Transport { message } => Self::network("fetch", Some(message.into())),
            FetchError::Decode { message } => Self::decode("frame", message),
        }
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(error: std::io::Error) -> Self {
        Self::io("unknown", error)
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(error: serde_json::Error) -> Self {
        Self::external("serde_json", error)
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(error: reqwest::Error) -> Self {
        let operation = error
            .url()
            .map(|url| url.path().to_string())
            .unwrap_or_else(|| "request".to_string());
        Self::network(operation, Some(Box::new(error)))
    }
}

impl From<image::ImageError> for ConsoleError {
    fn from(error: image::ImageError) -> Self {
        Self::decode("image", error.to_string())
    }
}

impl From<base64::DecodeError> for ConsoleError {
    fn from(error: base64::DecodeError) -> Self {
        Self::decode("base64", error.to_string())
    }
}
