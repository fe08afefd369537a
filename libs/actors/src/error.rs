//! Actor Error Types
//!
//! Errors raised by behaviours, by the ask machinery and by configuration
//! checks. Delivery failures are never errors: they go to dead letters.

use thiserror::Error;

/// Main runtime error type
#[derive(Error, Debug)]
pub enum ActorError {
    /// Behaviour returned an error while handling a message or hook
    #[error("Actor failed: {message}")]
    Failed {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Behaviour panicked; the payload is rendered to text
    #[error("Actor panicked: {message}")]
    Panicked { message: String },

    /// Synthetic failure raised by the `fail` overflow policy
    #[error("Mailbox overflow ({path})")]
    MailboxOverflow { path: String },

    /// No reply arrived before the ask deadline
    #[error("Ask timeout: request {request_id} got no reply within {timeout_ms}ms")]
    AskTimeout { request_id: u64, timeout_ms: u64 },

    /// Reply payload was not of the type the caller asked for
    #[error("Unexpected reply: expected {expected}, got {actual}")]
    UnexpectedReply {
        expected: &'static str,
        actual: &'static str,
    },

    /// Ask registration or request could not be delivered
    #[error("Ask undeliverable: request {request_id}: {reason}")]
    AskUndeliverable { request_id: u64, reason: String },

    /// Blocking wait on a promise ran out of time
    #[error("Wait timeout: promise not completed within {timeout_ms}ms")]
    WaitTimeout { timeout_ms: u64 },

    /// Actor or child name rejected
    #[error("Invalid actor name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Props or system settings rejected
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Behaviour factory failed to build an instance
    #[error("Producer failed for {path}: {message}")]
    Producer { path: String, message: String },

    /// Operation attempted after system shutdown
    #[error("Actor system '{system}' is terminated")]
    SystemTerminated { system: String },

    /// Runtime construction errors (thread pools, timers)
    #[error("System error: {message}")]
    System { message: String },
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, ActorError>;

/// Result type returned by behaviour callbacks
pub type ActorResult = Result<()>;

impl ActorError {
    /// Create a behaviour failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a behaviour failure with source
    pub fn failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Failed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a panic failure from a caught panic payload
    pub fn panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { message }
    }

    /// Create a mailbox overflow failure
    pub fn mailbox_overflow(path: impl Into<String>) -> Self {
        Self::MailboxOverflow { path: path.into() }
    }

    /// Create an ask timeout error
    pub fn ask_timeout(request_id: u64, timeout_ms: u64) -> Self {
        Self::AskTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Create an unexpected reply error
    pub fn unexpected_reply(expected: &'static str, actual: &'static str) -> Self {
        Self::UnexpectedReply { expected, actual }
    }

    /// Create an undeliverable ask error
    pub fn ask_undeliverable(request_id: u64, reason: impl Into<String>) -> Self {
        Self::AskUndeliverable {
            request_id,
            reason: reason.into(),
        }
    }

    /// Create a promise wait timeout error
    pub fn wait_timeout(timeout_ms: u64) -> Self {
        Self::WaitTimeout { timeout_ms }
    }

    /// Create an invalid name error
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    /// Create a producer failure
    pub fn producer(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Producer {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a terminated-system error
    pub fn system_terminated(system: impl Into<String>) -> Self {
        Self::SystemTerminated {
            system: system.into(),
        }
    }

    /// Create a system error
    pub fn system(message: impl Into<String>) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    /// Check if the ask machinery produced this error
    pub fn is_ask_error(&self) -> bool {
        matches!(
            self,
            ActorError::AskTimeout { .. }
                | ActorError::UnexpectedReply { .. }
                | ActorError::AskUndeliverable { .. }
        )
    }

    /// Get error category for logs and metrics
    pub fn category(&self) -> &'static str {
        match self {
            ActorError::Failed { .. } => "failed",
            ActorError::Panicked { .. } => "panicked",
            ActorError::MailboxOverflow { .. } => "mailbox_overflow",
            ActorError::AskTimeout { .. } => "ask_timeout",
            ActorError::UnexpectedReply { .. } => "unexpected_reply",
            ActorError::AskUndeliverable { .. } => "ask_undeliverable",
            ActorError::WaitTimeout { .. } => "wait_timeout",
            ActorError::InvalidName { .. } => "invalid_name",
            ActorError::Configuration { .. } => "configuration",
            ActorError::Producer { .. } => "producer",
            ActorError::SystemTerminated { .. } => "system_terminated",
            ActorError::System { .. } => "system",
        }
    }
}

// Sources are not cloneable, so clones keep the message only
impl Clone for ActorError {
    fn clone(&self) -> Self {
        match self {
            ActorError::Failed { message, .. } => ActorError::Failed {
                message: message.clone(),
                source: None,
            },
            ActorError::Panicked { message } => ActorError::Panicked {
                message: message.clone(),
            },
            ActorError::MailboxOverflow { path } => ActorError::MailboxOverflow { path: path.clone() },
            ActorError::AskTimeout {
                request_id,
                timeout_ms,
            } => ActorError::AskTimeout {
                request_id: *request_id,
                timeout_ms: *timeout_ms,
            },
            ActorError::UnexpectedReply { expected, actual } => ActorError::UnexpectedReply {
                expected: *expected,
                actual: *actual,
            },
            ActorError::AskUndeliverable { request_id, reason } => ActorError::AskUndeliverable {
                request_id: *request_id,
                reason: reason.clone(),
            },
            ActorError::WaitTimeout { timeout_ms } => ActorError::WaitTimeout {
                timeout_ms: *timeout_ms,
            },
            ActorError::InvalidName { name, reason } => ActorError::InvalidName {
                name: name.clone(),
                reason: reason.clone(),
            },
            ActorError::Configuration { message, field } => ActorError::Configuration {
                message: message.clone(),
                field: field.clone(),
            },
            ActorError::Producer { path, message } => ActorError::Producer {
                path: path.clone(),
                message: message.clone(),
            },
            ActorError::SystemTerminated { system } => ActorError::SystemTerminated {
                system: system.clone(),
            },
            ActorError::System { message } => ActorError::System {
                message: message.clone(),
            },
        }
    }
}

/// Let behaviours use `?` on `anyhow` results
impl From<anyhow::Error> for ActorError {
    fn from(error: anyhow::Error) -> Self {
        ActorError::failed(format!("{:#}", error))
    }
}

/// Convert standard I/O errors into behaviour failures
impl From<std::io::Error> for ActorError {
    fn from(error: std::io::Error) -> Self {
        ActorError::failed_with_source(error.to_string(), error)
    }
}
