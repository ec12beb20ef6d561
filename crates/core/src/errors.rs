use thiserror::Error;

use crate::phone::PhoneRejection;

/// Startup-class failures. These are the only errors allowed to stop the process.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Per-message failure taxonomy. Every variant is converted into a
/// `RoutingResult` at the router boundary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid contact: {0}")]
    InvalidContact(PhoneRejection),
    #[error("sender `{sender_id}` exceeded {limit} requests per minute")]
    RateLimited { sender_id: String, limit: usize },
    #[error("no processing slot became free within {timeout_ms}ms")]
    SystemBusy { timeout_ms: u64 },
    #[error("directory lookup timed out after {timeout_ms}ms")]
    LookupTimeout { timeout_ms: u64 },
    #[error("directory lookup failed: {0}")]
    LookupFailure(String),
    #[error("task execution failed: {0}")]
    Execution(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RoutingError {
    pub fn user_message(&self) -> String {
        match self {
            Self::RateLimited { .. } => {
                "Too many requests. Please wait a moment before trying again.".to_owned()
            }
            Self::SystemBusy { .. } => {
                "System is busy right now. Please try again in a few seconds.".to_owned()
            }
            Self::InvalidContact(rejection) => rejection.user_message().to_owned(),
            Self::InvalidInput(_) => {
                "That message could not be read. Please send it again as plain text.".to_owned()
            }
            Self::LookupTimeout { .. }
            | Self::LookupFailure(_)
            | Self::Execution(_)
            | Self::Internal(_) => {
                "Sorry, I couldn't process that message. Please try again.".to_owned()
            }
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidContact(_) => "invalid_contact",
            Self::RateLimited { .. } => "rate_limited",
            Self::SystemBusy { .. } => "system_busy",
            Self::LookupTimeout { .. } => "lookup_timeout",
            Self::LookupFailure(_) => "lookup_failure",
            Self::Execution(_) => "execution_failed",
            Self::Internal(_) => "internal",
        }
    }
}
