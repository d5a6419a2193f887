//! Error taxonomy shared by every rotator crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RotatorError>;

/// Failures surfaced to the presentation layer. None of them end the session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RotatorError {
    /// Network failure, timeout, or non-2xx status on a read.
    #[error("could not load {what}: {detail}")]
    Fetch { what: String, detail: String },

    /// Non-2xx status on a workflow trigger.
    #[error("dispatch rejected with HTTP {status}: {message}")]
    Dispatch { status: u16, message: String },

    #[error("no avatars available")]
    EmptyCatalog,

    /// Missing or rejected credential on a path that needs one.
    #[error("credential problem: {0}")]
    Auth(String),

    #[error("avatar not in catalog: {0}")]
    UnknownAvatar(String),

    #[error("select an avatar first")]
    NothingSelected,

    #[error("invalid schedule `{expr}`: {reason}")]
    Schedule { expr: String, reason: String },

    #[error("invalid selection record: {0}")]
    Record(String),

    /// The session loop is gone (shutdown in progress).
    #[error("session unavailable: {0}")]
    Unavailable(String),
}

impl RotatorError {
    pub fn fetch(what: impl Into<String>, detail: impl ToString) -> Self {
        RotatorError::Fetch {
            what: what.into(),
            detail: detail.to_string(),
        }
    }

    pub fn schedule(expr: &str, reason: impl Into<String>) -> Self {
        RotatorError::Schedule {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable identifier for JSON payloads and notifications.
    pub fn kind(&self) -> &'static str {
        match self {
            RotatorError::Fetch { .. } => "fetch_error",
            RotatorError::Dispatch { .. } => "dispatch_error",
            RotatorError::EmptyCatalog => "empty_catalog",
            RotatorError::Auth(_) => "auth_error",
            RotatorError::UnknownAvatar(_) => "unknown_avatar",
            RotatorError::NothingSelected => "nothing_selected",
            RotatorError::Schedule { .. } => "schedule_error",
            RotatorError::Record(_) => "record_error",
            RotatorError::Unavailable(_) => "unavailable",
        }
    }

    /// User mistakes rather than system faults; shown as warnings.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RotatorError::EmptyCatalog
                | RotatorError::NothingSelected
                | RotatorError::UnknownAvatar(_)
                | RotatorError::Schedule { .. }
        )
    }
}

impl From<serde_json::Error> for RotatorError {
    fn from(err: serde_json::Error) -> Self {
        RotatorError::Record(err.to_string())
    }
}
