use serde_json::Value;
use thiserror::Error;

/// Errors surfaced to callers of the suggestion endpoint.
#[derive(Debug, Error)]
pub enum SuggestError {
    /// Bad or missing caller input (empty prompt, no resolvable key).
    #[error("{0}")]
    Validation(String),

    /// The provider was unreachable or answered with something unusable.
    #[error("{message}")]
    Upstream {
        message: String,
        detail: Option<Value>,
    },
}

impl SuggestError {
    pub fn validation<M: Into<String>>(message: M) -> Self {
        Self::Validation(message.into())
    }

    pub fn upstream<M: Into<String>>(message: M, detail: Option<Value>) -> Self {
        Self::Upstream {
            message: message.into(),
            detail,
        }
    }

    /// HTTP status the endpoint answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Upstream { .. } => 502,
        }
    }

    pub fn detail(&self) -> Option<&Value> {
        match self {
            Self::Validation(_) => None,
            Self::Upstream { detail, .. } => detail.as_ref(),
        }
    }
}

/// Failures of the persistence layer underneath the task store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize tasks: {0}")]
    Serialize(#[from] serde_json::Error),
}
