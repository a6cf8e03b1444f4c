use fs42_proto::config::ErrorPolicy;
use fs42_proto::schedule::SlotAddrError;
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use tracing::warn;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Everything that can go wrong talking to the scheduling backend.
///
/// `Clone` so one refresh result can be handed to every caller waiting on
/// it; foreign error sources are held behind `Arc` for that reason.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("invalid backend url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: Arc<reqwest::Error>,
    },

    #[error("{method} {url} returned {status}")]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// `.`, `..` and the empty string cannot be sent as a path segment.
    #[error("{0:?} cannot be used as a name in a backend path")]
    InvalidName(String),

    #[error("no channel named {0:?} in the backend's channel list")]
    UnknownChannel(String),

    #[error(transparent)]
    InvalidSlot(#[from] SlotAddrError),

    #[error("background refresh failed: {0}")]
    Refresh(String),

    #[error("request cancelled")]
    Cancelled,
}

impl StoreError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            StoreError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Transport { source, .. } if source.is_timeout())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StoreError::Cancelled)
    }
}

/// Settle `res` under `policy`. A swallowed failure is logged and replaced
/// by `fallback()`. Cancellation always reaches the caller.
pub(crate) fn apply_policy<T>(
    policy: ErrorPolicy,
    op: &str,
    res: Result<T>,
    fallback: impl FnOnce() -> T,
) -> Result<T> {
    match res {
        Ok(value) => Ok(value),
        Err(StoreError::Cancelled) => Err(StoreError::Cancelled),
        Err(e) => match policy {
            ErrorPolicy::Propagate => Err(e),
            ErrorPolicy::Swallow => {
                warn!("{} failed, using fallback: {}", op, e);
                Ok(fallback())
            }
        },
    }
}
