// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// A single tag identifying why a request pipeline terminated without success.
///
/// Recoverable tags allow failover to continue to the next node; non-recoverable
/// tags halt iteration immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineFailure {
    BadRequest,
    BadResponse,
    BadAuthentication,
    PingFailure,
    SniffFailure,
    CouldNotStartSniffOnStartup,
    MaxTimeoutReached,
    MaxRetriesReached,
    NoNodesAttempted,
    Cancelled,
    Unexpected,
}

impl PipelineFailure {
    /// Whether the pipeline should keep trying other nodes after this failure.
    #[must_use]
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::BadRequest | Self::BadResponse | Self::PingFailure)
    }
}

impl std::fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::BadRequest => "BadRequest",
            Self::BadResponse => "BadResponse",
            Self::BadAuthentication => "BadAuthentication",
            Self::PingFailure => "PingFailure",
            Self::SniffFailure => "SniffFailure",
            Self::CouldNotStartSniffOnStartup => "CouldNotStartSniffOnStartup",
            Self::MaxTimeoutReached => "MaxTimeoutReached",
            Self::MaxRetriesReached => "MaxRetriesReached",
            Self::NoNodesAttempted => "NoNodesAttempted",
            Self::Cancelled => "Cancelled",
            Self::Unexpected => "Unexpected",
        };
        write!(f, "{s}")
    }
}

#[allow(clippy::result_large_err)]
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{reason}: {message}")]
    Pipeline {
        reason: PipelineFailure,
        message: String,
        #[source]
        source: Option<Box<TransportError>>,
    },

    #[error("invoker error: {0}")]
    Invoker(#[from] reqwest::Error),

    #[error("response deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("request cancelled")]
    Cancelled,

    #[error("{0}")]
    Unexpected(String),
}

impl TransportError {
    #[must_use]
    pub fn pipeline(reason: PipelineFailure, message: impl Into<String>) -> Self {
        Self::Pipeline {
            reason,
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn pipeline_with_source(
        reason: PipelineFailure,
        message: impl Into<String>,
        source: TransportError,
    ) -> Self {
        Self::Pipeline {
            reason,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The pipeline failure tag for this error, if it originated in the pipeline.
    #[must_use]
    pub fn reason(&self) -> Option<PipelineFailure> {
        match self {
            Self::Pipeline { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Whether failover should continue after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Pipeline { reason, .. } => reason.is_recoverable(),
            Self::Invoker(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_tags() {
        assert!(PipelineFailure::BadRequest.is_recoverable());
        assert!(PipelineFailure::BadResponse.is_recoverable());
        assert!(PipelineFailure::PingFailure.is_recoverable());
        assert!(!PipelineFailure::BadAuthentication.is_recoverable());
        assert!(!PipelineFailure::MaxRetriesReached.is_recoverable());
        assert!(!PipelineFailure::NoNodesAttempted.is_recoverable());
    }

    #[test]
    fn pipeline_error_display() {
        let err = TransportError::pipeline(PipelineFailure::BadResponse, "502 from node");
        assert_eq!(err.to_string(), "BadResponse: 502 from node");
        assert_eq!(err.reason(), Some(PipelineFailure::BadResponse));
        assert!(err.is_recoverable());
    }
}
