use thiserror::Error;

pub type OpResult<T> = Result<T, OpError>;

/// Failure taxonomy for the operations library.
///
/// `InvalidArgument` maps to a client error at the wire boundary; everything
/// else is reported as a server-side failure. Inside a workflow, every variant
/// is folded into a FAILED outcome and never aborts sibling tasks.
#[derive(Debug, Error)]
pub enum OpError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("{message}: {source}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl OpError {
    pub fn invalid(message: impl Into<String>) -> Self {
        OpError::InvalidArgument(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        OpError::Unsupported(message.into())
    }

    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        OpError::Io {
            message: message.into(),
            source,
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, OpError::InvalidArgument(_))
    }
}
