use std::fmt;
use std::io;
use std::sync::Arc;

use miniss_crypto::AeadError;
use thiserror::Error;

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Wire field whose bytes ran short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Hello,
    LengthPrefix,
    RecordBody,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Hello => write!(f, "hello message"),
            Field::LengthPrefix => write!(f, "record length prefix"),
            Field::RecordBody => write!(f, "record body"),
        }
    }
}

/// Secure channel error types.
///
/// `Clone` so that a failed read can be cached and replayed on every later read.
#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("truncated {field}: expected {expected} bytes, got {received}")]
    Truncation { field: Field, expected: usize, received: usize },

    #[error("record authentication failed")]
    AuthenticationFailure,

    #[error("transport error: {0}")]
    Transport(#[source] Arc<io::Error>),

    #[error("liveness check failed: {0}")]
    LivenessCheckFailure(#[source] Box<ChannelError>),

    #[error("record counter exhausted")]
    CounterExhausted,

    #[error("record sealing failed")]
    SealFailed,
}

impl ChannelError {
    pub fn transport(err: io::Error) -> Self {
        ChannelError::Transport(Arc::new(err))
    }

    /// True when the peer closed the transport cleanly on a record boundary.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, ChannelError::Truncation { field: Field::LengthPrefix, received: 0, .. })
    }
}

impl From<io::Error> for ChannelError {
    fn from(err: io::Error) -> Self {
        ChannelError::transport(err)
    }
}

impl From<AeadError> for ChannelError {
    fn from(err: AeadError) -> Self {
        match err {
            AeadError::AuthenticationFailed => ChannelError::AuthenticationFailure,
            AeadError::CounterExhausted => ChannelError::CounterExhausted,
            AeadError::SealFailed => ChannelError::SealFailed,
        }
    }
}

impl From<ChannelError> for io::Error {
    fn from(err: ChannelError) -> Self {
        let kind = match &err {
            ChannelError::Transport(inner) => inner.kind(),
            ChannelError::Truncation { .. } => io::ErrorKind::UnexpectedEof,
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, err)
    }
}
