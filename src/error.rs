use thiserror::Error;

/// Failures while decoding a wire message.
///
/// These never cross a connection boundary: the unit of work that hit one
/// logs it and drops the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty message")]
    Empty,

    #[error("unknown message tag: {0}")]
    UnknownTag(String),

    #[error("{kind}: expected {expected} fields, got {actual}")]
    FieldCount {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("gossip message without sender annotation")]
    MissingSender,
}
