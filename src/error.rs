use std::error::Error;

/// Errors reported by [`GelfStream`](crate::stream::GelfStream) to its callers.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    /// `write` was called after `end`, `destroy` or `destroy_soon`.
    #[error("stream not writable")]
    NotWritable,

    /// The transport failed to deliver the message. The inner error is the
    /// transport's own, untouched.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn Error + Send + Sync>),

    /// The task awaiting the transport went away before reporting back,
    /// usually because the runtime was shut down.
    #[error("write completion was dropped before the transport reported back")]
    CompletionDropped,

    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Failure while converting a single record field into GELF.
///
/// These never abort a conversion; the mapper turns them into
/// `__<field>Error` / `__<field>ErrorJSON` diagnostic fields.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("time field has an invalid date: {value}")]
    InvalidDate { value: String },

    #[error("{field} field must be a scalar value, got {kind}")]
    NotScalar { field: String, kind: &'static str },
}

/// Error type returned when reading a [`GelfConfig`](crate::config::GelfConfig)
/// from the environment.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid port {0:?}")]
    InvalidPort(String),

    #[error("invalid connection class {0:?}, expected \"wan\" or \"lan\"")]
    InvalidConnection(String),

    #[error("invalid max chunk size {0:?}")]
    InvalidChunkSize(String),
}

/// Errors raised by the bundled UDP transport.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("max chunk size {size} leaves no room after the 12-byte chunk header")]
    InvalidChunkSize { size: usize },

    #[error("message needs {chunks} chunks, GELF allows at most 128")]
    TooManyChunks { chunks: usize },

    #[error("udp io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize GELF message: {0}")]
    Serialization(#[from] serde_json::Error),
}
