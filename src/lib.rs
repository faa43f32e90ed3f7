//! Ship leveled JSON log records to Graylog as GELF messages.
//!
//! [`mapper::convert`] turns a record into a flat [`gelf::GelfMessage`];
//! [`stream::GelfStream`] wraps a [`transport::GelfTransport`] and tracks
//! in-flight writes so callers can wait for them to drain.

pub mod error;
pub mod record;
pub mod gelf;
pub mod flatten;
pub mod mapper;
pub mod transport;
pub mod stream;
pub mod config;
pub mod layer;
pub mod init;

#[cfg(feature = "udp")]
pub mod udp;

pub use error::SinkError;
pub use gelf::GelfMessage;
pub use mapper::convert;
pub use record::LogRecord;
pub use stream::{GelfStream, SinkEvent};
pub use transport::GelfTransport;
