use crate::gelf::GelfMessage;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous delivery of [`GelfMessage`]s to a GELF server.
///
/// Implementations own framing, chunking, compression and the socket.
/// [`GelfStream`](crate::stream::GelfStream) calls `emit` from a spawned
/// task and never awaits it on the writer's thread.
#[async_trait]
pub trait GelfTransport: Send + Sync {
    /// Deliver a single message.
    ///
    /// **Parameters**
    /// - `event`: event name, always [`GELF_LOG_EVENT`](crate::gelf::GELF_LOG_EVENT)
    ///   when called by the stream.
    /// - `message`: the converted message.
    ///
    /// **Returns**
    /// - `Ok(())` once the message has been handed to the network.
    /// - `Err(..)` if delivery failed. The stream hands the error to the
    ///   writer unchanged and does not retry.
    async fn emit(
        &self,
        event: &str,
        message: &GelfMessage,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// A transport that accepts and drops every message.
///
/// Useful for measuring conversion overhead without any I/O.
#[derive(Clone, Default)]
pub struct NoopTransport;

#[async_trait]
impl GelfTransport for NoopTransport {
    async fn emit(
        &self,
        _event: &str,
        _message: &GelfMessage,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
