use crate::config::{GelfConfig, GELF_CHUNK_HEADER_LEN as CHUNK_HEADER_LEN};
use crate::error::TransportError;
use crate::gelf::GelfMessage;
use crate::transport::GelfTransport;
use async_trait::async_trait;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::UdpSocket;
use tracing::debug;

/// Magic bytes opening every chunked GELF datagram.
const CHUNK_MAGIC: [u8; 2] = [0x1e, 0x0f];

/// GELF servers drop messages split into more chunks than this.
pub const MAX_CHUNKS: usize = 128;

/// GELF over UDP.
///
/// Messages are sent as uncompressed JSON. A message larger than the
/// configured chunk size for the connection class is split into GELF
/// chunks; anything that would need more than [`MAX_CHUNKS`] is rejected.
pub struct UdpTransport {
    socket: UdpSocket,
    max_chunk_size: usize,
    id_seed: u64,
    sent: AtomicU64,
}

impl UdpTransport {
    /// Bind an ephemeral local socket and connect it to the server named by
    /// `config`.
    ///
    /// Fails with [`TransportError::InvalidChunkSize`] before touching the
    /// network when the chunk size cannot hold a chunk header plus payload.
    pub async fn connect(config: &GelfConfig) -> Result<Self, TransportError> {
        let max_chunk_size = config.max_chunk_size();
        if max_chunk_size <= CHUNK_HEADER_LEN {
            return Err(TransportError::InvalidChunkSize { size: max_chunk_size });
        }

        let target = tokio::net::lookup_host(config.address())
            .await?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no address found for {}", config.address()),
                )
            })?;

        let local: SocketAddr = match target {
            SocketAddr::V4(_) => ([0u8; 4], 0).into(),
            SocketAddr::V6(_) => ([0u16; 8], 0).into(),
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;

        debug!(target_addr = %target, connection = %config.connection, "gelf udp transport connected");

        Ok(Self {
            socket,
            max_chunk_size,
            id_seed: (chrono::Utc::now().timestamp_millis() as u64) ^ ((std::process::id() as u64) << 32),
            sent: AtomicU64::new(0),
        })
    }

    async fn send_message(&self, message: &GelfMessage) -> Result<(), TransportError> {
        let payload = message.to_json_vec()?;
        let sequence = self.sent.fetch_add(1, Ordering::Relaxed);
        let message_id = (self.id_seed ^ sequence.wrapping_mul(0x9E37_79B9_7F4A_7C15)).to_be_bytes();

        let datagrams = chunk_datagrams(&payload, self.max_chunk_size, message_id)?;
        for datagram in &datagrams {
            self.socket.send(datagram).await?;
        }
        debug!(bytes = payload.len(), datagrams = datagrams.len(), "gelf message sent");
        Ok(())
    }
}

#[async_trait]
impl GelfTransport for UdpTransport {
    async fn emit(
        &self,
        _event: &str,
        message: &GelfMessage,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(self.send_message(message).await?)
    }
}

/// Split `payload` into datagrams no larger than `max_chunk_size`.
///
/// A payload that fits is returned as a single plain datagram.
fn chunk_datagrams(
    payload: &[u8],
    max_chunk_size: usize,
    message_id: [u8; 8],
) -> Result<Vec<Vec<u8>>, TransportError> {
    if payload.len() <= max_chunk_size {
        return Ok(vec![payload.to_vec()]);
    }

    let body_size = max_chunk_size.saturating_sub(CHUNK_HEADER_LEN);
    if body_size == 0 {
        return Err(TransportError::InvalidChunkSize { size: max_chunk_size });
    }
    let chunks = payload.len().div_ceil(body_size);
    if chunks > MAX_CHUNKS {
        return Err(TransportError::TooManyChunks { chunks });
    }

    Ok(payload
        .chunks(body_size)
        .enumerate()
        .map(|(index, body)| {
            let mut datagram = Vec::with_capacity(CHUNK_HEADER_LEN + body.len());
            datagram.extend_from_slice(&CHUNK_MAGIC);
            datagram.extend_from_slice(&message_id);
            datagram.push(index as u8);
            datagram.push(chunks as u8);
            datagram.extend_from_slice(body);
            datagram
        })
        .collect())
}
