//! Transport Framing
//!
//! Every message travels over a fresh TCP connection: the sender writes its
//! payload and half-closes its write side, the receiver reads until
//! end-of-stream and only then processes. A request/response exchange is the
//! same thing in both directions over one connection.

use crate::protocol::Endpoint;
use crate::shutdown::Shutdown;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Upper bound on a single inbound message; longer messages are rejected.
pub const MAX_MESSAGE_BYTES: u64 = 64 * 1024;

/// How long a listener gives a sender to finish its message and half-close.
pub const INBOUND_READ_TIMEOUT: Duration = Duration::from_secs(13);

/// Pause after a failed `accept()` before trying again.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Opens a connection to `endpoint`.
pub async fn connect(endpoint: &Endpoint) -> io::Result<TcpStream> {
    TcpStream::connect(endpoint.addr()).await
}

/// Writes `payload` and half-closes the write side ("no more data from me").
pub async fn send(stream: &mut TcpStream, payload: &str) -> io::Result<()> {
    stream.write_all(payload.as_bytes()).await?;
    stream.shutdown().await
}

/// Reads until the peer half-closes and returns the text it sent.
///
/// A message over [`MAX_MESSAGE_BYTES`] is an `InvalidData` error, never a
/// truncated prefix.
pub async fn read_message(stream: &mut TcpStream) -> io::Result<String> {
    let mut buf = Vec::new();
    (&mut *stream)
        .take(MAX_MESSAGE_BYTES + 1)
        .read_to_end(&mut buf)
        .await?;

    if buf.len() as u64 > MAX_MESSAGE_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message exceeds {} bytes", MAX_MESSAGE_BYTES),
        ));
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// [`read_message`] bounded by `timeout`; a sender that never half-closes
/// gets a `TimedOut` error.
pub async fn read_message_within(stream: &mut TcpStream, timeout: Duration) -> io::Result<String> {
    tokio::time::timeout(timeout, read_message(stream))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "sender never half-closed"))?
}

/// Full request/response exchange over a dedicated connection.
pub async fn exchange(endpoint: &Endpoint, payload: &str) -> io::Result<String> {
    let mut stream = connect(endpoint).await?;
    send(&mut stream, payload).await?;
    read_message(&mut stream).await
}

/// One-way message: connect, write, half-close, and hang up without waiting
/// for anything back.
pub async fn notify(endpoint: &Endpoint, payload: &str) -> io::Result<()> {
    let mut stream = connect(endpoint).await?;
    send(&mut stream, payload).await
}

/// Connection failures that simply mean "nobody is listening there".
pub fn is_refusal(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
    )
}

/// Logs a failed accept on `listener` and waits [`ACCEPT_BACKOFF`] before the
/// next attempt. Returns `false` if shutdown arrived meanwhile.
pub async fn back_off_after_accept_error(
    listener: &Endpoint,
    err: &io::Error,
    shutdown: &mut Shutdown,
) -> bool {
    tracing::error!("{}: accept failed: {}", listener, err);
    shutdown.sleep(ACCEPT_BACKOFF).await
}
