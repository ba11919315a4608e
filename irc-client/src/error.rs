use std::fmt;
use std::io;

/// Why a session stopped. Passed to the on-disconnect action; `None` on a
/// clean, user-initiated shutdown.
#[derive(Debug)]
pub enum DisconnectCause {
    /// `disconnect()` was called.
    Clean,
    /// The read timeout fired with no frame arriving in time.
    Timeout,
    /// The socket or TLS layer failed.
    TransportError(io::Error),
    /// The codec rejected a frame it could not recover from (currently
    /// unused: single-frame codec errors are logged and dropped rather than
    /// ending the session, see `SessionError::ProtocolError`'s doc comment).
    ProtocolError(String),
}

impl fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectCause::Clean => write!(f, "clean disconnect"),
            DisconnectCause::Timeout => write!(f, "read timeout"),
            DisconnectCause::TransportError(e) => write!(f, "transport error: {}", e),
            DisconnectCause::ProtocolError(e) => write!(f, "protocol error: {}", e),
        }
    }
}

impl std::error::Error for DisconnectCause {}

/// Returned by `send`/`send_bs` when the send queue has already been
/// closed (the session is Disconnecting or Disconnected).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendError;

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "send queue is closed")
    }
}

impl std::error::Error for SendError {}

/// Failure to establish the underlying connection (DNS, TCP, or TLS).
#[derive(Debug)]
pub enum ConnectError {
    Io(io::Error),
    Tls(String),
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::Io(e) => write!(f, "I/O error: {}", e),
            ConnectError::Tls(e) => write!(f, "TLS error: {}", e),
        }
    }
}

impl std::error::Error for ConnectError {}

impl From<io::Error> for ConnectError {
    fn from(e: io::Error) -> Self {
        ConnectError::Io(e)
    }
}
