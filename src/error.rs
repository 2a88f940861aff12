//! Client-side error types.

use std::{fmt, io, sync::Arc};

use crate::packet;

/// Failures of the underlying byte transport.
///
/// A transport error invalidates every query pending on the connection, so it is [`Clone`] and
/// handed to each of them.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[source] SharedIoError),
    /// The connection was closed, or dropped, while queries were outstanding.
    #[error("connection closed")]
    Closed,
    /// The peer closed the stream in the middle of a length-prefixed frame.
    #[error("stream closed with {buffered} bytes of an incomplete frame buffered")]
    ClosedMidFrame { buffered: usize },
    /// An outbound message does not fit a 16-bit length prefix.
    #[error("message of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),
    /// A frame write was interrupted partway, so the peer can no longer find message
    /// boundaries on the stream.
    #[error("frame write interrupted; stream framing lost synchronization")]
    Desynchronized,
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        Self::Io(SharedIoError(Arc::new(e)))
    }
}

/// An [`io::Error`] that can be cloned, so that one I/O failure can fail many queries.
#[derive(Debug, Clone)]
pub struct SharedIoError(Arc<io::Error>);

impl SharedIoError {
    pub fn kind(&self) -> io::ErrorKind {
        self.0.kind()
    }
}

impl fmt::Display for SharedIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for SharedIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// The outcome of a query that did not produce a response message.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The response (or the message that failed to encode) was malformed.
    #[error("protocol error: {0}")]
    Protocol(#[from] packet::Error),
    /// A response arrived for a transaction ID that has no pending query.
    #[error("response with unknown transaction ID {0:#06x}")]
    UnknownQuery(u16),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// A query with this transaction ID is already outstanding on the connection.
    #[error("transaction ID {0:#06x} is already in use")]
    DuplicateId(u16),
    /// The connection's query table is full.
    #[error("too many pending queries")]
    TooManyPending,
    /// No response arrived in time. Only raised by drivers that implement timeouts.
    #[error("query timed out")]
    TimedOut,
}

impl ClientError {
    /// Returns whether this error invalidates the whole connection rather than one query.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        Self::Transport(e.into())
    }
}

impl From<ClientError> for io::Error {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Protocol(e) => e.into(),
            ClientError::Transport(TransportError::Io(io)) => io::Error::new(io.kind(), io),
            ClientError::TimedOut => io::ErrorKind::TimedOut.into(),
            e => io::Error::new(io::ErrorKind::Other, e),
        }
    }
}
