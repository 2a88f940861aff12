//! Per-connection protocol state for datagram and stream transports.
//!
//! Neither type performs I/O. The caller moves bytes between the socket and the connection, and
//! awaits the [`PendingQuery`] handed out for every query sent.

use std::net::SocketAddr;

use crate::{
    config::Config,
    error::{ClientError, TransportError},
    framing::{
        datagram::Envelope,
        stream::{encode_frame, FrameDecoder},
    },
    packet::Message,
    pipeline::{Dispatcher, ErrorEvents, Inbound},
    query::PendingQuery,
};

/// A DNS client connection over a datagram transport (UDP).
///
/// Every message travels in its own datagram, so a bad datagram never affects the ones after it.
#[derive(Debug)]
pub struct DatagramConnection {
    peer: SocketAddr,
    config: Config,
    dispatcher: Dispatcher,
}

impl DatagramConnection {
    /// Creates a connection that sends its queries to `peer`.
    pub fn new(peer: SocketAddr, config: Config) -> Self {
        Self {
            peer,
            dispatcher: Dispatcher::new(&config),
            config,
        }
    }

    #[inline]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the number of queries awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.dispatcher.table().len()
    }

    /// Subscribes to errors that could not be delivered to a pending query.
    ///
    /// Only the most recent subscription receives errors.
    pub fn errors(&mut self) -> ErrorEvents {
        self.dispatcher.errors()
    }

    /// Encodes `msg` and registers it as pending.
    ///
    /// The returned [`Envelope`] must be transmitted by the caller.
    pub fn send(&mut self, msg: Message) -> Result<(Envelope, PendingQuery), ClientError> {
        let peer = self.peer;
        self.dispatcher
            .outbound(msg, |bytes| Ok(Envelope::wrap(peer, bytes)))
    }

    /// Processes one received datagram.
    pub fn receive(&mut self, datagram: Envelope) -> Inbound {
        let inbound = self.dispatcher.inbound(datagram.payload());
        if let Inbound::Unreadable(e) = inbound {
            self.dispatcher.report(e.into());
        }
        inbound
    }

    /// Stops tracking the query with `id` without resolving it.
    pub fn abandon(&mut self, id: u16) -> bool {
        self.dispatcher.table_mut().abandon(id)
    }

    /// Fails every pending query with `error`.
    ///
    /// The connection stays usable; datagram sockets usually survive errors such as an ICMP
    /// port unreachable.
    pub fn fail_all(&mut self, error: TransportError) -> usize {
        self.dispatcher.fail_all(error)
    }
}

/// A DNS client connection over a byte stream transport (TCP).
///
/// Messages are delimited by a 2-byte length prefix. A frame whose header cannot be read is
/// consumed whole and reported on the error channel, like an unreadable datagram, and the
/// connection carries on. Once a transport error occurs or the stream ends, the connection is
/// failed for good and every later [`StreamConnection::send`] is refused.
#[derive(Debug)]
pub struct StreamConnection {
    dispatcher: Dispatcher,
    frames: FrameDecoder,
    failure: Option<TransportError>,
}

impl StreamConnection {
    pub fn new(config: Config) -> Self {
        Self {
            dispatcher: Dispatcher::new(&config),
            frames: FrameDecoder::new(),
            failure: None,
        }
    }

    /// Returns the number of queries awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.dispatcher.table().len()
    }

    /// Returns the error that ended the connection, if any.
    pub fn failure(&self) -> Option<&TransportError> {
        self.failure.as_ref()
    }

    /// Subscribes to errors that could not be delivered to a pending query.
    ///
    /// Only the most recent subscription receives errors.
    pub fn errors(&mut self) -> ErrorEvents {
        self.dispatcher.errors()
    }

    /// Encodes and frames `msg` and registers it as pending.
    ///
    /// The returned bytes must be written to the stream by the caller.
    pub fn send(&mut self, msg: Message) -> Result<(Vec<u8>, PendingQuery), ClientError> {
        if let Some(e) = &self.failure {
            return Err(e.clone().into());
        }
        self.dispatcher
            .outbound(msg, |bytes| encode_frame(&bytes))
    }

    /// Processes a chunk of bytes read from the stream.
    ///
    /// Chunks may be split anywhere. Returns the outcome of every frame completed by this chunk.
    pub fn receive(&mut self, chunk: &[u8]) -> Vec<Inbound> {
        if self.failure.is_some() {
            log::debug!("discarding {} bytes read after connection failure", chunk.len());
            return Vec::new();
        }

        self.frames.extend(chunk);
        let mut outcomes = Vec::new();
        while let Some(frame) = self.frames.decode() {
            outcomes.push(self.inbound(&frame));
        }
        outcomes
    }

    fn inbound(&mut self, frame: &[u8]) -> Inbound {
        let inbound = self.dispatcher.inbound(frame);
        if let Inbound::Unreadable(e) = inbound {
            log::debug!("unreadable {}-byte frame", frame.len());
            self.dispatcher.report(e.into());
        }
        inbound
    }

    /// Handles the end of the stream.
    ///
    /// Any complete frame still buffered is processed. All queries left pending are then failed,
    /// with [`TransportError::ClosedMidFrame`] if the stream ended inside a frame and with
    /// [`TransportError::Closed`] otherwise. Returns the number of queries failed.
    pub fn close(&mut self) -> usize {
        if self.failure.is_some() {
            return 0;
        }

        loop {
            match self.frames.decode_last() {
                Ok(Some(frame)) => {
                    self.inbound(&frame);
                }
                Ok(None) => break,
                Err(e) => return self.fail(e),
            }
        }

        if self.dispatcher.table().is_empty() {
            self.failure = Some(TransportError::Closed);
            0
        } else {
            self.fail(TransportError::Closed)
        }
    }

    /// Stops tracking the query with `id` without resolving it.
    pub fn abandon(&mut self, id: u16) -> bool {
        self.dispatcher.table_mut().abandon(id)
    }

    /// Fails every pending query with `error` and ends the connection.
    pub fn fail_all(&mut self, error: TransportError) -> usize {
        self.fail(error)
    }

    fn fail(&mut self, error: TransportError) -> usize {
        self.frames = FrameDecoder::new();
        self.failure = Some(error.clone());
        self.dispatcher.fail_all(error)
    }
}
