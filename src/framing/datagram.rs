//! Datagram framing: one message per datagram, with no buffering.

use std::net::SocketAddr;

/// A message payload together with the address of the peer it is sent to or came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    peer: SocketAddr,
    payload: Vec<u8>,
}

impl Envelope {
    /// Addresses `payload` to `peer`. The payload is not modified.
    #[inline]
    pub fn wrap(peer: SocketAddr, payload: Vec<u8>) -> Self {
        Self { peer, payload }
    }

    #[inline]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Strips the address and returns the raw payload.
    #[inline]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}
