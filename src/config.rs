//! Per-connection settings.

use crate::DNS_BUFFER_SIZE;

/// Settings shared by [`DatagramConnection`] and [`StreamConnection`].
///
/// [`DatagramConnection`]: crate::connection::DatagramConnection
/// [`StreamConnection`]: crate::connection::StreamConnection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    max_pending: usize,
    assign_ids: bool,
    recv_buffer_size: usize,
}

impl Config {
    pub const DEFAULT_MAX_PENDING: usize = 1024;

    /// Limits the number of queries that may be outstanding at once.
    ///
    /// Values are clamped to `1..=65536`, the size of the transaction ID space.
    #[inline]
    pub fn with_max_pending(self, max_pending: usize) -> Self {
        Self {
            max_pending,
            ..self
        }
    }

    /// If enabled, every outgoing query gets a fresh random transaction ID, replacing the one
    /// set by the caller.
    ///
    /// Disabled by default, so the IDs in outgoing messages are exactly the ones the caller
    /// chose.
    #[inline]
    pub fn with_assign_ids(self, assign_ids: bool) -> Self {
        Self { assign_ids, ..self }
    }

    /// Sets the size of the buffer incoming datagrams are received into.
    ///
    /// Responses larger than this are cut off by the socket and will fail to decode. Defaults
    /// to [`DNS_BUFFER_SIZE`].
    #[inline]
    pub fn with_recv_buffer_size(self, recv_buffer_size: usize) -> Self {
        Self {
            recv_buffer_size,
            ..self
        }
    }

    #[inline]
    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    #[inline]
    pub fn assign_ids(&self) -> bool {
        self.assign_ids
    }

    #[inline]
    pub fn recv_buffer_size(&self) -> usize {
        self.recv_buffer_size
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_pending: Self::DEFAULT_MAX_PENDING,
            assign_ids: false,
            recv_buffer_size: DNS_BUFFER_SIZE,
        }
    }
}
