//! Wire-protocol core of a DNS client.
//!
//! This crate turns raw octets into DNS [`Message`]s and back, and matches the responses
//! arriving on a connection with the queries that caused them. It performs no I/O: a
//! [`DatagramConnection`] or [`StreamConnection`] is fed the bytes read from a socket and hands
//! back the bytes to write, and every query sent yields a [`PendingQuery`] that resolves exactly
//! once.
//!
//! [`Message`]: packet::Message
//! [`DatagramConnection`]: connection::DatagramConnection
//! [`StreamConnection`]: connection::StreamConnection
//! [`PendingQuery`]: query::PendingQuery

mod hex;
mod num;

pub mod config;
pub mod connection;
pub mod error;
pub mod framing;
pub mod packet;
pub mod pipeline;
pub mod query;

pub use config::Config;
pub use error::{ClientError, TransportError};

/// Size of unicast DNS message buffers.
///
/// Unicast DNS messages are limited to 512 Bytes.
pub const DNS_BUFFER_SIZE: usize = 512;
