//! Message framing for the two DNS transport shapes.
//!
//! Over UDP every datagram carries exactly one message ([`datagram`]). Over TCP messages are
//! prefixed with their length as a big-endian `u16` ([`stream`]).

pub mod datagram;
pub mod stream;
