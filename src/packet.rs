//! DNS message model, decoder and encoder.

#[macro_use]
mod macros;
pub mod decoder;
pub mod encoder;
mod error;
pub mod message;
pub mod name;

use core::fmt;

use bitflags::bitflags;

use crate::num::U16;

pub use error::Error;
pub use message::{Message, Question, Record};
pub use name::{DomainName, Label};

ffi_enum! {
    /// DNS message operation codes.
    pub enum Opcode: u8 {
        /// Standard query (or response to one).
        QUERY = 0,
        /// Inverse query. Obsolete, see RFC 3425.
        IQUERY = 1,
        /// Server status request.
        STATUS = 2,
        NOTIFY = 4,
        UPDATE = 5,
    }
}

ffi_enum! {
    /// Server response codes that fit into the 4-bit `RCODE` header field.
    pub enum RCode: u8 {
        /// No error.
        NO_ERROR = 0,
        /// The server could not interpret the query.
        FORM_ERR = 1,
        /// A server-side error prevented processing of the query.
        SERV_FAIL = 2,
        /// The queried domain name does not exist.
        NX_DOMAIN = 3,
        /// The server does not support the requested kind of query.
        NOT_IMP = 4,
        /// The server refused to answer for policy reasons.
        REFUSED = 5,
        YX_DOMAIN = 6,
        YX_RR_SET = 7,
        NX_RR_SET = 8,
        NOT_AUTH = 9,
        NOT_ZONE = 10,
    }
}

ffi_enum! {
    /// Resource Record types.
    ///
    /// Only the codes a stub client commonly sees are named; any other value is carried through
    /// unchanged.
    pub enum Type: u16 {
        A = 1,
        NS = 2,
        CNAME = 5,
        SOA = 6,
        PTR = 12,
        HINFO = 13,
        MX = 15,
        TXT = 16,
        AAAA = 28,
        SRV = 33,
        NAPTR = 35,
        DNAME = 39,
        OPT = 41,
        DS = 43,
        RRSIG = 46,
        NSEC = 47,
        DNSKEY = 48,
        SVCB = 64,
        HTTPS = 65,
        CAA = 257,
    }
}

ffi_enum! {
    /// The record type a question asks for.
    pub enum QType: u16 {
        // Shared with `Type`.
        A = 1,
        NS = 2,
        CNAME = 5,
        SOA = 6,
        PTR = 12,
        HINFO = 13,
        MX = 15,
        TXT = 16,
        AAAA = 28,
        SRV = 33,
        NAPTR = 35,
        DNAME = 39,
        DS = 43,
        RRSIG = 46,
        NSEC = 47,
        DNSKEY = 48,
        SVCB = 64,
        HTTPS = 65,
        CAA = 257,

        // Question-only codes.
        AXFR = 252,
        /// All records of any type.
        ALL = 255,
    }
}

ffi_enum! {
    /// Resource Record classes.
    pub enum Class: u16 {
        /// The Internet.
        IN = 1,
        /// Chaosnet.
        CH = 3,
        /// Hesiod.
        HS = 4,
    }
}

ffi_enum! {
    /// The record class a question asks for.
    pub enum QClass: u16 {
        /// The Internet.
        IN = 1,
        /// Chaosnet.
        CH = 3,
        /// Hesiod.
        HS = 4,
        /// Any class.
        ANY = 255,
    }
}

// RFC 1035 numbers header bits from the MSb.
const fn be_pos(pos: u16) -> u16 {
    15 - pos
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    struct HeaderFlags: u16 {
        /// Set in responses, clear in queries.
        const QR = 1 << be_pos(0);
        const OPCODE = Self::OPCODE_MASK;
        /// Authoritative Answer.
        const AA = 1 << be_pos(5);
        /// TrunCation: the message did not fit the transport and was cut short.
        const TC = 1 << be_pos(6);
        /// Recursion Desired, copied from query to response.
        const RD = 1 << be_pos(7);
        /// Recursion Available.
        const RA = 1 << be_pos(8);
        const Z = 0b111 << be_pos(11);
        const RCODE = Self::RCODE_MASK;
    }
}

impl HeaderFlags {
    const OPCODE_POS: u16 = 11;
    const OPCODE_MASK: u16 = 0b1111 << Self::OPCODE_POS;

    const RCODE_POS: u16 = 0;
    const RCODE_MASK: u16 = 0b1111 << Self::RCODE_POS;

    fn opcode(&self) -> Opcode {
        Opcode(((self.bits() & Self::OPCODE_MASK) >> Self::OPCODE_POS) as u8)
    }

    fn rcode(&self) -> RCode {
        RCode(((self.bits() & Self::RCODE_MASK) >> Self::RCODE_POS) as u8)
    }

    fn set_field(&mut self, mask: u16, pos: u16, value: u8) {
        let bits = (self.bits() & !mask) | ((u16::from(value) << pos) & mask);
        *self = Self::from_bits_retain(bits);
    }
}

/// The fixed 12-byte message header.
///
/// The layout matches the wire format exactly, so the header is read and written as a plain byte
/// copy.
#[derive(Clone, Copy, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C, packed)]
pub struct Header {
    id: U16,
    flags: U16,
    qdcount: U16,
    ancount: U16,
    nscount: U16,
    arcount: U16,
}

impl Header {
    /// Size of the header on the wire.
    pub const LEN: usize = 12;

    /// Creates the header of a standard query with the given transaction ID and the `RD` bit set.
    pub fn query(id: u16) -> Self {
        let mut h = Self::default();
        h.set_id(id);
        h.set_recursion_desired(true);
        h
    }

    /// Creates a response header echoing `query`'s ID, opcode and `RD` bit.
    pub fn response_to(query: &Header) -> Self {
        let mut h = Self::default();
        h.set_id(query.id());
        h.set_response(true);
        h.set_opcode(query.opcode());
        h.set_recursion_desired(query.is_recursion_desired());
        h
    }

    fn flags(&self) -> HeaderFlags {
        HeaderFlags::from_bits_retain(self.flags.get())
    }

    fn modify_flags(&mut self, with: impl FnOnce(&mut HeaderFlags)) {
        let mut flags = self.flags();
        with(&mut flags);
        self.flags = flags.bits().into();
    }

    /// Returns the 16-bit transaction ID.
    ///
    /// Servers copy it into the response, which is how responses are matched to queries.
    #[inline]
    pub fn id(&self) -> u16 {
        self.id.get()
    }

    #[inline]
    pub fn set_id(&mut self, id: u16) {
        self.id = id.into();
    }

    #[inline]
    pub fn is_query(&self) -> bool {
        !self.is_response()
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        self.flags().contains(HeaderFlags::QR)
    }

    pub fn set_response(&mut self, is_response: bool) {
        self.modify_flags(|f| f.set(HeaderFlags::QR, is_response));
    }

    pub fn is_truncated(&self) -> bool {
        self.flags().contains(HeaderFlags::TC)
    }

    pub fn set_truncated(&mut self, trunc: bool) {
        self.modify_flags(|f| f.set(HeaderFlags::TC, trunc));
    }

    pub fn is_recursion_desired(&self) -> bool {
        self.flags().contains(HeaderFlags::RD)
    }

    pub fn set_recursion_desired(&mut self, rd: bool) {
        self.modify_flags(|f| f.set(HeaderFlags::RD, rd));
    }

    pub fn is_recursion_available(&self) -> bool {
        self.flags().contains(HeaderFlags::RA)
    }

    pub fn set_recursion_available(&mut self, ra: bool) {
        self.modify_flags(|f| f.set(HeaderFlags::RA, ra));
    }

    pub fn is_authority(&self) -> bool {
        self.flags().contains(HeaderFlags::AA)
    }

    pub fn set_authority(&mut self, aa: bool) {
        self.modify_flags(|f| f.set(HeaderFlags::AA, aa));
    }

    pub fn opcode(&self) -> Opcode {
        self.flags().opcode()
    }

    pub fn set_opcode(&mut self, opcode: Opcode) {
        self.modify_flags(|f| {
            f.set_field(HeaderFlags::OPCODE_MASK, HeaderFlags::OPCODE_POS, opcode.0)
        });
    }

    pub fn rcode(&self) -> RCode {
        self.flags().rcode()
    }

    pub fn set_rcode(&mut self, rcode: RCode) {
        self.modify_flags(|f| f.set_field(HeaderFlags::RCODE_MASK, HeaderFlags::RCODE_POS, rcode.0));
    }

    pub fn question_count(&self) -> u16 {
        self.qdcount.get()
    }

    pub fn answer_count(&self) -> u16 {
        self.ancount.get()
    }

    pub fn authority_count(&self) -> u16 {
        self.nscount.get()
    }

    pub fn additional_count(&self) -> u16 {
        self.arcount.get()
    }

    /// Overwrites the four section counts.
    ///
    /// Only [`Message`] calls this, so that a message's header always agrees with its sections.
    pub(crate) fn set_counts(&mut self, qd: u16, an: u16, ns: u16, ar: u16) {
        self.qdcount = qd.into();
        self.ancount = an.into();
        self.nscount = ns.into();
        self.arcount = ar.into();
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("id", &self.id())
            .field("flags", &self.flags())
            .field("qdcount", &self.question_count())
            .field("ancount", &self.answer_count())
            .field("nscount", &self.authority_count())
            .field("arcount", &self.additional_count())
            .finish()
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id {:#06x} {} {} {}",
            self.id(),
            if self.is_response() { "response" } else { "query" },
            self.opcode(),
            self.rcode(),
        )?;
        for (set, name) in [
            (self.is_authority(), "aa"),
            (self.is_truncated(), "tc"),
            (self.is_recursion_desired(), "rd"),
            (self.is_recursion_available(), "ra"),
        ] {
            if set {
                write!(f, " {}", name)?;
            }
        }
        Ok(())
    }
}
