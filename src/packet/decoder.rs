//! DNS message decoder.

use std::mem::size_of;

use bytemuck::AnyBitPattern;

use crate::{hex::Hex, num::U16};

use super::{
    message::{Message, Question, Record},
    name::{DomainName, Label},
    Class, Error, Header, QClass, QType, Type,
};

/// Upper bound on compression pointers followed while reading one name.
///
/// A 255-byte name has at most 127 labels, so no legitimate name needs more pointers than that.
pub const MAX_POINTER_HOPS: usize = 127;

/// Smallest possible encoding of a question: root name, QTYPE, QCLASS.
const MIN_QUESTION_LEN: usize = 1 + 2 + 2;

/// Smallest possible encoding of a resource record: root name, TYPE, CLASS, TTL, RDLENGTH.
const MIN_RECORD_LEN: usize = 1 + 2 + 2 + 4 + 2;

#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    /// The whole DNS message. Compression pointers are offsets into this.
    full_buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self {
            full_buf: buf,
            pos: 0,
        }
    }

    /// Returns the unread part of the message.
    pub(crate) fn buf(&self) -> &'a [u8] {
        &self.full_buf[self.pos..]
    }

    pub(crate) fn read_obj<T: AnyBitPattern>(&mut self) -> Result<T, Error> {
        let bytes = self.read_slice(size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    fn peek_u8(&self) -> Result<u8, Error> {
        self.full_buf.get(self.pos).copied().ok_or(Error::Eof)
    }

    pub(crate) fn read_slice(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self.pos.checked_add(len).ok_or(Error::Eof)?;
        match self.full_buf.get(self.pos..end) {
            Some(slice) => {
                self.pos = end;
                Ok(slice)
            }
            None => Err(Error::Eof),
        }
    }

    pub(crate) fn read_array<const LEN: usize>(&mut self) -> Result<[u8; LEN], Error> {
        let mut out = [0; LEN];
        out.copy_from_slice(self.read_slice(LEN)?);
        Ok(out)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(self.read_obj::<U16>()?.get())
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Reads a `<domain-name>`, following compression pointers.
    ///
    /// A pointer must target an offset strictly below the start of the label run that contains
    /// it. Every jump therefore lands strictly earlier than the previous one, so any chain ends,
    /// and is additionally capped at [`MAX_POINTER_HOPS`]. The reader resumes right after the
    /// first pointer taken, or after the terminating zero label if there was none.
    pub(crate) fn read_domain_name(&mut self) -> Result<DomainName, Error> {
        let mut name = DomainName::ROOT;
        let mut cursor = self.clone();
        let mut run_start = self.pos;
        let mut resume = None;
        let mut hops = 0;

        loop {
            let length = cursor.peek_u8()?;
            match length & 0b1100_0000 {
                0b1100_0000 => {
                    let target = usize::from(cursor.read_u16()? & 0b0011_1111_1111_1111);
                    if target >= run_start {
                        return Err(Error::PointerLoop);
                    }
                    hops += 1;
                    if hops > MAX_POINTER_HOPS {
                        return Err(Error::TooManyPointers);
                    }
                    resume.get_or_insert(cursor.pos);
                    run_start = target;
                    cursor.pos = target;
                }
                0b0000_0000 => {
                    cursor.pos += 1;
                    if length == 0 {
                        break;
                    }
                    let label = cursor.read_slice(usize::from(length))?;
                    name.push_label(Label::try_new(label)?)?;
                }
                // 01 and 10 are reserved (the old EDNS extended label types)
                _ => return Err(Error::InvalidLabelType),
            }
        }

        self.pos = resume.unwrap_or(cursor.pos);
        Ok(name)
    }

    fn read_question(&mut self) -> Result<Question, Error> {
        let name = self.read_domain_name()?;
        let qtype = QType(self.read_u16()?);
        let qclass = QClass(self.read_u16()?);
        Ok(Question::new(name, qtype).class(qclass))
    }

    fn read_record(&mut self) -> Result<Record, Error> {
        let name = self.read_domain_name()?;
        let rtype = Type(self.read_u16()?);
        let class = Class(self.read_u16()?);
        let ttl = self.read_u32()?;
        let rdlength = self.read_u16()?;
        let rdata = self.read_slice(usize::from(rdlength))?;
        Ok(Record::new(name, rtype, rdata)
            .class(class)
            .ttl(ttl))
    }

    fn read_records(&mut self, count: u16) -> Result<Vec<Record>, Error> {
        (0..count).map(|_| self.read_record()).collect()
    }
}

/// Decodes only the fixed header at the start of `msg`.
pub fn decode_header(msg: &[u8]) -> Result<Header, Error> {
    Reader::new(msg).read_obj()
}

/// Returns the transaction ID of `msg`, if it is long enough to contain a header.
///
/// This is how a message that fails to decode can still be attributed to a pending query.
pub fn peek_id(msg: &[u8]) -> Option<u16> {
    decode_header(msg).ok().map(|h| h.id())
}

/// Decodes a complete DNS message.
///
/// Exactly as many questions and records as the header announces are read. Any short read,
/// invalid name, or over-announced count fails the whole message. Bytes after the last record
/// are ignored.
pub fn decode_message(msg: &[u8]) -> Result<Message, Error> {
    let mut r = Reader::new(msg);
    let header: Header = r.read_obj()?;

    let qdcount = header.question_count();
    let (ancount, nscount, arcount) = (
        header.answer_count(),
        header.authority_count(),
        header.additional_count(),
    );

    // Reject impossible counts before allocating anything for them.
    let rr_total = usize::from(ancount) + usize::from(nscount) + usize::from(arcount);
    let min_len = usize::from(qdcount) * MIN_QUESTION_LEN + rr_total * MIN_RECORD_LEN;
    if r.buf().len() < min_len {
        log::trace!(
            "{:?} needs at least {} more bytes, only {} present",
            header,
            min_len,
            r.buf().len()
        );
        return Err(Error::Eof);
    }

    let questions = (0..qdcount)
        .map(|_| r.read_question())
        .collect::<Result<Vec<_>, _>>()?;
    let answers = r.read_records(ancount)?;
    let authorities = r.read_records(nscount)?;
    let additional = r.read_records(arcount)?;

    if !r.buf().is_empty() {
        log::trace!("ignoring {} trailing bytes: {}", r.buf().len(), Hex(r.buf()));
    }

    Ok(Message::from_sections(
        header,
        questions,
        answers,
        authorities,
        additional,
    ))
}
