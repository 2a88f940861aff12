//! DNS message encoder.

use bytemuck::NoUninit;

use crate::DNS_BUFFER_SIZE;

use super::{
    message::{Message, Question, Record},
    name::DomainName,
    Error,
};

/// Appends wire-format fields to a growable buffer.
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn write_slice(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub(crate) fn write_obj<T: NoUninit>(&mut self, obj: T) {
        self.write_slice(bytemuck::bytes_of(&obj))
    }

    pub(crate) fn write_u8(&mut self, b: u8) {
        self.buf.push(b);
    }

    pub(crate) fn write_u16(&mut self, v: u16) {
        self.write_slice(&v.to_be_bytes());
    }

    pub(crate) fn write_u32(&mut self, v: u32) {
        self.write_slice(&v.to_be_bytes());
    }

    /// Writes an uncompressed `<domain-name>`.
    pub(crate) fn write_domain_name(&mut self, name: &DomainName) {
        for label in name {
            // `Label` guarantees at most 63 bytes.
            self.write_u8(label.as_bytes().len() as u8);
            self.write_slice(label.as_bytes());
        }
        self.write_u8(0);
    }

    fn write_question(&mut self, q: &Question) {
        self.write_domain_name(q.name());
        self.write_u16(q.qtype().raw());
        self.write_u16(q.qclass().raw());
    }

    fn write_record(&mut self, rr: &Record) -> Result<(), Error> {
        let rdlength = u16::try_from(rr.rdata().len()).map_err(|_| Error::TooLong)?;
        self.write_domain_name(rr.name());
        self.write_u16(rr.record_type().raw());
        self.write_u16(rr.record_class().raw());
        self.write_u32(rr.raw_ttl());
        self.write_u16(rdlength);
        self.write_slice(rr.rdata());
        Ok(())
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Encodes `msg` into its wire form.
///
/// The header is written as stored in the message, so its counts always match the sections that
/// follow. Names are written uncompressed. The output depends only on `msg`.
///
/// Fails with [`Error::TooLong`] if a section holds more than 65535 entries or a record's data
/// exceeds 65535 bytes.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, Error> {
    for len in [
        msg.questions().len(),
        msg.answers().len(),
        msg.authorities().len(),
        msg.additional().len(),
    ] {
        if len > usize::from(u16::MAX) {
            return Err(Error::TooLong);
        }
    }

    let mut w = Writer::with_capacity(DNS_BUFFER_SIZE);
    w.write_obj(*msg.header());
    for q in msg.questions() {
        w.write_question(q);
    }
    for rr in msg
        .answers()
        .iter()
        .chain(msg.authorities())
        .chain(msg.additional())
    {
        w.write_record(rr)?;
    }
    Ok(w.finish())
}

#[cfg(test)]
mod tests {
    use crate::{
        hex,
        packet::{decoder::decode_message, Class, Header, QClass, QType, Type},
    };

    use super::*;

    fn name(s: &str) -> DomainName {
        DomainName::from_str(s).unwrap()
    }

    #[test]
    fn encode_query() {
        let msg = Message::query(0x1234, Question::new(name("example.com"), QType::A));
        assert_eq!(
            encode_message(&msg).unwrap(),
            hex::parse(
                "
                1234 0100 0001 0000 0000 0000
                07 6578616d706c65 03 636f6d 00 0001 0001
                "
            )
        );
    }

    #[test]
    fn encode_root_question() {
        let msg = Message::query(1, Question::new(DomainName::ROOT, QType::NS));
        assert_eq!(
            encode_message(&msg).unwrap(),
            hex::parse("0001 0100 0001 0000 0000 0000 00 0002 0001")
        );
    }

    #[test]
    fn roundtrip_questions() {
        let mut header = Header::query(0xffff);
        header.set_recursion_desired(false);
        let msg = Message::new(header)
            .with_question(Question::new(name("example.com"), QType::AAAA))
            .with_question(Question::new(name("version.bind"), QType::TXT).class(QClass::CH))
            .with_question(Question::new(DomainName::ROOT, QType::from(4242)))
            .with_question(
                Question::new(DomainName::from_labels([&b"\0bin\xff"[..]]).unwrap(), QType::ALL)
                    .class(QClass::ANY),
            );
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(decode_message(&bytes), Ok(msg));
    }

    #[test]
    fn roundtrip_records() {
        let mut header = Header::response_to(&Header::query(77));
        header.set_authority(true);
        let msg = Message::new(header)
            .with_question(Question::new(name("example.org"), QType::MX))
            .with_answer(
                Record::new(name("example.org"), Type::MX, *b"\x00\x0a\x04mail\xc0\x0c").ttl(60),
            )
            .with_authority(Record::new(name("org"), Type::NS, *b"\x02ns\xc0\x0c").ttl(172800))
            .with_additional(Record::new(DomainName::ROOT, Type::OPT, Vec::new()).class(Class(1232)));
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(decode_message(&bytes), Ok(msg));
    }

    #[test]
    fn rdata_too_long() {
        let msg = Message::new(Header::default())
            .with_answer(Record::new(DomainName::ROOT, Type::TXT, vec![0; 65536]));
        assert_eq!(encode_message(&msg), Err(Error::TooLong));
    }
}
