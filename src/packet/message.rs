//! Owned, immutable DNS messages.

use std::{fmt, time::Duration};

use super::{name::DomainName, Class, Header, QClass, QType, Type};
use crate::hex::Hex;

/// A complete DNS message.
///
/// A [`Message`] is immutable once built. The builder methods consume and return the message, and
/// the header's section counts are always recomputed from the sections, so a message can never
/// disagree with its own header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    header: Header,
    questions: Vec<Question>,
    answers: Vec<Record>,
    authorities: Vec<Record>,
    additional: Vec<Record>,
}

impl Message {
    /// Creates a message with the given header and empty sections.
    ///
    /// The counts in `header` are ignored.
    pub fn new(header: Header) -> Self {
        Self::from_sections(header, Vec::new(), Vec::new(), Vec::new(), Vec::new())
    }

    /// Creates a standard recursive query for a single question.
    pub fn query(id: u16, question: Question) -> Self {
        Self::new(Header::query(id)).with_question(question)
    }

    pub(crate) fn from_sections(
        mut header: Header,
        questions: Vec<Question>,
        answers: Vec<Record>,
        authorities: Vec<Record>,
        additional: Vec<Record>,
    ) -> Self {
        header.set_counts(
            saturating_count(questions.len()),
            saturating_count(answers.len()),
            saturating_count(authorities.len()),
            saturating_count(additional.len()),
        );
        Self {
            header,
            questions,
            answers,
            authorities,
            additional,
        }
    }

    fn rebuild(self, edit: impl FnOnce(&mut Self)) -> Self {
        let mut this = self;
        edit(&mut this);
        Self::from_sections(
            this.header,
            this.questions,
            this.answers,
            this.authorities,
            this.additional,
        )
    }

    /// Replaces the header. Section counts are kept in sync with the sections.
    pub fn with_header(self, header: Header) -> Self {
        self.rebuild(|m| m.header = header)
    }

    /// Replaces the transaction ID.
    pub fn with_id(self, id: u16) -> Self {
        self.rebuild(|m| m.header.set_id(id))
    }

    pub fn with_question(self, question: Question) -> Self {
        self.rebuild(|m| m.questions.push(question))
    }

    pub fn with_answer(self, record: Record) -> Self {
        self.rebuild(|m| m.answers.push(record))
    }

    pub fn with_authority(self, record: Record) -> Self {
        self.rebuild(|m| m.authorities.push(record))
    }

    pub fn with_additional(self, record: Record) -> Self {
        self.rebuild(|m| m.additional.push(record))
    }

    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Shorthand for `self.header().id()`.
    #[inline]
    pub fn id(&self) -> u16 {
        self.header.id()
    }

    #[inline]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[inline]
    pub fn answers(&self) -> &[Record] {
        &self.answers
    }

    #[inline]
    pub fn authorities(&self) -> &[Record] {
        &self.authorities
    }

    #[inline]
    pub fn additional(&self) -> &[Record] {
        &self.additional
    }
}

// Oversized sections are rejected by the encoder; the count just must not wrap.
fn saturating_count(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

impl fmt::Display for Message {
    /// Formats the message in a `dig`-like layout.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ";; {}", self.header)?;
        if !self.questions.is_empty() {
            writeln!(f, ";; QUESTION")?;
            for q in &self.questions {
                writeln!(f, "{}", q)?;
            }
        }
        for (title, section) in [
            ("ANSWER", &self.answers),
            ("AUTHORITY", &self.authorities),
            ("ADDITIONAL", &self.additional),
        ] {
            if section.is_empty() {
                continue;
            }
            writeln!(f, ";; {}", title)?;
            for rr in section {
                writeln!(f, "{}", rr)?;
            }
        }
        Ok(())
    }
}

/// An entry of the *Question* section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    name: DomainName,
    qtype: QType,
    qclass: QClass,
}

impl Question {
    /// Creates a question for records of type `qtype` in the Internet class.
    #[inline]
    pub fn new(name: DomainName, qtype: QType) -> Self {
        Self {
            name,
            qtype,
            qclass: QClass::IN,
        }
    }

    /// Sets the class to query. Almost everything uses the default, [`QClass::IN`].
    #[inline]
    pub fn class(self, qclass: QClass) -> Self {
        Self { qclass, ..self }
    }

    #[inline]
    pub fn name(&self) -> &DomainName {
        &self.name
    }

    #[inline]
    pub fn qtype(&self) -> QType {
        self.qtype
    }

    #[inline]
    pub fn qclass(&self) -> QClass {
        self.qclass
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.name, self.qclass, self.qtype)
    }
}

/// A Resource Record from the *Answer*, *Authority* or *Additional* section.
///
/// The record data is kept as opaque bytes; interpreting it is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    name: DomainName,
    rtype: Type,
    class: Class,
    ttl: u32,
    rdata: Vec<u8>,
}

impl Record {
    /// Creates an Internet-class record with a TTL of 0.
    pub fn new(name: DomainName, rtype: Type, rdata: impl Into<Vec<u8>>) -> Self {
        Self {
            name,
            rtype,
            class: Class::IN,
            ttl: 0,
            rdata: rdata.into(),
        }
    }

    #[inline]
    pub fn class(self, class: Class) -> Self {
        Self { class, ..self }
    }

    #[inline]
    pub fn ttl(self, ttl: u32) -> Self {
        Self { ttl, ..self }
    }

    #[inline]
    pub fn name(&self) -> &DomainName {
        &self.name
    }

    #[inline]
    pub fn record_type(&self) -> Type {
        self.rtype
    }

    #[inline]
    pub fn record_class(&self) -> Class {
        self.class
    }

    /// Returns the raw 32-bit TTL field.
    #[inline]
    pub fn raw_ttl(&self) -> u32 {
        self.ttl
    }

    /// Returns how long the record may be cached.
    ///
    /// The full 32-bit field counts as unsigned seconds.
    pub fn ttl_duration(&self) -> Duration {
        Duration::from_secs(self.ttl.into())
    }

    #[inline]
    pub fn rdata(&self) -> &[u8] {
        &self.rdata
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.name,
            self.ttl,
            self.class,
            self.rtype,
            Hex(&self.rdata)
        )
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;

    fn name(s: &str) -> DomainName {
        DomainName::from_str(s).unwrap()
    }

    #[test]
    fn counts_follow_sections() {
        let q = Message::query(1, Question::new(name("example.com"), QType::A));
        assert_eq!(q.header().question_count(), 1);
        assert_eq!(q.header().answer_count(), 0);

        let r = Message::new(Header::response_to(q.header()))
            .with_question(q.questions()[0].clone())
            .with_answer(Record::new(name("example.com"), Type::A, [93u8, 184, 216, 34]))
            .with_additional(Record::new(DomainName::ROOT, Type::OPT, Vec::new()));
        assert_eq!(r.header().question_count(), 1);
        assert_eq!(r.header().answer_count(), 1);
        assert_eq!(r.header().authority_count(), 0);
        assert_eq!(r.header().additional_count(), 1);

        // Replacing the header cannot smuggle in wrong counts.
        let r = r.with_header(Header::query(9));
        assert_eq!(r.id(), 9);
        assert_eq!(r.header().answer_count(), 1);
    }

    #[test]
    fn ttl_is_unsigned() {
        let rr = Record::new(name("a"), Type::A, [0u8; 4]);
        assert_eq!(rr.clone().ttl(300).ttl_duration(), Duration::from_secs(300));
        assert_eq!(rr.clone().ttl(0x8000_0000).ttl_duration(), Duration::from_secs(0x8000_0000));
        assert_eq!(rr.ttl(u32::MAX).ttl_duration(), Duration::from_secs(u64::from(u32::MAX)));
    }

    #[test]
    fn display() {
        let msg = Message::new(Header::response_to(&Header::query(0x1234)))
            .with_question(Question::new(name("example.com"), QType::A))
            .with_answer(
                Record::new(name("example.com"), Type::A, [93u8, 184, 216, 34]).ttl(3600),
            );
        expect![[r#"
            ;; id 0x1234 response QUERY NO_ERROR rd
            ;; QUESTION
            example.com.	IN	A
            ;; ANSWER
            example.com.	3600	IN	A	5db8d822
        "#]]
        .assert_eq(&msg.to_string());
    }
}
