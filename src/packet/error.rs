use std::io;

/// Structural errors raised while decoding or encoding a DNS message.
///
/// Any of these aborts the whole operation; the decoder never hands out a partially decoded
/// message.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The end of the message was reached while more data was expected.
    ///
    /// This is also returned up front when the header declares more entries than the rest of the
    /// buffer could possibly hold.
    #[error("unexpected end of data")]
    Eof,
    /// A domain name pointer pointed into itself or further into the message.
    #[error("encountered domain name pointer loop")]
    PointerLoop,
    /// A domain name followed more compression pointers than any valid name needs.
    #[error("too many domain name pointers")]
    TooManyPointers,
    /// A label length byte used one of the reserved `01` or `10` prefixes.
    #[error("reserved label type")]
    InvalidLabelType,
    /// A domain name exceeded 255 bytes in its uncompressed wire form.
    #[error("domain name too long")]
    NameTooLong,
    /// An empty label was encountered where it is not allowed.
    #[error("invalid empty label")]
    InvalidEmptyLabel,
    /// A label exceeded the maximum allowable length of a label.
    #[error("label too long")]
    LabelTooLong,
    /// A section or RDATA field is too large for its 16-bit length or count field.
    #[error("field exceeds 16-bit length")]
    TooLong,
}

impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        match e {
            Error::Eof => io::ErrorKind::UnexpectedEof.into(),
            Error::PointerLoop | Error::TooManyPointers => io::Error::new(
                io::ErrorKind::InvalidData,
                "a domain name pointer loop was encountered; this may indicate a malicious packet",
            ),
            Error::InvalidLabelType | Error::NameTooLong => {
                io::Error::new(io::ErrorKind::InvalidData, e)
            }
            Error::InvalidEmptyLabel | Error::LabelTooLong | Error::TooLong => {
                io::Error::new(io::ErrorKind::InvalidInput, e)
            }
        }
    }
}
