//! Domain names and labels.

use std::{
    fmt::{self, Write},
    slice,
    str::FromStr,
};

use super::Error;

/// A `.`-separated component of a [`DomainName`].
///
/// Labels are binary-safe and hold between 1 and [`Label::MAX_LEN`] bytes. The empty label only
/// exists on the wire, as the terminator of a name, and is never stored.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    // 1..=MAX_LEN bytes.
    bytes: Box<[u8]>,
}

impl Label {
    /// The maximum length of a domain label.
    pub const MAX_LEN: usize = 0b0011_1111;

    /// Creates a [`Label`] from raw bytes or a string slice.
    ///
    /// # Panics
    ///
    /// Panics if `label` is empty or longer than [`Self::MAX_LEN`]. Use [`Label::try_new`] for
    /// input that has not been validated yet.
    pub fn new(label: impl AsRef<[u8]>) -> Self {
        let label = label.as_ref();
        Self::try_new(label)
            .unwrap_or_else(|_| panic!("`Label::new` called with invalid data: {:?}", label))
    }

    /// Creates a [`Label`] from raw bytes or a string slice, returning an error if the bytes do not
    /// form a valid label.
    pub fn try_new(label: impl AsRef<[u8]>) -> Result<Self, Error> {
        let label = label.as_ref();
        if label.is_empty() {
            return Err(Error::InvalidEmptyLabel);
        }
        if label.len() > Self::MAX_LEN {
            return Err(Error::LabelTooLong);
        }

        Ok(Self {
            bytes: label.into(),
        })
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bytes this label occupies on the wire, including its length byte.
    #[inline]
    fn wire_len(&self) -> usize {
        1 + self.bytes.len()
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#""{}""#, self.as_bytes().escape_ascii())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_bytes().escape_ascii(), f)
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_new(s)
    }
}

/// A domain name, represented as a list of [`Label`]s.
///
/// The root label that terminates every name on the wire is implicit. A [`DomainName`] never
/// exceeds [`DomainName::MAX_WIRE_LEN`] bytes in uncompressed wire form; every way of building
/// one enforces that bound.
#[derive(PartialEq, Eq, Clone, Hash)]
pub struct DomainName {
    labels: Vec<Label>,
}

impl DomainName {
    /// The root domain `.`.
    pub const ROOT: Self = Self { labels: Vec::new() };

    /// Maximum length of an uncompressed name on the wire, including the terminating zero byte.
    pub const MAX_WIRE_LEN: usize = 255;

    /// Parses a domain name as a string of `.`-separated labels.
    ///
    /// A trailing `.` is allowed but not required.
    pub fn from_str(s: &str) -> Result<Self, Error> {
        s.parse()
    }

    /// Builds a name from a sequence of raw labels.
    pub fn from_labels<I, L>(labels: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        let mut name = Self::ROOT;
        for label in labels {
            name.push_label(Label::try_new(label)?)?;
        }
        Ok(name)
    }

    /// Returns the labels making up this domain name, without the root label.
    #[inline]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, Label> {
        self.labels.iter()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Appends a [`Label`] to the end of this domain name.
    ///
    /// Fails with [`Error::NameTooLong`] if the result would not fit in
    /// [`DomainName::MAX_WIRE_LEN`] bytes; the name is left unchanged in that case.
    pub fn push_label(&mut self, label: Label) -> Result<(), Error> {
        if self.wire_len() + label.wire_len() > Self::MAX_WIRE_LEN {
            return Err(Error::NameTooLong);
        }
        self.labels.push(label);
        Ok(())
    }

    /// Length of this name in uncompressed wire form, including the root label.
    pub fn wire_len(&self) -> usize {
        self.labels.iter().map(Label::wire_len).sum::<usize>() + 1
    }
}

impl<'a> IntoIterator for &'a DomainName {
    type Item = &'a Label;
    type IntoIter = slice::Iter<'a, Label>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.labels.iter()
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return f.write_char('.');
        }
        for label in &self.labels {
            fmt::Display::fmt(label, f)?;
            f.write_char('.')?;
        }
        Ok(())
    }
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for DomainName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "." {
            // `split_terminator` would yield one empty label here
            return Ok(Self::ROOT);
        }

        Self::from_labels(s.split_terminator('.'))
    }
}
