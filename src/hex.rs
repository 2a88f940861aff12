use std::fmt;

/// Displays bytes as contiguous lowercase hex, for packet dumps in log output.
pub(crate) struct Hex<'a>(pub &'a [u8]);

impl<'a> fmt::Display for Hex<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Parses a hex fixture. Whitespace is ignored so fixtures can be laid out field by field.
#[cfg(test)]
pub(crate) fn parse(s: &str) -> Vec<u8> {
    let digits: Vec<u8> = s.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    assert!(digits.len() % 2 == 0, "odd number of hex digits");

    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).unwrap();
            u8::from_str_radix(pair, 16).unwrap()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(parse("00abff"), &[0x00, 0xab, 0xff]);
        assert_eq!(parse("12 34\n  c0 0c"), &[0x12, 0x34, 0xc0, 0x0c]);
    }

    #[test]
    fn display() {
        assert_eq!(Hex(&[0x01, 0xfe]).to_string(), "01fe");
    }
}
