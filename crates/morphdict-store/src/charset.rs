// Byte encodings for string table keys.
//
// A table stores its keys in whichever encoding is most compact for its
// contents: UTF-8 for mostly-Latin text, UTF-16LE for scripts where UTF-8
// needs three bytes per character.

use crate::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Charset {
    Utf8 = 1,
    Utf16Le = 2,
}

impl Charset {
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(Self::Utf8),
            2 => Ok(Self::Utf16Le),
            _ => Err(StoreError::illegal_state(format!(
                "unknown string table charset {tag}"
            ))),
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
        }
    }

    pub fn encoded_len(self, s: &str) -> usize {
        match self {
            Self::Utf8 => s.len(),
            Self::Utf16Le => s.encode_utf16().count() * 2,
        }
    }

    pub fn encode_into(self, s: &str, out: &mut Vec<u8>) {
        match self {
            Self::Utf8 => out.extend_from_slice(s.as_bytes()),
            Self::Utf16Le => {
                for unit in s.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
            }
        }
    }

    pub fn encode(self, s: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len(s));
        self.encode_into(s, &mut out);
        out
    }

    /// Decode key bytes. Returns `None` for malformed input.
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
            Self::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return None;
                }
                let units = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
                char::decode_utf16(units).collect::<std::result::Result<String, _>>().ok()
            }
        }
    }

    /// The encoding with the smallest total size for `strings`. Ties go to
    /// UTF-8.
    pub fn most_compact<'s>(strings: impl IntoIterator<Item = &'s str>) -> Self {
        let (utf8, utf16) = strings.into_iter().fold((0usize, 0usize), |(a, b), s| {
            (a + Self::Utf8.encoded_len(s), b + Self::Utf16Le.encoded_len(s))
        });
        if utf16 < utf8 { Self::Utf16Le } else { Self::Utf8 }
    }
}
