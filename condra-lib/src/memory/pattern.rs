use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternByte {
    Byte(u8),
    Any,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("{0:?} is not a hex byte or `?`")]
pub struct ParsePatternByteError(pub String);

impl FromStr for PatternByte {
    type Err = ParsePatternByteError;

    /// One or two hex digits, or a `?`/`??` wildcard. Signs and prefixes
    /// are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "?" | "??" => Ok(Self::Any),
            _ if (1..=2).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_hexdigit()) => {
                u8::from_str_radix(s, 16)
                    .map(Self::Byte)
                    .map_err(|_| ParsePatternByteError(s.to_string()))
            }
            _ => Err(ParsePatternByteError(s.to_string())),
        }
    }
}

impl PartialEq<u8> for PatternByte {
    fn eq(&self, other: &u8) -> bool {
        match self {
            Self::Byte(byte) => byte == other,
            Self::Any => true,
        }
    }
}

impl fmt::Display for PatternByte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte(byte) => write!(f, "{byte:02X}"),
            Self::Any => f.write_str("??"),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PatternScanError {
    #[error("pattern {0} not found")]
    NotFound(String),
    #[error("invalid pattern: empty")]
    Empty,
    #[error("invalid pattern: token {token:?} at position {index} is not a hex byte or `?`")]
    InvalidToken { token: String, index: usize },
    #[error("invalid pattern: {0} is made of wildcards only")]
    OnlyWildcards(String),
}

/// A byte signature. Always holds at least one concrete byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    bytes: Vec<PatternByte>,
}

impl Pattern {
    pub fn new(bytes: Vec<PatternByte>) -> Result<Self, PatternScanError> {
        if bytes.is_empty() {
            return Err(PatternScanError::Empty);
        }

        let pattern = Self { bytes };
        if pattern.bytes.iter().all(|byte| *byte == PatternByte::Any) {
            return Err(PatternScanError::OnlyWildcards(pattern.to_string()));
        }

        Ok(pattern)
    }

    pub fn bytes(&self) -> &[PatternByte] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl FromStr for Pattern {
    type Err = PatternScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let aob = s
            .split_ascii_whitespace()
            .enumerate()
            .map(|(index, chunk)| {
                PatternByte::from_str(chunk).map_err(|_| PatternScanError::InvalidToken {
                    token: chunk.to_string(),
                    index,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(aob)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte}")?;
        }

        Ok(())
    }
}

impl PartialEq<[u8]> for Pattern {
    fn eq(&self, other: &[u8]) -> bool {
        self.len() == other.len()
            && Iterator::zip(self.bytes.iter(), other.iter()).all(|(a, b)| a == b)
    }
}

impl PartialEq<Vec<u8>> for Pattern {
    fn eq(&self, other: &Vec<u8>) -> bool {
        self == other.as_slice()
    }
}

/// Returns the offset of the first match of `pattern` in `buffer`.
///
/// Every start position is tried in order, so when a signature occurs more
/// than once the lowest offset wins. Keeping signatures unique is up to
/// whoever writes them.
pub fn scan(buffer: &[u8], pattern: &Pattern) -> Result<usize, PatternScanError> {
    let offset = buffer
        .windows(pattern.len())
        .position(|window| pattern == window)
        .ok_or_else(|| PatternScanError::NotFound(pattern.to_string()))?;

    debug!("pattern {} matched at offset {:#x}", pattern, offset);
    Ok(offset)
}
