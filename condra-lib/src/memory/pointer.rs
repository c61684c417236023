use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use super::read::{read_ptr, ReadMemoryError};
use super::{offset_address, Endianness, ReadMemory};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("signature match at {module_base:#x} + {match_offset:#x} is out of range")]
    BaseOverflow {
        module_base: usize,
        match_offset: usize,
    },
    #[error("pointer chain step {step} (offset {offset}) failed: {source}")]
    Read {
        step: usize,
        offset: i64,
        #[source]
        source: ReadMemoryError,
    },
    #[error("pointer chain step {step}: address {address:#x} with offset {offset} is out of range")]
    AddressOverflow {
        step: usize,
        address: usize,
        offset: i64,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid offset {0:?}")]
pub struct ParseOffsetError(pub String);

/// Parses a signed offset, either decimal or `0x`-prefixed hex (`-0x33`).
pub fn parse_offset(s: &str) -> Result<i64, ParseOffsetError> {
    let invalid = || ParseOffsetError(s.to_string());

    let trimmed = s.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let (digits, radix) = match unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (unsigned, 10),
    };

    // from_str_radix takes its own sign, which would let "--5" or "0x-5" through
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let magnitude = i64::from_str_radix(digits, radix).map_err(|_| invalid())?;

    Ok(if negative { -magnitude } else { magnitude })
}

/// Ordered pointer offsets.
///
/// Every offset is one dereference: it is added to the current address and
/// the 4-byte pointer stored there becomes the next address. The value read
/// by the last step is the resolved address and is not dereferenced again,
/// so the data offset of the final field is applied separately by the reader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetChain(Vec<i64>);

impl OffsetChain {
    pub fn new(offsets: Vec<i64>) -> Self {
        Self(offsets)
    }

    pub fn offsets(&self) -> &[i64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<i64>> for OffsetChain {
    fn from(offsets: Vec<i64>) -> Self {
        Self(offsets)
    }
}

impl FromIterator<i64> for OffsetChain {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FromStr for OffsetChain {
    type Err = ParseOffsetError;

    /// Comma-separated offsets, e.g. `"2, 0"` or `"0x10,-0x8"`. An empty
    /// string is an empty chain.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }

        s.split(',').map(parse_offset).collect()
    }
}

/// Walks `chain` starting at `module_base + match_offset`.
///
/// Each step reads live from the target rather than from a module snapshot,
/// since everything past the first dereference lives in heap memory. A
/// failed step aborts the whole walk.
pub fn resolve<R: ReadMemory + ?Sized>(
    reader: &R,
    module_base: usize,
    match_offset: usize,
    chain: &OffsetChain,
    endianness: Endianness,
) -> Result<usize, ResolveError> {
    let mut current = module_base
        .checked_add(match_offset)
        .ok_or(ResolveError::BaseOverflow {
            module_base,
            match_offset,
        })?;

    for (step, &offset) in chain.offsets().iter().enumerate() {
        let address = offset_address(current, offset).ok_or(ResolveError::AddressOverflow {
            step,
            address: current,
            offset,
        })?;

        let pointer = read_ptr(reader, address, endianness).map_err(|source| ResolveError::Read {
            step,
            offset,
            source,
        })?;

        debug!("step {}: [{:#x}] -> {:#x}", step, address, pointer);
        current = pointer;
    }

    Ok(current)
}
