use std::str::FromStr;

use self::read::ReadMemoryError;

#[cfg(test)]
pub(crate) mod mock;
pub mod pattern;
pub mod pointer;
pub mod read;

/// Byte order of the target process. Never inferred from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl FromStr for Endianness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "little" | "le" => Ok(Self::Little),
            "big" | "be" => Ok(Self::Big),
            _ => Err(format!("unknown byte order {s:?}, expected \"little\" or \"big\"")),
        }
    }
}

/// Read access to another process's address space.
pub trait ReadMemory {
    /// Fills `buffer` with the bytes at `address`.
    ///
    /// A short read is an error; implementations never hand back a partially
    /// filled buffer.
    fn read_into(&self, address: usize, buffer: &mut [u8]) -> Result<(), ReadMemoryError>;

    fn read_bytes(&self, address: usize, size: usize) -> Result<Vec<u8>, ReadMemoryError> {
        let mut data = vec![0; size];

        self.read_into(address, &mut data)?;

        Ok(data)
    }
}

impl<T: ReadMemory + ?Sized> ReadMemory for &T {
    fn read_into(&self, address: usize, buffer: &mut [u8]) -> Result<(), ReadMemoryError> {
        (**self).read_into(address, buffer)
    }
}

/// Applies a signed byte offset to an address, `None` on overflow.
pub fn offset_address(address: usize, offset: i64) -> Option<usize> {
    isize::try_from(offset)
        .ok()
        .and_then(|offset| address.checked_add_signed(offset))
}
