use std::fmt;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use thiserror::Error;

use super::{offset_address, Endianness, ReadMemory};

#[cfg(windows)]
mod platform {
    use winapi::shared::{basetsd::SIZE_T, minwindef};
    use winapi::um::memoryapi;

    use super::ReadMemoryError;
    use crate::process::OsHandle;

    pub fn read_os_memory(
        handle: &OsHandle,
        address: usize,
        buffer: &mut [u8],
    ) -> Result<(), ReadMemoryError> {
        let mut bytes_read: SIZE_T = 0;

        let result = unsafe {
            memoryapi::ReadProcessMemory(
                handle.raw(),
                address as minwindef::LPCVOID,
                buffer.as_mut_ptr() as minwindef::LPVOID,
                buffer.len(),
                &mut bytes_read,
            )
        };

        if result == 0 {
            return Err(ReadMemoryError::Failed {
                address,
                size: buffer.len(),
                message: std::io::Error::last_os_error().to_string(),
            });
        }

        if bytes_read != buffer.len() {
            return Err(ReadMemoryError::Failed {
                address,
                size: buffer.len(),
                message: format!("short read of {bytes_read} bytes"),
            });
        }

        Ok(())
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use std::os::unix::fs::FileExt;

    use libc::{c_void, iovec, process_vm_readv};

    use super::ReadMemoryError;
    use crate::process::OsHandle;

    pub fn read_os_memory(
        handle: &OsHandle,
        address: usize,
        buffer: &mut [u8],
    ) -> Result<(), ReadMemoryError> {
        let size = buffer.len();
        let fail = |message: String| ReadMemoryError::Failed {
            address,
            size,
            message,
        };

        let local_iov = iovec {
            iov_base: buffer.as_mut_ptr() as *mut c_void,
            iov_len: size,
        };

        let remote_iov = iovec {
            iov_base: address as *mut c_void,
            iov_len: size,
        };

        let result = unsafe { process_vm_readv(handle.pid(), &local_iov, 1, &remote_iov, 1, 0) };
        if result == -1 {
            let err = std::io::Error::last_os_error();
            return match err.raw_os_error() {
                // process_vm_readv can be unavailable or blocked by ptrace
                // policy while the /proc mem file opened at attach time still works.
                Some(libc::ENOSYS) | Some(libc::EPERM) => handle
                    .mem()
                    .read_exact_at(buffer, address as u64)
                    .map_err(|e| fail(e.to_string())),
                _ => Err(fail(err.to_string())),
            };
        }

        if result as usize != size {
            return Err(fail(format!("short read of {result} bytes")));
        }

        Ok(())
    }
}

pub(crate) use platform::read_os_memory;

#[derive(Error, Debug)]
pub enum ReadMemoryError {
    #[error("failed to read {size} bytes at {address:#x}: {message}")]
    Failed {
        address: usize,
        size: usize,
        message: String,
    },
    #[error("address {address:#x} with offset {offset} is out of range")]
    AddressOverflow { address: usize, offset: i64 },
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unsupported value type {0:?}")]
pub struct UnsupportedType(pub String);

/// The closed set of value types the reader can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ValueKind {
    pub fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }
}

impl FromStr for ValueKind {
    type Err = UnsupportedType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.to_ascii_lowercase().as_str() {
            "u8" => Self::U8,
            "i8" => Self::I8,
            "u16" => Self::U16,
            "i16" => Self::I16,
            "u32" => Self::U32,
            "i32" => Self::I32,
            "u64" => Self::U64,
            "i64" => Self::I64,
            "f32" => Self::F32,
            "f64" => Self::F64,
            _ => return Err(UnsupportedType(s.to_string())),
        };

        Ok(kind)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::U8(_) => ValueKind::U8,
            Self::I8(_) => ValueKind::I8,
            Self::U16(_) => ValueKind::U16,
            Self::I16(_) => ValueKind::I16,
            Self::U32(_) => ValueKind::U32,
            Self::I32(_) => ValueKind::I32,
            Self::U64(_) => ValueKind::U64,
            Self::I64(_) => ValueKind::I64,
            Self::F32(_) => ValueKind::F32,
            Self::F64(_) => ValueKind::F64,
        }
    }

    /// Integer values widened to `i64`; `None` for floats and for `u64`
    /// values that don't fit.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::U8(v) => Some(v.into()),
            Self::I8(v) => Some(v.into()),
            Self::U16(v) => Some(v.into()),
            Self::I16(v) => Some(v.into()),
            Self::U32(v) => Some(v.into()),
            Self::I32(v) => Some(v.into()),
            Self::U64(v) => i64::try_from(v).ok(),
            Self::I64(v) => Some(v),
            Self::F32(_) | Self::F64(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
        }
    }
}

/// A fixed-size value that can be decoded from target memory.
pub trait Primitive: Sized + Copy {
    const KIND: ValueKind;

    /// `bytes` holds exactly `Self::KIND.size()` bytes.
    fn decode<E: ByteOrder>(bytes: &[u8]) -> Self;

    fn into_value(self) -> Value;
}

macro_rules! impl_primitive {
    (single $type:ident, $kind:ident) => {
        impl Primitive for $type {
            const KIND: ValueKind = ValueKind::$kind;

            fn decode<E: ByteOrder>(bytes: &[u8]) -> Self {
                bytes[0] as $type
            }

            fn into_value(self) -> Value {
                Value::$kind(self)
            }
        }
    };
    ($type:ident, $kind:ident) => {
        paste::paste! {
            impl Primitive for $type {
                const KIND: ValueKind = ValueKind::$kind;

                fn decode<E: ByteOrder>(bytes: &[u8]) -> Self {
                    E::[<read_ $type>](bytes)
                }

                fn into_value(self) -> Value {
                    Value::$kind(self)
                }
            }
        }
    };
}

impl_primitive!(single u8, U8);
impl_primitive!(single i8, I8);
impl_primitive!(u16, U16);
impl_primitive!(i16, I16);
impl_primitive!(u32, U32);
impl_primitive!(i32, I32);
impl_primitive!(u64, U64);
impl_primitive!(i64, I64);
impl_primitive!(f32, F32);
impl_primitive!(f64, F64);

/// Reads a `T` at `address + data_offset` in the target's byte order.
///
/// Nothing is cached: once the target is gone every call fails with
/// [`ReadMemoryError::Failed`].
pub fn read_typed<T: Primitive, R: ReadMemory + ?Sized>(
    reader: &R,
    address: usize,
    data_offset: i64,
    endianness: Endianness,
) -> Result<T, ReadMemoryError> {
    let target = offset_address(address, data_offset).ok_or(ReadMemoryError::AddressOverflow {
        address,
        offset: data_offset,
    })?;

    let memory = reader.read_bytes(target, T::KIND.size())?;

    Ok(match endianness {
        Endianness::Little => T::decode::<LittleEndian>(&memory),
        Endianness::Big => T::decode::<BigEndian>(&memory),
    })
}

/// Runtime-selected counterpart of [`read_typed`].
pub fn read_value<R: ReadMemory + ?Sized>(
    reader: &R,
    address: usize,
    data_offset: i64,
    kind: ValueKind,
    endianness: Endianness,
) -> Result<Value, ReadMemoryError> {
    macro_rules! read_kind {
        ($type:ty) => {
            read_typed::<$type, R>(reader, address, data_offset, endianness).map(Primitive::into_value)
        };
    }

    match kind {
        ValueKind::U8 => read_kind!(u8),
        ValueKind::I8 => read_kind!(i8),
        ValueKind::U16 => read_kind!(u16),
        ValueKind::I16 => read_kind!(i16),
        ValueKind::U32 => read_kind!(u32),
        ValueKind::I32 => read_kind!(i32),
        ValueKind::U64 => read_kind!(u64),
        ValueKind::I64 => read_kind!(i64),
        ValueKind::F32 => read_kind!(f32),
        ValueKind::F64 => read_kind!(f64),
    }
}

/// Reads a 4-byte unsigned pointer.
pub fn read_ptr<R: ReadMemory + ?Sized>(
    reader: &R,
    address: usize,
    endianness: Endianness,
) -> Result<usize, ReadMemoryError> {
    let ptr = read_typed::<u32, R>(reader, address, 0, endianness)?;
    Ok(ptr as usize)
}
