//! Read-only introspection of another process's memory: find a process by
//! name, snapshot its main module, locate a byte signature and follow a
//! pointer chain to a live value.

#[cfg(not(any(windows, target_os = "linux")))]
compile_error!("condra-lib supports Windows and Linux only");

pub mod error;
pub mod memory;
pub mod module;
pub mod process;
pub mod signature;

pub use error::{Error, Result};
pub use memory::pattern::{scan, Pattern, PatternByte};
pub use memory::pointer::{resolve, OffsetChain};
pub use memory::read::{read_typed, read_value, Primitive, Value, ValueKind};
pub use memory::{Endianness, ReadMemory};
pub use module::{snapshot_primary_module, ModuleInfo, ModuleSnapshot};
pub use process::{locate, Liveness, ProcessHandle};
pub use signature::{find_pointer, find_pointer_in, Signature};
