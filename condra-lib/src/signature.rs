use std::time::Instant;

use tracing::{debug, info};

use crate::error::Result;
use crate::memory::pattern::Pattern;
use crate::memory::pointer::{resolve, OffsetChain};
use crate::memory::{Endianness, ReadMemory};
use crate::module::{primary_module, snapshot_module, ModuleInfo};
use crate::process::ProcessHandle;

/// A byte pattern plus the pointer chain that leads from its match to the
/// data structure of interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub pattern: Pattern,
    pub offsets: OffsetChain,
}

impl Signature {
    pub fn new(pattern: Pattern, offsets: OffsetChain) -> Self {
        Self { pattern, offsets }
    }

    /// Parses a textual pattern (`"8b 0d ? ? ? ?"`) and comma-separated
    /// offsets (`"2, 0"`).
    pub fn parse(pattern: &str, offsets: &str) -> Result<Self> {
        Ok(Self::new(
            pattern.parse::<Pattern>()?,
            offsets.parse::<OffsetChain>()?,
        ))
    }
}

/// Snapshots `module`, scans it for the signature and walks the chain.
///
/// The snapshot is dropped as soon as the scan is done; the chain is
/// resolved against live memory.
pub fn find_pointer_in<R: ReadMemory + ?Sized>(
    reader: &R,
    module: &ModuleInfo,
    signature: &Signature,
    endianness: Endianness,
) -> Result<usize> {
    let started = Instant::now();

    let match_offset = {
        let snapshot = snapshot_module(reader, module)?;
        snapshot.scan(&signature.pattern)?
    };
    debug!(
        "pattern found at {}+{:#x} in {:?}",
        module.name,
        match_offset,
        started.elapsed()
    );

    let pointer = resolve(
        reader,
        module.base_address,
        match_offset,
        &signature.offsets,
        endianness,
    )?;
    info!("pointer found: {:#x}", pointer);

    Ok(pointer)
}

/// [`find_pointer_in`] over the primary module of `handle`.
pub fn find_pointer(
    handle: &ProcessHandle,
    signature: &Signature,
    endianness: Endianness,
) -> Result<usize> {
    let module = primary_module(handle)?;
    find_pointer_in(handle, &module, signature, endianness)
}
