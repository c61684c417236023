//! In-memory stand-in for a remote address space.

use std::cell::Cell;

use super::read::ReadMemoryError;
use super::ReadMemory;

pub(crate) struct MockMemory {
    regions: Vec<(usize, Vec<u8>)>,
    alive: Cell<bool>,
    reads: Cell<usize>,
}

impl MockMemory {
    pub(crate) fn new() -> Self {
        Self {
            regions: Vec::new(),
            alive: Cell::new(true),
            reads: Cell::new(0),
        }
    }

    pub(crate) fn with_bytes(mut self, address: usize, bytes: &[u8]) -> Self {
        self.regions.push((address, bytes.to_vec()));
        self
    }

    pub(crate) fn with_u32(self, address: usize, value: u32) -> Self {
        self.with_bytes(address, &value.to_le_bytes())
    }

    /// Simulates the target process exiting.
    pub(crate) fn terminate(&self) {
        self.alive.set(false);
    }

    pub(crate) fn read_count(&self) -> usize {
        self.reads.get()
    }
}

impl ReadMemory for MockMemory {
    fn read_into(&self, address: usize, buffer: &mut [u8]) -> Result<(), ReadMemoryError> {
        self.reads.set(self.reads.get() + 1);

        let size = buffer.len();
        let fail = |message: &str| ReadMemoryError::Failed {
            address,
            size,
            message: message.to_string(),
        };

        if !self.alive.get() {
            return Err(fail("process has exited"));
        }

        let region = self.regions.iter().find(|(base, bytes)| {
            address >= *base && address + size <= base + bytes.len()
        });

        match region {
            Some((base, bytes)) => {
                let start = address - base;
                buffer.copy_from_slice(&bytes[start..start + size]);
                Ok(())
            }
            None => Err(fail("address is not mapped")),
        }
    }
}
