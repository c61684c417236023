use thiserror::Error;

use crate::memory::pattern::PatternScanError;
use crate::memory::pointer::{ParseOffsetError, ResolveError};
use crate::memory::read::{ReadMemoryError, UnsupportedType};
use crate::module::ModuleError;
use crate::process::ProcessError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Pattern(#[from] PatternScanError),
    #[error(transparent)]
    Offset(#[from] ParseOffsetError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Read(#[from] ReadMemoryError),
    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedType),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Failures that come from the target's current memory state and may
    /// succeed on a later attempt while the process is still running.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Module(_)
                | Error::Resolve(ResolveError::Read { .. })
                | Error::Read(ReadMemoryError::Failed { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_transient() {
        let read = ReadMemoryError::Failed {
            address: 0x1000,
            size: 4,
            message: "partial copy".to_string(),
        };
        assert!(Error::from(read).is_transient());

        let overflow = ResolveError::AddressOverflow {
            step: 1,
            address: 0,
            offset: -4,
        };
        assert!(!Error::from(overflow).is_transient());

        assert!(!Error::from(ProcessError::NotFound("DARKSOULS.exe".to_string())).is_transient());
        assert!(!Error::from(PatternScanError::Empty).is_transient());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = Error::from(ResolveError::Read {
            step: 1,
            offset: 0x68,
            source: ReadMemoryError::Failed {
                address: 0x0A00_0068,
                size: 4,
                message: "unmapped".to_string(),
            },
        });

        let message = err.to_string();
        assert!(message.contains("step 1"));
        assert!(message.contains("0xa000068"));
    }
}
