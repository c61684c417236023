use thiserror::Error;
use tracing::debug;

use crate::memory::pattern::{scan, Pattern, PatternScanError};
use crate::memory::read::ReadMemoryError;
use crate::memory::ReadMemory;
use crate::process::ProcessHandle;

#[cfg(windows)]
mod platform {
    use winapi::shared::minwindef::DWORD;
    use winapi::um::{
        handleapi::{CloseHandle, INVALID_HANDLE_VALUE},
        tlhelp32::{
            CreateToolhelp32Snapshot, Module32FirstW, MODULEENTRY32W, TH32CS_SNAPMODULE,
            TH32CS_SNAPMODULE32,
        },
    };

    use super::{ModuleError, ModuleInfo};
    use crate::process::ProcessHandle;

    /// The first entry of a Toolhelp module snapshot is the executable.
    pub fn primary_module(handle: &ProcessHandle) -> Result<ModuleInfo, ModuleError> {
        let pid: usize = handle.pid().into();
        let enumeration_failed = || ModuleError::EnumerationFailed {
            pid,
            message: std::io::Error::last_os_error().to_string(),
        };

        let snapshot = unsafe {
            CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid as DWORD)
        };
        if snapshot == INVALID_HANDLE_VALUE {
            return Err(enumeration_failed());
        }

        let mut entry: MODULEENTRY32W = unsafe { std::mem::zeroed() };
        entry.dwSize = std::mem::size_of::<MODULEENTRY32W>() as DWORD;

        let result = unsafe { Module32FirstW(snapshot, &mut entry) };
        // capture the error before CloseHandle overwrites it
        let err = (result == 0).then(enumeration_failed);

        unsafe {
            CloseHandle(snapshot);
        }

        if let Some(err) = err {
            return Err(err);
        }

        let name_len = entry
            .szModule
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(entry.szModule.len());

        Ok(ModuleInfo {
            name: String::from_utf16_lossy(&entry.szModule[..name_len]),
            base_address: entry.modBaseAddr as usize,
            size: entry.modBaseSize as usize,
        })
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use std::path::Path;

    use super::{ModuleError, ModuleInfo};
    use crate::process::{retrieve_process_exe, ProcessHandle};

    /// The executable's image spans from its first to its last file mapping.
    pub fn primary_module(handle: &ProcessHandle) -> Result<ModuleInfo, ModuleError> {
        let pid: usize = handle.pid().into();
        let enumeration_failed = |message: String| ModuleError::EnumerationFailed { pid, message };

        let exe = retrieve_process_exe(handle.pid()).map_err(|e| enumeration_failed(e.to_string()))?;
        let maps = std::fs::read_to_string(format!("/proc/{pid}/maps"))
            .map_err(|e| enumeration_failed(e.to_string()))?;

        parse_primary_mapping(&maps, &exe)
            .ok_or_else(|| enumeration_failed(format!("no mapping of {}", exe.display())))
    }

    fn parse_primary_mapping(maps: &str, exe: &Path) -> Option<ModuleInfo> {
        let mut range: Option<(usize, usize)> = None;

        for line in maps.lines() {
            // start-end perms offset dev inode path; only the path has slashes
            let Some(path_start) = line.find('/') else {
                continue;
            };
            if Path::new(line[path_start..].trim_end()) != exe {
                continue;
            }

            let Some((start, end)) = line
                .split_ascii_whitespace()
                .next()
                .and_then(|addresses| addresses.split_once('-'))
            else {
                continue;
            };
            let (Ok(start), Ok(end)) = (
                usize::from_str_radix(start, 16),
                usize::from_str_radix(end, 16),
            ) else {
                continue;
            };

            range = Some(match range {
                Some((low, high)) => (low.min(start), high.max(end)),
                None => (start, end),
            });
        }

        let (base_address, end) = range?;

        Some(ModuleInfo {
            name: exe.file_name()?.to_string_lossy().into_owned(),
            base_address,
            size: end - base_address,
        })
    }

}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub base_address: usize,
    pub size: usize,
}

#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("failed to enumerate modules of process {pid}: {message}")]
    EnumerationFailed { pid: usize, message: String },
    #[error("failed to copy module {name} ({size:#x} bytes at {base_address:#x}): {source}")]
    ReadFailed {
        name: String,
        base_address: usize,
        size: usize,
        #[source]
        source: ReadMemoryError,
    },
}

/// A copy of a module image taken at one point in time.
///
/// The copy is never refreshed; it says nothing about the module's contents
/// after it was taken.
#[derive(Debug)]
pub struct ModuleSnapshot {
    base_address: usize,
    bytes: Vec<u8>,
}

impl ModuleSnapshot {
    pub fn base_address(&self) -> usize {
        self.base_address
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset of the first match of `pattern`, relative to the module base.
    pub fn scan(&self, pattern: &Pattern) -> Result<usize, PatternScanError> {
        scan(&self.bytes, pattern)
    }
}

pub fn primary_module(handle: &ProcessHandle) -> Result<ModuleInfo, ModuleError> {
    let module = platform::primary_module(handle)?;
    debug!(
        "primary module of {}: {} at {:#x} ({:#x} bytes)",
        handle.name(),
        module.name,
        module.base_address,
        module.size
    );

    Ok(module)
}

/// Copies the whole image of `module` in a single read.
///
/// Any read failure discards the snapshot; a scan over a partial image could
/// miss the signature silently.
pub fn snapshot_module<R: ReadMemory + ?Sized>(
    reader: &R,
    module: &ModuleInfo,
) -> Result<ModuleSnapshot, ModuleError> {
    let bytes = reader
        .read_bytes(module.base_address, module.size)
        .map_err(|source| ModuleError::ReadFailed {
            name: module.name.clone(),
            base_address: module.base_address,
            size: module.size,
            source,
        })?;

    Ok(ModuleSnapshot {
        base_address: module.base_address,
        bytes,
    })
}

pub fn snapshot_primary_module(handle: &ProcessHandle) -> Result<ModuleSnapshot, ModuleError> {
    let module = primary_module(handle)?;
    snapshot_module(handle, &module)
}
