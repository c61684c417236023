use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use sysinfo::{Pid, Process, ProcessExt, System, SystemExt};
use thiserror::Error;
use tracing::debug;

use crate::memory::read::{read_os_memory, ReadMemoryError};
use crate::memory::ReadMemory;

#[cfg(windows)]
mod platform {
    use sysinfo::Pid;
    use winapi::shared::minwindef::{DWORD, FALSE};
    use winapi::um::{
        handleapi::CloseHandle,
        processthreadsapi::OpenProcess,
        winnt::{HANDLE, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ},
    };

    use super::ProcessError;

    pub struct OsHandle(HANDLE);

    // process handles are usable from any thread
    unsafe impl Send for OsHandle {}
    unsafe impl Sync for OsHandle {}

    impl OsHandle {
        pub fn open(pid: Pid) -> Result<Self, ProcessError> {
            let pid: usize = pid.into();

            let raw = unsafe {
                OpenProcess(
                    PROCESS_VM_READ | PROCESS_QUERY_INFORMATION,
                    FALSE,
                    pid as DWORD,
                )
            };
            if raw.is_null() {
                return Err(ProcessError::AccessDenied {
                    pid,
                    message: std::io::Error::last_os_error().to_string(),
                });
            }

            Ok(Self(raw))
        }

        pub fn raw(&self) -> HANDLE {
            self.0
        }
    }

    impl Drop for OsHandle {
        fn drop(&mut self) {
            unsafe {
                CloseHandle(self.0);
            }
        }
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use std::fs::File;
    use std::io::ErrorKind;

    use libc::pid_t;
    use sysinfo::Pid;

    use super::ProcessError;

    pub struct OsHandle {
        pid: pid_t,
        mem: File,
    }

    impl OsHandle {
        /// Opening `/proc/<pid>/mem` needs the same ptrace access as
        /// `process_vm_readv`, so it doubles as the permission check.
        pub fn open(pid: Pid) -> Result<Self, ProcessError> {
            let pid: usize = pid.into();

            let mem = File::open(format!("/proc/{pid}/mem")).map_err(|e| match e.kind() {
                ErrorKind::NotFound => ProcessError::NotFound(pid.to_string()),
                _ => ProcessError::AccessDenied {
                    pid,
                    message: e.to_string(),
                },
            })?;

            Ok(Self {
                pid: pid as pid_t,
                mem,
            })
        }

        pub fn pid(&self) -> pid_t {
            self.pid
        }

        pub fn mem(&self) -> &File {
            &self.mem
        }
    }
}

pub(crate) use platform::OsHandle;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("process not found with criteria {0}")]
    NotFound(String),
    #[error("access denied to process {pid}: {message}")]
    AccessDenied { pid: usize, message: String },
}

/// A read-only handle on one process instance, closed on drop.
///
/// Once the process exits every read through the handle fails.
pub struct ProcessHandle {
    pid: Pid,
    name: String,
    os: OsHandle,
}

impl ProcessHandle {
    pub fn open(pid: Pid, name: &str) -> Result<Self, ProcessError> {
        let os = OsHandle::open(pid)?;

        Ok(Self {
            pid,
            name: name.to_string(),
            os,
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Tells whether the process behind a reader still exists, so a failed
/// read can be told apart from a process that has gone away.
pub trait Liveness {
    fn is_running(&self) -> bool;
}

impl Liveness for ProcessHandle {
    fn is_running(&self) -> bool {
        is_running(self.pid)
    }
}

impl ReadMemory for ProcessHandle {
    fn read_into(&self, address: usize, buffer: &mut [u8]) -> Result<(), ReadMemoryError> {
        if buffer.is_empty() {
            return Ok(());
        }

        read_os_memory(&self.os, address, buffer)
    }
}

fn is_named(process: &Process, name: &str) -> bool {
    matches_name(process.exe(), process.name(), name)
}

/// The executable's file name decides. The process name is only consulted
/// when the executable path is unknown, since on Linux it is a truncated
/// comm string the process can rewrite.
fn matches_name(exe: &Path, process_name: &str, name: &str) -> bool {
    if exe.as_os_str().is_empty() {
        return process_name == name;
    }

    exe.file_name() == Some(OsStr::new(name))
}

/// Returns the pid of the process whose executable is exactly `name`.
///
/// When several instances are running the lowest pid wins.
pub fn find_process_id(name: &str) -> Result<Pid, ProcessError> {
    let mut sys = System::new();
    sys.refresh_processes();

    sys.processes()
        .values()
        .filter(|process| is_named(process, name))
        .map(|process| process.pid())
        .min_by_key(|pid| Into::<usize>::into(*pid))
        .ok_or_else(|| ProcessError::NotFound(name.to_string()))
}

pub fn retrieve_process_exe(pid: Pid) -> Result<PathBuf, ProcessError> {
    let mut sys = System::new();
    if !sys.refresh_process(pid) {
        return Err(ProcessError::NotFound(pid.to_string()));
    }

    let process = sys
        .process(pid)
        .ok_or_else(|| ProcessError::NotFound(pid.to_string()))?;

    Ok(process.exe().to_owned())
}

pub fn is_running(pid: Pid) -> bool {
    let mut sys = System::new();
    sys.refresh_process(pid)
}

/// Finds `name` among the running processes and opens it for reading.
///
/// No retries: waiting for the process to start is up to the caller.
pub fn locate(name: &str) -> Result<ProcessHandle, ProcessError> {
    let pid = find_process_id(name)?;
    debug!("found {} with pid {}", name, pid);

    ProcessHandle::open(pid, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_missing_process() {
        let err = locate("condra-test-no-such-process.exe").err();
        assert!(matches!(err, Some(ProcessError::NotFound(name)) if name == "condra-test-no-such-process.exe"));
    }

    #[test]
    fn test_matches_name_prefers_executable() {
        let exe = Path::new("/opt/game/DARKSOULS.exe");

        assert!(matches_name(exe, "DARKSOULS.exe", "DARKSOULS.exe"));
        assert!(matches_name(exe, "renamed", "DARKSOULS.exe"));
        assert!(!matches_name(exe, "DARKSOULS.exe", "DARKSOULS"));
        assert!(!matches_name(Path::new("/usr/bin/impostor"), "DARKSOULS.exe", "DARKSOULS.exe"));
    }

    #[test]
    fn test_matches_name_without_executable() {
        assert!(matches_name(Path::new(""), "DARKSOULS.exe", "DARKSOULS.exe"));
        assert!(!matches_name(Path::new(""), "DARKSOULS.ex", "DARKSOULS.exe"));
    }

    #[test]
    fn test_find_own_process_by_executable_name() {
        let exe = std::env::current_exe().unwrap();
        let name = exe.file_name().unwrap().to_str().unwrap();

        let pid = find_process_id(name).unwrap();
        assert!(Into::<usize>::into(pid) <= std::process::id() as usize);
    }

    #[test]
    fn test_current_process_is_running() {
        let pid = Pid::from(std::process::id() as usize);
        assert!(is_running(pid));

        let handle = ProcessHandle::open(pid, "self").unwrap();
        assert!(Liveness::is_running(&handle));
    }

    #[test]
    fn test_retrieve_own_exe() {
        let pid = Pid::from(std::process::id() as usize);
        let exe = retrieve_process_exe(pid).unwrap();
        assert_eq!(exe.file_name(), std::env::current_exe().unwrap().file_name());
    }
}
