use anyhow::bail;
use condra_lib::memory::pattern::PatternScanError;
use condra_lib::process::ProcessError;
use condra_lib::{find_pointer, locate, read_value, Error, Liveness, ProcessHandle, ReadMemory};
use tracing::{info, warn};

use crate::config::TargetConfig;
use crate::context::Context;
use crate::igt::format_reading;
use crate::shutdown::ShutdownSignal;

pub mod config;
pub mod context;
pub mod igt;
pub mod logging;
pub mod shutdown;

#[derive(Debug, PartialEq, Eq)]
pub enum Discovery {
    Found(usize),
    ProcessExited,
    Shutdown,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Shutdown,
    ProcessExited,
    Finished,
}

/// Blocks until the target process is running and readable.
///
/// Returns `Ok(None)` if shutdown was signalled while waiting.
pub fn wait_for_process(
    config: &TargetConfig,
    shutdown: &ShutdownSignal,
) -> anyhow::Result<Option<ProcessHandle>> {
    info!("waiting for {} to start... (press ctrl+c to exit)", config.process);

    loop {
        match locate(&config.process) {
            Ok(handle) => {
                info!("found {} (pid {})", config.process, handle.pid());
                return Ok(Some(handle));
            }
            Err(ProcessError::NotFound(_)) => {}
            Err(e @ ProcessError::AccessDenied { .. }) => {
                bail!("{e} (try running with elevated privileges)");
            }
        }

        if shutdown.wait(config.retry_delay) {
            return Ok(None);
        }
    }
}

/// Calls `find` until the pointer resolves, the process exits, or shutdown
/// is signalled. A missing signature is retried like any transient failure
/// since the game may not have unpacked its code yet.
pub fn discover_pointer<T, F>(
    target: &T,
    config: &TargetConfig,
    shutdown: &ShutdownSignal,
    mut find: F,
) -> anyhow::Result<Discovery>
where
    T: Liveness + ?Sized,
    F: FnMut(&T) -> condra_lib::Result<usize>,
{
    loop {
        match find(target) {
            Ok(pointer) => return Ok(Discovery::Found(pointer)),
            Err(e) if e.is_transient() || matches!(e, Error::Pattern(PatternScanError::NotFound(_))) => {
                if !target.is_running() {
                    return Ok(Discovery::ProcessExited);
                }
                warn!("failed to find pointer: {}, retrying...", e);
            }
            Err(e) => return Err(e.into()),
        }

        if shutdown.wait(config.retry_delay) {
            return Ok(Discovery::Shutdown);
        }
    }
}

/// Attaches to the target and resolves the pointer, re-attaching if the
/// process exits halfway through.
pub fn ensure_target(
    config: &TargetConfig,
    shutdown: &ShutdownSignal,
) -> anyhow::Result<Option<Context>> {
    loop {
        let Some(handle) = wait_for_process(config, shutdown)? else {
            return Ok(None);
        };

        let discovery = discover_pointer(&handle, config, shutdown, |handle| {
            find_pointer(handle, &config.signature, config.endianness)
        })?;

        match discovery {
            Discovery::Found(pointer) => return Ok(Some(Context::new(handle, pointer))),
            Discovery::ProcessExited => {
                info!("{} exited before its pointer was found", config.process);
            }
            Discovery::Shutdown => return Ok(None),
        }
    }
}

/// Reads the value every `config.interval` and prints it.
///
/// Read failures are logged and retried while the process is alive.
pub fn poll<T>(context: &Context<T>, config: &TargetConfig, shutdown: &ShutdownSignal) -> PollOutcome
where
    T: ReadMemory + Liveness,
{
    loop {
        match read_value(
            &context.handle,
            context.pointer,
            config.data_offset,
            config.kind,
            config.endianness,
        ) {
            Ok(value) => {
                println!("{}", format_reading(value));

                if config.once {
                    return PollOutcome::Finished;
                }
            }
            Err(e) => {
                if !context.handle.is_running() {
                    return PollOutcome::ProcessExited;
                }
                warn!("read failed: {}", e);
            }
        }

        if shutdown.wait(config.interval) {
            return PollOutcome::Shutdown;
        }
    }
}

pub fn run(config: &TargetConfig, shutdown: &ShutdownSignal) -> anyhow::Result<()> {
    while let Some(context) = ensure_target(config, shutdown)? {
        match poll(&context, config, shutdown) {
            PollOutcome::ProcessExited => info!("{} exited, waiting for it to restart", config.process),
            PollOutcome::Shutdown | PollOutcome::Finished => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;

    use condra_lib::memory::read::ReadMemoryError;

    use super::*;
    use crate::config::Args;

    /// Serves a fixed little-endian u32 after a number of failed reads.
    struct ScriptedTarget {
        value: u32,
        failures_left: Cell<usize>,
        alive: bool,
        reads: Cell<usize>,
    }

    impl ScriptedTarget {
        fn new(value: u32, failures: usize, alive: bool) -> Self {
            Self {
                value,
                failures_left: Cell::new(failures),
                alive,
                reads: Cell::new(0),
            }
        }
    }

    impl ReadMemory for ScriptedTarget {
        fn read_into(&self, address: usize, buffer: &mut [u8]) -> Result<(), ReadMemoryError> {
            self.reads.set(self.reads.get() + 1);

            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err(ReadMemoryError::Failed {
                    address,
                    size: buffer.len(),
                    message: "partial copy".to_string(),
                });
            }

            let bytes = self.value.to_le_bytes();
            buffer.copy_from_slice(&bytes[..buffer.len()]);
            Ok(())
        }
    }

    impl Liveness for ScriptedTarget {
        fn is_running(&self) -> bool {
            self.alive
        }
    }

    fn fast_config(once: bool) -> TargetConfig {
        let mut config = TargetConfig::from_args(Args {
            interval_ms: Some(1),
            once,
            ..Args::default()
        })
        .unwrap();
        config.retry_delay = Duration::from_millis(1);
        config
    }

    fn not_found() -> Error {
        Error::Pattern(PatternScanError::NotFound("8B 0D ??".to_string()))
    }

    #[test]
    fn test_poll_retries_failed_reads_while_alive() {
        let context = Context::new(ScriptedTarget::new(65_432, 2, true), 0x1000);

        let outcome = poll(&context, &fast_config(true), &ShutdownSignal::new());

        assert_eq!(outcome, PollOutcome::Finished);
        assert_eq!(context.handle.reads.get(), 3);
    }

    #[test]
    fn test_poll_failed_read_after_exit() {
        let context = Context::new(ScriptedTarget::new(0, 1, false), 0x1000);

        let outcome = poll(&context, &fast_config(false), &ShutdownSignal::new());

        assert_eq!(outcome, PollOutcome::ProcessExited);
        assert_eq!(context.handle.reads.get(), 1);
    }

    #[test]
    fn test_poll_stops_on_shutdown() {
        let context = Context::new(ScriptedTarget::new(1_000, 0, true), 0x1000);
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        let outcome = poll(&context, &fast_config(false), &shutdown);

        assert_eq!(outcome, PollOutcome::Shutdown);
        assert_eq!(context.handle.reads.get(), 1);
    }

    #[test]
    fn test_discover_retries_missing_signature() {
        let target = ScriptedTarget::new(0, 0, true);
        let mut attempts = 0;

        let discovery = discover_pointer(&target, &fast_config(false), &ShutdownSignal::new(), |_| {
            attempts += 1;
            if attempts < 3 {
                Err(not_found())
            } else {
                Ok(0x0137_8700)
            }
        })
        .unwrap();

        assert_eq!(discovery, Discovery::Found(0x0137_8700));
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_discover_gives_up_after_exit() {
        let target = ScriptedTarget::new(0, 0, false);

        let discovery =
            discover_pointer(&target, &fast_config(false), &ShutdownSignal::new(), |_| Err(not_found()))
                .unwrap();

        assert_eq!(discovery, Discovery::ProcessExited);
    }

    #[test]
    fn test_discover_fails_on_permanent_error() {
        let target = ScriptedTarget::new(0, 0, true);

        let result = discover_pointer(&target, &fast_config(false), &ShutdownSignal::new(), |_| {
            Err(Error::Pattern(PatternScanError::Empty))
        });

        assert!(result.is_err());
    }
}
