use condra_lib::ProcessHandle;

/// An attached target and the resolved address of the value being polled.
pub struct Context<T = ProcessHandle> {
    pub handle: T,
    pub pointer: usize,
}

impl<T> Context<T> {
    pub fn new(handle: T, pointer: usize) -> Self {
        Self { handle, pointer }
    }
}
