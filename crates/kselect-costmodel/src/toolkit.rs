//! The GPU toolkit the harness drives. The harness never picks devices or
//! owns queues; it only compiles, binds, launches and reads timestamps.

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ToolkitError {
    #[error("build of '{entry_point}' failed: {log}")]
    Compile { entry_point: String, log: String },
    #[error("allocating {size} bytes failed: {reason}")]
    Allocation { size: usize, reason: String },
    #[error("binding argument {index} failed: {reason}")]
    SetArg { index: u32, reason: String },
    #[error("enqueue failed: {0}")]
    Enqueue(String),
    #[error("profiling data unavailable: {0}")]
    Profiling(String),
}

/// Access the kernel has to a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// Value bound at one kernel argument slot.
#[derive(Debug)]
pub enum ArgValue<'a, B> {
    Buffer(&'a B),
    Uint32(u32),
}

pub trait GpuToolkit {
    type Kernel: Clone + Send + Sync + 'static;
    type Buffer;
    type Event;

    /// Build `entry_point` out of `source` with `options`.
    fn compile(&self, source: &str, options: &str, entry_point: &str) -> Result<Self::Kernel, ToolkitError>;

    fn create_buffer(&self, size_bytes: usize, access: BufferAccess) -> Result<Self::Buffer, ToolkitError>;

    fn set_arg(&self, kernel: &Self::Kernel, index: u32, value: ArgValue<'_, Self::Buffer>) -> Result<(), ToolkitError>;

    /// Launch asynchronously. Returns an event only when `profiled` is set.
    fn enqueue_nd_range(
        &self,
        kernel: &Self::Kernel,
        global: [usize; 3],
        local: [usize; 3],
        profiled: bool,
    ) -> Result<Option<Self::Event>, ToolkitError>;

    /// Block until every enqueued launch completed.
    fn finish(&self) -> Result<(), ToolkitError>;

    /// Device start and end timestamps of a completed launch, in ns.
    fn wait_and_read_profiling(&self, event: &Self::Event) -> Result<(u64, u64), ToolkitError>;
}
