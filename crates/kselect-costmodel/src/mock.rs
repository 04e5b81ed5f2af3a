//! Deterministic in-process toolkit for dry runs and tests.

use std::{
    collections::VecDeque, sync::{Mutex, PoisonError}
};

use crate::toolkit::{ArgValue, BufferAccess, GpuToolkit, ToolkitError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockBuffer {
    pub size: usize,
    pub access: BufferAccess,
}

/// Counters of everything the toolkit was asked to do.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MockStats {
    pub compiles: usize,
    pub buffers: Vec<usize>,
    pub args: Vec<(u32, Option<usize>)>,
    pub launches: usize,
    pub profiled_launches: usize,
    pub finishes: usize,
}

/// Launches "take" the queued durations in order, then `default_duration_ns`.
#[derive(Debug)]
pub struct MockToolkit {
    default_duration_ns: u64,
    queued: Mutex<VecDeque<(u64, u64)>>,
    failing_sources: Vec<String>,
    stats: Mutex<MockStats>,
}

impl Default for MockToolkit {
    fn default() -> Self {
        Self::new(1_000_000)
    }
}

impl MockToolkit {
    pub fn new(default_duration_ns: u64) -> Self {
        Self {
            default_duration_ns,
            queued: Mutex::new(VecDeque::new()),
            failing_sources: Vec::new(),
            stats: Mutex::new(MockStats::default()),
        }
    }

    /// Profiling timestamps returned by the next profiled launches.
    pub fn with_events(self, events: impl IntoIterator<Item = (u64, u64)>) -> Self {
        self.queued.lock().unwrap_or_else(PoisonError::into_inner).extend(events);
        self
    }

    /// Builds of any source containing `marker` fail.
    pub fn fail_compiles_containing(mut self, marker: impl Into<String>) -> Self {
        self.failing_sources.push(marker.into());
        self
    }

    pub fn stats(&self) -> MockStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, update: impl FnOnce(&mut MockStats)) {
        update(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

impl GpuToolkit for MockToolkit {
    type Kernel = String;
    type Buffer = MockBuffer;
    type Event = (u64, u64);

    fn compile(&self, source: &str, _options: &str, entry_point: &str) -> Result<String, ToolkitError> {
        self.record(|s| s.compiles += 1);
        if self.failing_sources.iter().any(|marker| source.contains(marker.as_str())) {
            return Err(ToolkitError::Compile {
                entry_point: entry_point.to_string(),
                log: "mock build failure".to_string(),
            });
        }
        Ok(entry_point.to_string())
    }

    fn create_buffer(&self, size_bytes: usize, access: BufferAccess) -> Result<MockBuffer, ToolkitError> {
        if size_bytes == 0 {
            return Err(ToolkitError::Allocation {
                size: 0,
                reason: "empty buffer".to_string(),
            });
        }
        self.record(|s| s.buffers.push(size_bytes));
        Ok(MockBuffer { size: size_bytes, access })
    }

    fn set_arg(&self, _kernel: &String, index: u32, value: ArgValue<'_, MockBuffer>) -> Result<(), ToolkitError> {
        let size = match value {
            ArgValue::Buffer(buffer) => Some(buffer.size),
            ArgValue::Uint32(_) => None,
        };
        self.record(|s| s.args.push((index, size)));
        Ok(())
    }

    fn enqueue_nd_range(&self, _kernel: &String, global: [usize; 3], local: [usize; 3], profiled: bool) -> Result<Option<(u64, u64)>, ToolkitError> {
        if global.iter().zip(local).any(|(&g, l)| l == 0 || g % l != 0) {
            return Err(ToolkitError::Enqueue(format!("invalid work groups {global:?} / {local:?}")));
        }
        self.record(|s| {
            s.launches += 1;
            if profiled {
                s.profiled_launches += 1;
            }
        });
        if !profiled {
            return Ok(None);
        }
        let event = self
            .queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or((0, self.default_duration_ns));
        Ok(Some(event))
    }

    fn finish(&self) -> Result<(), ToolkitError> {
        self.record(|s| s.finishes += 1);
        Ok(())
    }

    fn wait_and_read_profiling(&self, event: &(u64, u64)) -> Result<(u64, u64), ToolkitError> {
        if event.1 < event.0 {
            return Err(ToolkitError::Profiling("end precedes start".to_string()));
        }
        Ok(*event)
    }
}
