//! Offline cost model for kselect: runs every viable kernel on curated
//! requests through a [`GpuToolkit`], then writes the measured times as a
//! JSON data file or as Rust tables the selector ranks with.

pub mod emit;
pub mod harness;
pub mod mock;
pub mod param_sets;
pub mod program_cache;
pub mod runner;
pub mod toolkit;

pub use emit::{EmitError, known_signatures, rust_source};
pub use harness::{EntryFailure, Harness, HarnessError, HarnessMode, HarnessReport, VERIFY_TOLERANCE_MS, VerifyMismatch};
pub use mock::MockToolkit;
pub use param_sets::{CuratedLayer, alexnet_convolutions, curated_layer, curated_layers};
pub use program_cache::ProgramCache;
pub use runner::{BenchmarkRunner, RunnerConfig};
pub use toolkit::{ArgValue, BufferAccess, GpuToolkit, ToolkitError};
