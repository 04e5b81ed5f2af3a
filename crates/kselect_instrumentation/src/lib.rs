//! Configuration, logging and structured metric plumbing for kselect.

pub mod config;
pub mod event;
pub mod exporters;
pub mod logging;
pub mod macros;
pub mod prelude;
pub mod recorder;

pub use config::{AppConfig, AppConfigError};
pub use event::MetricEvent;
pub use logging::init_logging;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
    pub use tracing;
}

mod tests;
