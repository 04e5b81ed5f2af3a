//! Logging and metrics environment variable identifiers and descriptors.

use tracing::Level;

use super::{
    EnvVar, value::{EnvValueError, TypedEnvVar}
};

/// Instrumentation-specific environment variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentEnvVar {
    /// Controls the global log level.
    LogLevel,
    /// Echo structured metric events on the console when truthy.
    MetricsConsole,
}

impl InstrumentEnvVar {
    /// Obtain the canonical environment variable key for the identifier.
    pub const fn key(self) -> &'static str {
        match self {
            InstrumentEnvVar::LogLevel => "KSEL_LOG_LEVEL",
            InstrumentEnvVar::MetricsConsole => "KSEL_METRICS_CONSOLE",
        }
    }

    /// Convert into the unscoped [`EnvVar`] variant.
    pub const fn into_env(self) -> EnvVar {
        EnvVar::Instrument(self)
    }
}

/// Typed descriptor for the log level.
pub const LOG_LEVEL: TypedEnvVar<Level> = TypedEnvVar::new(InstrumentEnvVar::LogLevel.into_env(), parse_log_level, format_level);

/// Typed descriptor for the console metrics toggle.
pub const METRICS_CONSOLE: TypedEnvVar<bool> = TypedEnvVar::new(InstrumentEnvVar::MetricsConsole.into_env(), parse_bool, format_bool);

fn parse_log_level(value: &str) -> Result<Level, EnvValueError> {
    value.trim().parse::<Level>().map_err(|_| EnvValueError::new("invalid tracing level"))
}

fn format_level(level: &Level) -> Result<String, EnvValueError> {
    Ok(level.to_string())
}

pub(crate) fn parse_bool(value: &str) -> Result<bool, EnvValueError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EnvValueError::new("value is not a recognised boolean")),
    }
}

fn format_bool(value: &bool) -> Result<String, EnvValueError> {
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::EnvVarError;

    #[test]
    #[serial]
    fn log_level_round_trips_through_guard() {
        let _clear = LOG_LEVEL.unset_guard();
        {
            let guard = LOG_LEVEL.set_guard(Level::DEBUG).unwrap();
            assert_eq!(*guard, Level::DEBUG);
            assert_eq!(LOG_LEVEL.get().unwrap(), Some(Level::DEBUG));
        }
        assert_eq!(LOG_LEVEL.get().unwrap(), None);
    }

    #[test]
    #[serial]
    fn metrics_console_rejects_garbage() {
        let _guard = crate::EnvVarGuard::set(InstrumentEnvVar::MetricsConsole, "maybe");
        match METRICS_CONSOLE.get() {
            Err(EnvVarError::Parse { name, value, .. }) => {
                assert_eq!(name, "KSEL_METRICS_CONSOLE");
                assert_eq!(value, "maybe");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
        assert_eq!(METRICS_CONSOLE.get_valid(), None);
    }

    #[test]
    fn bool_parser_accepts_common_spellings() {
        for truthy in ["1", "true", "YES", " on "] {
            assert!(parse_bool(truthy).unwrap(), "{truthy}");
        }
        for falsy in ["0", "False", "no", "OFF"] {
            assert!(!parse_bool(falsy).unwrap(), "{falsy}");
        }
    }
}
