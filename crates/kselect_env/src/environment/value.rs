//! Typed environment variable descriptors.
//!
//! A [`TypedEnvVar`] pairs an [`EnvVar`] with parse and format callbacks.
//!
//! ```
//! use kselect_env::BENCH_WARMUP;
//!
//! let guard = BENCH_WARMUP.set_guard(5).expect("set warmup count");
//! assert_eq!(*guard, 5);
//! ```

use std::{fmt, marker::PhantomData, ops::Deref};

use tracing::warn;

use super::{EnvVar, Environment, guard::EnvVarGuard};

#[derive(Debug, thiserror::Error)]
pub enum EnvVarError {
    #[error("failed to parse environment variable {name} from '{value}': {source}")]
    Parse {
        name: &'static str,
        /// Raw text found in the environment.
        value: String,
        source: EnvValueError,
    },
    #[error("failed to format environment variable {name}: {source}")]
    Format { name: &'static str, source: EnvValueError },
}

/// Message returned by a parse or format callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvValueError(String);

impl EnvValueError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for EnvValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for EnvValueError {}

pub type ParseFn<T> = fn(&str) -> Result<T, EnvValueError>;
pub type FormatFn<T> = fn(&T) -> Result<String, EnvValueError>;

#[derive(Clone, Copy)]
pub struct TypedEnvVar<T> {
    var: EnvVar,
    parse: ParseFn<T>,
    format: FormatFn<T>,
    _marker: PhantomData<T>,
}

impl<T> TypedEnvVar<T> {
    pub const fn new(var: EnvVar, parse: ParseFn<T>, format: FormatFn<T>) -> Self {
        Self {
            var,
            parse,
            format,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.var.key()
    }

    #[must_use]
    pub const fn var(&self) -> EnvVar {
        self.var
    }

    fn format_value(&self, value: &T) -> Result<String, EnvVarError> {
        (self.format)(value).map_err(|source| EnvVarError::Format { name: self.key(), source })
    }

    /// `Ok(None)` when unset, an error when set but malformed.
    pub fn get(&self) -> Result<Option<T>, EnvVarError> {
        let Some(raw) = Environment::get(self.var) else {
            return Ok(None);
        };
        (self.parse)(&raw).map(Some).map_err(|source| EnvVarError::Parse {
            name: self.key(),
            value: raw,
            source,
        })
    }

    /// Like [`get`](Self::get), but a malformed value is logged and treated
    /// as unset.
    #[must_use]
    pub fn get_valid(&self) -> Option<T> {
        self.get().unwrap_or_else(|err| {
            warn!(variable = self.key(), error = %err, "ignoring invalid environment value");
            None
        })
    }

    pub fn set(&self, value: T) -> Result<(), EnvVarError> {
        Environment::set(self.var, &self.format_value(&value)?);
        Ok(())
    }

    pub fn unset(&self) {
        Environment::remove(self.var);
    }

    /// Set the variable until the returned guard drops.
    pub fn set_guard(&self, value: T) -> Result<TypedEnvVarGuard<T>, EnvVarError> {
        let restore = EnvVarGuard::set(self.var, &self.format_value(&value)?);
        Ok(TypedEnvVarGuard { value, _restore: restore })
    }

    /// Unset the variable until the returned guard drops.
    #[must_use]
    pub fn unset_guard(&self) -> EnvVarGuard {
        EnvVarGuard::unset(self.var)
    }
}

/// Derefs to the value that was set; restores the previous state on drop.
pub struct TypedEnvVarGuard<T> {
    value: T,
    _restore: EnvVarGuard,
}

impl<T> Deref for TypedEnvVarGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}
