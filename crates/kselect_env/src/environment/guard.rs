//! Scoped environment mutation for tests and benchmarks.

use super::{EnvVar, Environment};

/// Restores the variable's previous value (or absence) on drop.
pub struct EnvVarGuard {
    var: EnvVar,
    previous: Option<String>,
}

impl EnvVarGuard {
    pub fn set(var: impl Into<EnvVar>, value: &str) -> Self {
        Self::replace(var.into(), Some(value))
    }

    pub fn unset(var: impl Into<EnvVar>) -> Self {
        Self::replace(var.into(), None)
    }

    fn replace(var: EnvVar, value: Option<&str>) -> Self {
        let mut lock = Environment::lock();
        let previous = Environment::replace_locked(var, value, &mut lock);
        Self { var, previous }
    }

    pub fn key(&self) -> &'static str {
        self.var.key()
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        let mut lock = Environment::lock();
        Environment::replace_locked(self.var, self.previous.as_deref(), &mut lock);
    }
}
