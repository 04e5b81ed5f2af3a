//! Process environment abstractions shared across kselect components.

pub mod guard;
pub mod instrument;
pub mod selector;
pub mod value;

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use instrument::InstrumentEnvVar;
use selector::SelectorEnvVar;

macro_rules! namespaces {
    ($($(#[$meta:meta])* $variant:ident($inner:ty)),+ $(,)?) => {
        /// A kselect variable, by namespace.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum EnvVar {
            $($(#[$meta])* $variant($inner)),+
        }

        $(impl From<$inner> for EnvVar {
            fn from(value: $inner) -> Self {
                Self::$variant(value)
            }
        })+

        impl EnvVar {
            pub const fn key(self) -> &'static str {
                match self {
                    $(EnvVar::$variant(inner) => inner.key()),+
                }
            }
        }
    };
}

namespaces! {
    /// Logging and metrics.
    Instrument(InstrumentEnvVar),
    /// Selection overrides, cost tables and calibration launch counts.
    Selector(SelectorEnvVar),
}

/// Every read and write of a kselect variable goes through here so scoped
/// overrides from concurrent tests cannot interleave.
pub struct Environment;

impl Environment {
    /// The global environment mutex. Poisoning is ignored since it guards `()`.
    pub fn lock() -> MutexGuard<'static, ()> {
        static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_MUTEX.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(var: impl Into<EnvVar>) -> Option<String> {
        std::env::var(var.into().key()).ok()
    }

    pub fn set(var: impl Into<EnvVar>, value: &str) {
        Self::replace_locked(var.into(), Some(value), &mut Self::lock());
    }

    pub fn remove(var: impl Into<EnvVar>) {
        Self::replace_locked(var.into(), None, &mut Self::lock());
    }

    /// Set (`Some`) or remove (`None`) `var`, returning its previous value.
    /// The guard argument proves the caller holds [`Environment::lock`].
    pub(crate) fn replace_locked(var: EnvVar, value: Option<&str>, _guard: &mut MutexGuard<'static, ()>) -> Option<String> {
        let previous = Self::get(var);
        match value {
            // SAFETY: mutation is serialised by the held environment mutex.
            Some(value) => unsafe { std::env::set_var(var.key(), value) },
            // SAFETY: as above.
            None => unsafe { std::env::remove_var(var.key()) },
        }
        previous
    }
}
