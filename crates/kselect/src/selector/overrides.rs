use kselect_env::{DENY_KERNELS, FORCE_KERNELS};
use tracing::warn;

use crate::{
    error::{KernelSelectorError, Result}, kernels::KernelId
};

/// Name-based allow/deny lists for debugging and benchmarking.
///
/// A forced kernel wins over every other candidate that passes the key
/// match; a denied kernel is never considered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KernelOverrides {
    pub force: Vec<String>,
    pub deny: Vec<String>,
}

impl KernelOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists from `KSEL_FORCE_KERNELS` and `KSEL_DENY_KERNELS`. Names that
    /// match no registered kernel are dropped with a warning.
    pub fn from_environment() -> Self {
        Self {
            force: known_names(FORCE_KERNELS.get_valid().unwrap_or_default(), FORCE_KERNELS.key()),
            deny: known_names(DENY_KERNELS.get_valid().unwrap_or_default(), DENY_KERNELS.key()),
        }
    }

    /// Lists given on the command line; unknown names are an error.
    pub fn from_names(force: Vec<String>, deny: Vec<String>) -> Result<Self> {
        for name in force.iter().chain(&deny) {
            if KernelId::from_name(name).is_none() {
                return Err(KernelSelectorError::UnknownKernel(name.clone()));
            }
        }
        Ok(Self { force, deny })
    }

    pub fn force(mut self, name: impl Into<String>) -> Self {
        self.force.push(name.into());
        self
    }

    pub fn deny(mut self, name: impl Into<String>) -> Self {
        self.deny.push(name.into());
        self
    }

    /// Layer `higher` over `self`. A name `higher` forces is no longer
    /// denied, and a name it denies is no longer forced.
    #[must_use]
    pub fn merge(&self, higher: &KernelOverrides) -> KernelOverrides {
        let mut force: Vec<String> = self.force.iter().filter(|name| !higher.is_denied(name)).cloned().collect();
        let mut deny: Vec<String> = self.deny.iter().filter(|name| !higher.is_forced(name)).cloned().collect();
        for name in &higher.force {
            if !force.contains(name) {
                force.push(name.clone());
            }
        }
        for name in &higher.deny {
            if !deny.contains(name) {
                deny.push(name.clone());
            }
        }
        KernelOverrides { force, deny }
    }

    pub fn is_forced(&self, name: &str) -> bool {
        self.force.iter().any(|forced| forced == name)
    }

    pub fn is_denied(&self, name: &str) -> bool {
        self.deny.iter().any(|denied| denied == name)
    }

    pub fn is_empty(&self) -> bool {
        self.force.is_empty() && self.deny.is_empty()
    }
}

fn known_names(names: Vec<String>, source: &str) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| {
            let known = KernelId::from_name(name).is_some();
            if !known {
                warn!(variable = source, kernel = %name, "ignoring unknown kernel name");
            }
            known
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn environment_lists_drop_unknown_names() {
        let _force = FORCE_KERNELS
            .set_guard(vec!["pooling_gpu_ref".to_string(), "pooling_gpu_winograd".to_string()])
            .unwrap();
        let _deny = DENY_KERNELS.unset_guard();
        let overrides = KernelOverrides::from_environment();
        assert_eq!(overrides.force, ["pooling_gpu_ref"]);
        assert!(overrides.deny.is_empty());
    }

    #[test]
    #[serial]
    fn malformed_environment_values_are_ignored() {
        let _force = kselect_env::EnvVarGuard::set(FORCE_KERNELS.var(), "pooling gpu ref");
        let _deny = DENY_KERNELS.unset_guard();
        assert!(KernelOverrides::from_environment().is_empty());
    }

    #[test]
    fn command_line_names_must_be_registered() {
        match KernelOverrides::from_names(vec!["softmax_gpu_bf".into()], vec!["softmax_gpu_xyz".into()]) {
            Err(KernelSelectorError::UnknownKernel(name)) => assert_eq!(name, "softmax_gpu_xyz"),
            other => panic!("expected UnknownKernel, got {other:?}"),
        }
    }

    #[test]
    fn higher_layer_wins_conflicts() {
        let env = KernelOverrides::new().force("lrn_gpu_ref").deny("softmax_gpu_bf");
        let cli = KernelOverrides::new().force("softmax_gpu_bf").deny("lrn_gpu_ref");
        let merged = env.merge(&cli);
        assert_eq!(merged.force, ["softmax_gpu_bf"]);
        assert_eq!(merged.deny, ["lrn_gpu_ref"]);
        assert!(merged.is_forced("softmax_gpu_bf"));
        assert!(!merged.is_denied("softmax_gpu_bf"));
    }
}
