//! Compiled programs keyed by everything that goes into a build, so a
//! specialisation is compiled once per harness run.

use std::hash::Hasher;

use kselect::KernelString;
use moka::sync::Cache;
use rustc_hash::FxHasher;

use crate::toolkit::{GpuToolkit, ToolkitError};

const DEFAULT_CAPACITY: u64 = 4096;

/// FxHash over source, jit and build options. The entry point is blanked
/// out of the jit, so specialisations that differ only in their unique
/// entry-point suffix share one program.
pub fn program_key(kernel_string: &KernelString) -> u64 {
    let jit = match kernel_string.entry_point.as_str() {
        "" => kernel_string.jit.clone(),
        entry_point => kernel_string.jit.replace(entry_point, "\0"),
    };
    let mut hasher = FxHasher::default();
    for part in [&kernel_string.source, &jit, &kernel_string.options] {
        hasher.write(part.as_bytes());
        hasher.write_u8(0xff);
    }
    hasher.finish()
}

pub struct ProgramCache<K> {
    programs: Cache<u64, K>,
}

impl<K: Clone + Send + Sync + 'static> Default for ProgramCache<K> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<K: Clone + Send + Sync + 'static> ProgramCache<K> {
    pub fn new(capacity: u64) -> Self {
        Self {
            programs: Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// The cached program, or the result of building it now. Failed builds
    /// are not cached.
    pub fn get_or_compile<T>(&self, toolkit: &T, kernel_string: &KernelString) -> Result<K, ToolkitError>
    where
        T: GpuToolkit<Kernel = K>,
    {
        let source = format!("{}{}", kernel_string.jit, kernel_string.source);
        self.programs
            .try_get_with(program_key(kernel_string), || {
                toolkit.compile(&source, &kernel_string.options, &kernel_string.entry_point)
            })
            .map_err(|err| (*err).clone())
    }

    pub fn len(&self) -> u64 {
        self.programs.run_pending_tasks();
        self.programs.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockToolkit;

    fn kernel_string(jit: &str) -> KernelString {
        KernelString {
            source: "// pooling_gpu_ref\n".to_string(),
            jit: jit.to_string(),
            options: " -cl-mad-enable".to_string(),
            entry_point: "pool0".to_string(),
            batch_compilation: true,
        }
    }

    #[test]
    fn identical_builds_compile_once() {
        let toolkit = MockToolkit::default();
        let cache = ProgramCache::default();
        let a = kernel_string("#define POOL_SIZE_X 3\n");
        cache.get_or_compile(&toolkit, &a).unwrap();
        cache.get_or_compile(&toolkit, &a.clone()).unwrap();
        cache.get_or_compile(&toolkit, &kernel_string("#define POOL_SIZE_X 2\n")).unwrap();
        assert_eq!(toolkit.stats().compiles, 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failed_builds_are_retried() {
        let toolkit = MockToolkit::default().fail_compiles_containing("pooling_gpu_ref");
        let cache: ProgramCache<String> = ProgramCache::default();
        let ks = kernel_string("");
        for _ in 0..2 {
            match cache.get_or_compile(&toolkit, &ks) {
                Err(ToolkitError::Compile { entry_point, .. }) => assert_eq!(entry_point, "pool0"),
                other => panic!("expected Compile, got {other:?}"),
            }
        }
        assert_eq!(toolkit.stats().compiles, 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn entry_point_suffixes_do_not_split_the_key() {
        let jit = |entry: &str| format!("// Kernel name: {entry}\n#define KERNEL(name) __kernel void {entry}\n#define POOL_SIZE_X 3\n");
        let mut first = kernel_string(&jit("pool0"));
        first.entry_point = "pool0".to_string();
        let mut second = kernel_string(&jit("pool7"));
        second.entry_point = "pool7".to_string();
        assert_eq!(program_key(&first), program_key(&second));

        let mut other = kernel_string(&jit("pool8").replace("POOL_SIZE_X 3", "POOL_SIZE_X 2"));
        other.entry_point = "pool8".to_string();
        assert_ne!(program_key(&first), program_key(&other));
    }

    #[test]
    fn key_separates_the_parts() {
        let mut a = kernel_string("ab");
        a.source = "c".to_string();
        let mut b = kernel_string("a");
        b.source = "bc".to_string();
        assert_ne!(program_key(&a), program_key(&b));
    }
}
