//! Calibrated execution times that override the static kernel priorities.
//!
//! Entries are keyed by device id, kernel name and the 64-bit hash of the
//! request's signature string. Tables come from compiled-in literals
//! ([`CostTables::register_static`]) or from the versioned JSON file the
//! calibration harness writes ([`CostTableFile`]).

use std::{
    collections::BTreeMap, fs, path::{Path, PathBuf}
};

use kselect_env::COST_TABLE_PATH;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{KernelSelectorError, Result}, kernel_base::priority
};

/// Version written to, and required from, calibration data files.
pub const COST_TABLE_VERSION: u32 = 1;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// 64-bit FNV-1a of a parameter signature. Saved tables depend on this
/// value, so it must not change with the platform or a dependency bump.
pub fn signature_hash(signature: &str) -> u64 {
    signature
        .bytes()
        .fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
}

/// Text form used for hashes in data files.
pub fn format_hash(hash: u64) -> String {
    format!("0x{hash:016x}")
}

pub fn parse_hash(text: &str) -> Result<u64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .ok_or_else(|| KernelSelectorError::CostTableHash(text.to_string()))?;
    if digits.is_empty() || digits.len() > 16 {
        return Err(KernelSelectorError::CostTableHash(text.to_string()));
    }
    u64::from_str_radix(digits, 16).map_err(|_| KernelSelectorError::CostTableHash(text.to_string()))
}

/// One calibrated measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CostEntry {
    /// Mean execution time in milliseconds.
    Measured(f32),
    NotSupported,
}

impl CostEntry {
    /// `priority::NOT_SUPPORTED` marks a kernel that could not run.
    pub fn from_time(time_ms: f32) -> Self {
        if time_ms >= priority::NOT_SUPPORTED { CostEntry::NotSupported } else { CostEntry::Measured(time_ms) }
    }

    pub fn estimated_time(self) -> f32 {
        match self {
            CostEntry::Measured(time) => time,
            CostEntry::NotSupported => priority::NOT_SUPPORTED,
        }
    }

    fn from_file_value(value: Option<f32>) -> Self {
        value.map_or(CostEntry::NotSupported, CostEntry::from_time)
    }
}

type KernelTable = FxHashMap<u64, CostEntry>;

/// Calibration tables for every known device. Read-only once the context
/// holding them is shared.
#[derive(Clone, Debug, Default)]
pub struct CostTables {
    devices: FxHashMap<String, FxHashMap<String, KernelTable>>,
}

impl CostTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, device_id: &str, kernel: &str, hash: u64, entry: CostEntry) {
        self.devices
            .entry(device_id.to_string())
            .or_default()
            .entry(kernel.to_string())
            .or_default()
            .insert(hash, entry);
    }

    /// Register a compiled-in literal table.
    pub fn register_static(&mut self, device_id: &str, kernel: &str, entries: &[(u64, f32)]) {
        let table = self
            .devices
            .entry(device_id.to_string())
            .or_default()
            .entry(kernel.to_string())
            .or_default();
        table.extend(entries.iter().map(|&(hash, time)| (hash, CostEntry::from_time(time))));
    }

    pub fn lookup(&self, device_id: &str, kernel: &str, hash: u64) -> Option<CostEntry> {
        self.devices.get(device_id)?.get(kernel)?.get(&hash).copied()
    }

    /// Number of entries across all devices and kernels.
    pub fn len(&self) -> usize {
        self.devices.values().flat_map(FxHashMap::values).map(FxHashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add every entry of `file`, replacing entries with the same key.
    pub fn merge_file(&mut self, file: &CostTableFile) -> Result<()> {
        for (kernel, entries) in &file.kernels {
            for (hash, value) in entries {
                self.insert(&file.device_id, kernel, parse_hash(hash)?, CostEntry::from_file_value(*value));
            }
        }
        Ok(())
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = CostTableFile::load(path)?;
        let mut tables = Self::new();
        tables.merge_file(&file)?;
        info!(device = %file.device_id, entries = tables.len(), "loaded cost table");
        Ok(tables)
    }

    /// Tables named by `KSEL_COST_TABLE_PATH`, or empty when it is unset.
    pub fn from_environment() -> Result<Self> {
        match COST_TABLE_PATH.get_valid() {
            Some(path) => Self::load_file(path),
            None => {
                debug!("no cost table configured");
                Ok(Self::new())
            }
        }
    }
}

/// On-disk calibration data for one device.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CostTableFile {
    pub version: u32,
    pub device_id: String,
    /// Kernel name to `hash → time in ms`; `null` marks not supported.
    pub kernels: BTreeMap<String, BTreeMap<String, Option<f32>>>,
}

impl CostTableFile {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            version: COST_TABLE_VERSION,
            device_id: device_id.into(),
            kernels: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, kernel: &str, hash: u64, entry: CostEntry) {
        let value = match entry {
            CostEntry::Measured(time) => Some(time),
            CostEntry::NotSupported => None,
        };
        self.kernels.entry(kernel.to_string()).or_default().insert(format_hash(hash), value);
    }

    /// Decoded entries of `kernel`, sorted by hash.
    pub fn entries(&self, kernel: &str) -> Result<Vec<(u64, CostEntry)>> {
        let Some(entries) = self.kernels.get(kernel) else {
            return Ok(Vec::new());
        };
        let mut decoded = entries
            .iter()
            .map(|(hash, value)| Ok((parse_hash(hash)?, CostEntry::from_file_value(*value))))
            .collect::<Result<Vec<_>>>()?;
        decoded.sort_by_key(|(hash, _)| *hash);
        Ok(decoded)
    }

    pub fn from_json(path: &Path, text: &str) -> Result<Self> {
        let file: Self = serde_json::from_str(text).map_err(|source| KernelSelectorError::CostTableFormat {
            path: path.to_path_buf(),
            source,
        })?;
        if file.version != COST_TABLE_VERSION {
            return Err(KernelSelectorError::CostTableVersion {
                found: file.version,
                expected: COST_TABLE_VERSION,
            });
        }
        Ok(file)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| io_error(path, source))?;
        Self::from_json(path, &text)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|source| KernelSelectorError::CostTableFormat {
            path: PathBuf::new(),
            source,
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        fs::write(path, json).map_err(|source| io_error(path, source))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> KernelSelectorError {
    KernelSelectorError::CostTableIo {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("kselect-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn signature_hash_is_stable_and_discriminating() {
        let a = "conv_bfyx_F16_227x227x3_s4";
        assert_eq!(signature_hash(a), signature_hash(&a.to_string()));
        assert_ne!(signature_hash(a), signature_hash("conv_bfyx_F16_227x227x3_s2"));
    }

    #[test]
    fn signature_hash_is_fnv1a() {
        assert_eq!(signature_hash(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(signature_hash("a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(signature_hash("foobar"), 0x8594_4171_f739_67e8);
        // AlexNet conv1, F16 bfyx with relu.
        assert_eq!(
            signature_hash("F16_BFYX_BFYX_RELU_0_0_227_227_3_1_55_55_96_1_OIYX_BF_11_11_0_0_4_4_1_1"),
            0x4715_bc42_e1c0_26d6
        );
    }

    #[test]
    fn hashes_round_trip_through_text() {
        let hash = signature_hash("pool");
        let text = format_hash(hash);
        assert_eq!(text.len(), 18);
        assert_eq!(parse_hash(&text).unwrap(), hash);
        for bad in ["1234", "0x", "0xzz", "0x00000000000000001"] {
            match parse_hash(bad) {
                Err(KernelSelectorError::CostTableHash(value)) => assert_eq!(value, bad),
                other => panic!("expected CostTableHash, got {other:?}"),
            }
        }
    }

    #[test]
    fn static_tables_mark_max_as_not_supported() {
        let mut tables = CostTables::new();
        tables.register_static("gen9", "convolution_gpu_ref", &[(1, 0.25), (2, f32::MAX)]);
        assert_eq!(tables.lookup("gen9", "convolution_gpu_ref", 1), Some(CostEntry::Measured(0.25)));
        assert_eq!(tables.lookup("gen9", "convolution_gpu_ref", 2), Some(CostEntry::NotSupported));
        assert_eq!(tables.lookup("gen9", "convolution_gpu_ref", 3), None);
        assert_eq!(tables.lookup("gen12", "convolution_gpu_ref", 1), None);
        assert_eq!(tables.len(), 2);
    }

    #[test]
    fn data_files_round_trip_and_reject_other_versions() {
        let mut file = CostTableFile::new("gen9");
        file.record("pooling_gpu_ref", 7, CostEntry::Measured(1.5));
        file.record("pooling_gpu_ref", 3, CostEntry::NotSupported);
        let path = temp_path("round-trip");
        file.save(&path).unwrap();

        let loaded = CostTableFile::load(&path).unwrap();
        assert_eq!(loaded, file);
        assert_eq!(
            loaded.entries("pooling_gpu_ref").unwrap(),
            vec![(3, CostEntry::NotSupported), (7, CostEntry::Measured(1.5))]
        );
        let tables = CostTables::load_file(&path).unwrap();
        assert_eq!(tables.lookup("gen9", "pooling_gpu_ref", 7), Some(CostEntry::Measured(1.5)));

        let mut stale = file.clone();
        stale.version = COST_TABLE_VERSION + 1;
        match CostTableFile::from_json(&path, &stale.to_json().unwrap()) {
            Err(KernelSelectorError::CostTableVersion { found, expected }) => {
                assert_eq!(found, COST_TABLE_VERSION + 1);
                assert_eq!(expected, COST_TABLE_VERSION);
            }
            other => panic!("expected CostTableVersion, got {other:?}"),
        }
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_and_malformed_files_are_reported_with_their_path() {
        let missing = temp_path("missing");
        match CostTables::load_file(&missing) {
            Err(KernelSelectorError::CostTableIo { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected CostTableIo, got {other:?}"),
        }
        match CostTableFile::from_json(Path::new("bad.json"), "{\"version\": 1") {
            Err(KernelSelectorError::CostTableFormat { path, .. }) => assert_eq!(path, Path::new("bad.json")),
            other => panic!("expected CostTableFormat, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn environment_path_selects_the_data_file() {
        let _unset = COST_TABLE_PATH.unset_guard();
        assert!(CostTables::from_environment().unwrap().is_empty());

        let mut file = CostTableFile::new("generic");
        file.record("softmax_gpu_bf", 11, CostEntry::Measured(0.5));
        let path = temp_path("env");
        file.save(&path).unwrap();
        let _guard = COST_TABLE_PATH.set_guard(path.clone()).unwrap();
        let tables = CostTables::from_environment().unwrap();
        assert_eq!(tables.lookup("generic", "softmax_gpu_bf", 11), Some(CostEntry::Measured(0.5)));
        std::fs::remove_file(&path).ok();
    }
}
