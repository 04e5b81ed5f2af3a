//! Calibration data as compilable Rust: one `&[(u64, f32)]` literal per
//! kernel plus a `register` function that loads them into [`CostTables`].
//!
//! [`CostTables`]: kselect::CostTables

use std::{
    collections::BTreeMap, fmt::{self, Write}
};

use kselect::{CostEntry, CostTableFile, KernelSelectorError, format_hash};
use thiserror::Error;

use crate::param_sets::{alexnet_convolutions, curated_layers};

#[derive(Debug, Error)]
pub enum EmitError {
    #[error(transparent)]
    Table(#[from] KernelSelectorError),
    #[error("failed to format table source: {0}")]
    Format(#[from] fmt::Error),
}

/// Name of the literal holding `kernel`'s entries.
pub fn table_ident(kernel: &str) -> String {
    format!("{}_COSTS", kernel.to_ascii_uppercase())
}

/// Signature text of every curated request, by hash.
pub fn known_signatures() -> BTreeMap<u64, String> {
    let mut signatures = BTreeMap::new();
    let sets = alexnet_convolutions().into_iter().map(Into::into);
    for params in sets.chain(curated_layers().into_iter().map(|layer| layer.params)) {
        let signature = params.to_string();
        signatures.insert(kselect::signature_hash(&signature), signature);
    }
    signatures
}

/// Render `file` as Rust source. Entries whose hash appears in `signatures`
/// carry the signature as a trailing comment.
pub fn rust_source(file: &CostTableFile, signatures: &BTreeMap<u64, String>) -> Result<String, EmitError> {
    let mut out = String::new();
    writeln!(out, "// Calibration data for device `{}` (format version {}).", file.device_id, file.version)?;
    writeln!(out)?;

    for kernel in file.kernels.keys() {
        writeln!(out, "pub const {}: &[(u64, f32)] = &[", table_ident(kernel))?;
        for (hash, entry) in file.entries(kernel)? {
            let time = match entry {
                CostEntry::Measured(time) => format!("{time:?}"),
                CostEntry::NotSupported => "f32::MAX".to_string(),
            };
            write!(out, "    ({}, {time}),", format_hash(hash))?;
            if let Some(signature) = signatures.get(&hash) {
                write!(out, " // {signature}")?;
            }
            writeln!(out)?;
        }
        writeln!(out, "];")?;
        writeln!(out)?;
    }

    writeln!(out, "pub fn register(tables: &mut kselect::CostTables) {{")?;
    for kernel in file.kernels.keys() {
        writeln!(
            out,
            "    tables.register_static({:?}, {kernel:?}, {});",
            file.device_id,
            table_ident(kernel)
        )?;
    }
    writeln!(out, "}}")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use kselect::signature_hash;

    use super::*;
    use crate::param_sets::curated_layer;

    #[test]
    fn tables_carry_times_markers_and_signatures() {
        let pool1 = curated_layer("pool1").unwrap().params.to_string();
        let hash = signature_hash(&pool1);
        let mut file = CostTableFile::new("gen9");
        file.record("pooling_gpu_ref", hash, CostEntry::Measured(0.25));
        file.record("pooling_gpu_average_opt", hash, CostEntry::NotSupported);
        file.record("pooling_gpu_ref", 0x1, CostEntry::Measured(1.0));

        let source = rust_source(&file, &known_signatures()).unwrap();
        assert!(source.contains("pub const POOLING_GPU_REF_COSTS: &[(u64, f32)] = &["));
        assert!(source.contains(&format!("    ({}, 0.25), // {pool1}\n", format_hash(hash))));
        assert!(source.contains("    (0x0000000000000001, 1.0),\n"));
        assert!(source.contains(&format!("    ({}, f32::MAX),", format_hash(hash))));
        assert!(source.contains(r#"tables.register_static("gen9", "pooling_gpu_ref", POOLING_GPU_REF_COSTS);"#));
    }

    #[test]
    fn malformed_hashes_are_rejected() {
        let mut file = CostTableFile::new("gen9");
        file.kernels
            .entry("activation_ref".to_string())
            .or_default()
            .insert("12ab".to_string(), Some(1.0));
        match rust_source(&file, &BTreeMap::new()) {
            Err(EmitError::Table(KernelSelectorError::CostTableHash(text))) => assert_eq!(text, "12ab"),
            other => panic!("expected CostTableHash, got {other:?}"),
        }
    }

    #[test]
    fn curated_signatures_cover_the_convolution_sets() {
        let signatures = known_signatures();
        for params in alexnet_convolutions() {
            let signature = kselect::Params::from(params).to_string();
            assert_eq!(signatures.get(&signature_hash(&signature)), Some(&signature));
        }
    }
}
