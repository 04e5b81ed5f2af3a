use std::{fmt::Write as _, fs, path::Path, sync::Arc};

use kselect::{
    ComputeContext, CostTableFile, CostTables, EngineInfo, InMemoryTemplateDatabase, KernelId, KernelOverrides, KernelSelector, OptionalParams, Selection, kernels, types::KernelType
};
use kselect_costmodel::{curated_layer, curated_layers, known_signatures, rust_source};
use tracing::info;

use crate::cli::error::CliError;

/// Context whose templates are placeholders, enough to select and
/// specialise without kernel sources on disk.
pub fn placeholder_context(cost_tables: CostTables) -> Arc<ComputeContext> {
    let names = kernels::template_names();
    let templates = InMemoryTemplateDatabase::with_placeholders(names.iter().map(String::as_str));
    ComputeContext::new(EngineInfo::default(), Arc::new(templates))
        .with_cost_tables(cost_tables)
        .into_shared()
}

pub fn list(family: Option<KernelType>) -> String {
    let mut out = String::new();
    for &kind in KernelType::ALL.iter().filter(|kind| family.is_none_or(|f| f == **kind)) {
        let ids: Vec<KernelId> = KernelId::ALL.iter().copied().filter(|id| id.kernel_type() == kind).collect();
        if ids.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{kind}");
        for id in ids {
            let _ = writeln!(out, "  {:<40} {:e}", id.as_str(), id.priority());
        }
    }
    out
}

pub fn select(ctx: Arc<ComputeContext>, layer: &str, overrides: KernelOverrides) -> Result<String, CliError> {
    let Some(curated) = curated_layer(layer) else {
        let known: Vec<&str> = curated_layers().iter().map(|layer| layer.name).collect();
        return Err(CliError::UnknownLayer {
            name: layer.to_string(),
            known: known.join(", "),
        });
    };
    let params = curated.params;
    let family = params.kernel_type();
    let options = OptionalParams::for_engine(&ctx.engine);
    let selector = KernelSelector::new(family, ctx).with_overrides(overrides);

    let mut out = String::new();
    let _ = writeln!(out, "layer:     {layer} ({family})");
    let _ = writeln!(out, "signature: {params}");
    let chosen = match selector.select(&params, &options)? {
        Selection::NotSupported => {
            let _ = writeln!(out, "no registered kernel supports this layer");
            return Ok(out);
        }
        Selection::Selected(chosen) => chosen,
    };
    let _ = writeln!(out, "kernel:    {} ({:?}, {:e})", chosen.kernel, chosen.reason, chosen.effective_time);
    if let Some(size) = chosen.data.weights_reorder.new_buffer_size() {
        let _ = writeln!(out, "weights:   reordered into {size} bytes");
    }
    for cl in &chosen.data.kernels {
        let groups = cl.work_groups;
        let _ = writeln!(out, "entry:     {}", cl.kernel_string.entry_point);
        let _ = writeln!(out, "gws:       {:?}", groups.global);
        let _ = writeln!(out, "lws:       {:?}", groups.local);
        let _ = writeln!(out, "arguments: {:?}", cl.arguments);
        let _ = writeln!(out, "jit:\n{}", cl.kernel_string.jit);
    }
    Ok(out)
}

/// Rust source for the data file at `input`, also written to `output`
/// when given.
pub fn emit_table(input: &Path, output: Option<&Path>) -> Result<String, CliError> {
    let file = CostTableFile::load(input)?;
    let source = rust_source(&file, &known_signatures())?;
    if let Some(path) = output {
        fs::write(path, &source).map_err(|source| CliError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(input = %input.display(), output = %path.display(), kernels = file.kernels.len(), "cost table emitted");
    }
    Ok(source)
}

#[cfg(test)]
mod tests {
    use kselect::{CostEntry, signature_hash};

    use super::*;

    #[test]
    fn list_filters_by_family() {
        let pooling = list(Some(KernelType::Pooling));
        assert!(pooling.starts_with("pooling\n"));
        assert!(pooling.contains("pooling_gpu_ref"));
        assert!(!pooling.contains("convolution"));
        assert!(list(None).contains("fully_connected\n"));
    }

    #[test]
    fn select_prints_the_winner_and_its_launch() {
        let out = select(placeholder_context(CostTables::new()), "pool_avg", KernelOverrides::new()).unwrap();
        assert!(out.contains("kernel:    pooling_gpu_average_opt"));
        assert!(out.contains("gws:"));
        assert!(out.contains("#define"));
    }

    #[test]
    fn forced_kernels_show_up_in_the_output() {
        let overrides = KernelOverrides::new().force("pooling_gpu_ref");
        let out = select(placeholder_context(CostTables::new()), "pool_avg", overrides).unwrap();
        assert!(out.contains("kernel:    pooling_gpu_ref (Forced"));
    }

    #[test]
    fn unknown_layers_list_the_known_ones() {
        match select(placeholder_context(CostTables::new()), "conv9", KernelOverrides::new()) {
            Err(CliError::UnknownLayer { name, known }) => {
                assert_eq!(name, "conv9");
                assert!(known.contains("conv1"));
            }
            other => panic!("expected UnknownLayer, got {other:?}"),
        }
    }

    #[test]
    fn emit_table_writes_the_rust_source() {
        let dir = std::env::temp_dir();
        let input = dir.join(format!("kselect-cli-{}.json", std::process::id()));
        let output = dir.join(format!("kselect-cli-{}.rs", std::process::id()));
        let mut file = CostTableFile::new("gen9");
        let signature = curated_layer("prob").unwrap().params.to_string();
        file.record("softmax_gpu_ref", signature_hash(&signature), CostEntry::Measured(0.5));
        file.save(&input).unwrap();

        let source = emit_table(&input, Some(&output)).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), source);
        assert!(source.contains(&format!("// {signature}")));
        fs::remove_file(&input).unwrap();
        fs::remove_file(&output).unwrap();
    }
}
