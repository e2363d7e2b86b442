use std::path::PathBuf;
use std::sync::Arc;
use log::info;
use tokio::task;
use crate::config::defs::{MergeConfig, PipelineError, RunConfig};
use crate::utils::file::{list_fasta_files, reset_output, resolve_path};
use crate::utils::merge::append_fasta_files;


/// Expands the `--input` values: files are taken as given, directories
/// contribute their FASTA files in name order.
pub fn collect_inputs(config: &RunConfig) -> Result<Vec<PathBuf>, PipelineError> {
    let mut inputs = Vec::new();
    for raw in &config.args.inputs {
        let path = resolve_path(raw, &config.cwd);
        if path.is_dir() {
            inputs.extend(list_fasta_files(&path)?);
        } else {
            inputs.push(path);
        }
    }
    if inputs.is_empty() {
        return Err(PipelineError::EmptyInput("no FASTA inputs given (-i)".to_string()));
    }
    Ok(inputs)
}

/// Merges the `--input` FASTA files into `<out>/<merged_name>`.
pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    println!("\n-------------\n Merge FASTA\n-------------\n");

    let merge_config = MergeConfig::from_args(&config.args)?;
    let inputs = collect_inputs(&config)?;
    let merged_path = config.out_dir.join(&config.args.merged_name);

    if !config.args.append || !merged_path.exists() {
        reset_output(&merged_path)?;
    } else {
        info!("Appending to existing {}", merged_path.display());
    }

    info!(
        "Merging {} files (max sequence length {}, line width {})",
        inputs.len(), merge_config.threshold, merge_config.line_width
    );

    let output = merged_path.clone();
    let stats = task::spawn_blocking(move || append_fasta_files(&output, &inputs, &merge_config))
        .await
        .map_err(|e| PipelineError::IOError(format!("merge task failed: {}", e)))??;

    info!(
        "Wrote {}: {} files, {} records, {} split into {} parts, {} sequences total",
        merged_path.display(), stats.files, stats.records, stats.split_records, stats.chunks, stats.units
    );
    Ok(())
}
