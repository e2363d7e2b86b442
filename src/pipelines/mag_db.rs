use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::try_join_all;
use log::{info, warn};
use tokio::task;

use crate::config::defs::{
    MergeConfig, PipelineError, RunConfig, BOWTIE2_BUILD_TAG, CHECKM2_DIR, CHECKM2_REPORT, CHECKM2_TAG,
    DREP_GENOMES_DIR, DREP_TAG, GTDBTK_TAG, QUALITY_PASSED_LIST,
};
use crate::utils::command::bowtie2_build::Bowtie2BuildConfig;
use crate::utils::command::checkm2::CheckM2Config;
use crate::utils::command::drep::DRepConfig;
use crate::utils::command::gtdbtk::GtdbtkConfig;
use crate::utils::command::{check_versions, run_tool, ToolConfig, ToolOutput};
use crate::utils::file::{list_fasta_files, reset_output, resolve_path};
use crate::utils::merge::{MergeEngine, MergeStats};
use crate::utils::quality::{read_quality_report, select_passing};


/// Outcome of one reference build.
#[derive(Debug)]
pub struct ReferenceBuild {
    pub ani: f64,
    pub dereplicated: usize,
    pub merged_fasta: PathBuf,
    pub index_prefix: Option<PathBuf>,
    pub stats: MergeStats,
}

/// Directory name for the build at one ANI threshold, e.g. `ani_0.95`.
pub fn build_dir_name(ani: f64) -> String {
    format!("ani_{}", ani)
}

fn validate_ani(thresholds: &[f64]) -> Result<(), PipelineError> {
    if thresholds.is_empty() {
        return Err(PipelineError::InvalidConfig("at least one --ani threshold is required".to_string()));
    }
    if let Some(bad) = thresholds.iter().find(|&&a| !(a > 0.0 && a <= 1.0)) {
        return Err(PipelineError::InvalidConfig(format!("ANI threshold {} must be in (0, 1]", bad)));
    }
    Ok(())
}

fn required_tools(config: &RunConfig) -> Vec<&'static str> {
    let mut tools = vec![CHECKM2_TAG, DREP_TAG];
    if !config.args.skip_classification {
        tools.push(GTDBTK_TAG);
    }
    if !config.args.skip_index {
        tools.push(BOWTIE2_BUILD_TAG);
    }
    tools
}

fn tool_failure(tool: &str, output: &ToolOutput) -> PipelineError {
    PipelineError::ToolExecution {
        tool: tool.to_string(),
        error: format!("exited with {}: {}", output.status, output.stderr_tail(5)),
    }
}


/// Quality-filters the new genomes, then builds one reference per ANI threshold.
pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    println!("\n-------------\n MAG DB Update\n-------------\n");

    let merge_config = MergeConfig::from_args(&config.args)?;
    validate_ani(&config.args.ani)?;

    let new_dir = config
        .args
        .inputs
        .first()
        .map(|raw| resolve_path(raw, &config.cwd))
        .ok_or_else(|| PipelineError::EmptyInput("new genome directory required (-i)".to_string()))?;

    check_versions(&required_tools(&config)).await?;

    let new_genomes = list_fasta_files(&new_dir)?;
    if new_genomes.is_empty() {
        return Err(PipelineError::EmptyInput(format!("no FASTA files in {}", new_dir.display())));
    }
    info!("Found {} new genomes in {}", new_genomes.len(), new_dir.display());

    let passing = quality_filter(&config, &new_dir, &new_genomes).await?;

    let prior_genomes = match &config.args.prior_genomes {
        Some(dir) => list_fasta_files(&resolve_path(dir, &config.cwd))?,
        None => Vec::new(),
    };
    info!("{} prior reference genomes", prior_genomes.len());

    // Each threshold writes its own merged file, so builds share nothing mutable.
    let builds = config.args.ani.iter().map(|&ani| {
        build_reference(
            config.clone(),
            ani,
            passing.clone(),
            prior_genomes.clone(),
            merge_config.clone(),
        )
    });
    let results = try_join_all(builds).await?;

    for build in &results {
        info!(
            "ANI {}: {} dereplicated genomes, {} sequences in {}{}",
            build.ani,
            build.dereplicated,
            build.stats.units,
            build.merged_fasta.display(),
            build
                .index_prefix
                .as_ref()
                .map(|p| format!(", index {}", p.display()))
                .unwrap_or_default()
        );
    }
    Ok(())
}

async fn quality_filter(
    config: &RunConfig,
    new_dir: &Path,
    new_genomes: &[PathBuf],
) -> Result<Vec<PathBuf>, PipelineError> {
    let checkm2_dir = config.out_dir.join(CHECKM2_DIR);
    let checkm2 = ToolConfig::CheckM2(CheckM2Config {
        input_dir: new_dir.to_path_buf(),
        output_dir: checkm2_dir.clone(),
        extension: config.args.extension.clone(),
    });
    let output = run_tool(config, &checkm2).await?;
    if !output.status.success() {
        return Err(tool_failure(CHECKM2_TAG, &output));
    }

    let report = read_quality_report(&checkm2_dir.join(CHECKM2_REPORT)).await?;
    let passing = select_passing(
        &report,
        new_genomes,
        config.args.min_completeness,
        config.args.max_contamination,
    );
    if passing.is_empty() {
        return Err(PipelineError::EmptyInput("no genomes passed quality filtering".to_string()));
    }

    let listing: String = passing.iter().map(|p| format!("{}\n", p.display())).collect();
    tokio::fs::write(config.out_dir.join(QUALITY_PASSED_LIST), listing)
        .await
        .map_err(|e| PipelineError::IOError(e.to_string()))?;
    Ok(passing)
}

/// Dereplicates, classifies, merges and indexes at one ANI threshold.
async fn build_reference(
    config: Arc<RunConfig>,
    ani: f64,
    genomes: Vec<PathBuf>,
    prior_genomes: Vec<PathBuf>,
    merge_config: MergeConfig,
) -> Result<ReferenceBuild, PipelineError> {
    let build_dir = config.out_dir.join(build_dir_name(ani));
    tokio::fs::create_dir_all(&build_dir)
        .await
        .map_err(|e| PipelineError::IOError(format!("{}: {}", build_dir.display(), e)))?;

    // Dereplication
    let drep_dir = build_dir.join("drep");
    let drep = ToolConfig::DRep(DRepConfig {
        work_dir: drep_dir.clone(),
        genomes,
        ani,
    });
    let output = run_tool(&config, &drep).await?;
    let derep_dir = drep_dir.join(DREP_GENOMES_DIR);
    let dereplicated = if derep_dir.is_dir() {
        list_fasta_files(&derep_dir)?
    } else {
        Vec::new()
    };
    if !output.status.success() {
        // dRep's plotting stage can fail after the genome set is written.
        if dereplicated.is_empty() {
            return Err(tool_failure(DREP_TAG, &output));
        }
        warn!(
            "dRep exited with {} at ANI {} but wrote {} genomes; continuing",
            output.status, ani, dereplicated.len()
        );
    }
    if dereplicated.is_empty() {
        return Err(PipelineError::EmptyInput(format!("dRep produced no genomes at ANI {}", ani)));
    }

    // Classification
    if !config.args.skip_classification {
        let gtdbtk = ToolConfig::Gtdbtk(GtdbtkConfig {
            genome_dir: derep_dir.clone(),
            out_dir: build_dir.join("gtdbtk"),
            extension: config.args.extension.clone(),
        });
        let output = run_tool(&config, &gtdbtk).await?;
        if !output.status.success() {
            return Err(tool_failure(GTDBTK_TAG, &output));
        }
    }

    // Merged reference
    let merged_fasta = build_dir.join(&config.args.merged_name);
    reset_output(&merged_fasta)?;
    let dereplicated_count = dereplicated.len();
    let output_path = merged_fasta.clone();
    let stats = task::spawn_blocking(move || -> Result<MergeStats, PipelineError> {
        let mut engine = MergeEngine::open(&output_path, merge_config)?;
        let derep_stats = engine.append_files(&dereplicated)?;
        info!("Added {} dereplicated genomes to {}", derep_stats.files, output_path.display());
        engine.append_files(&prior_genomes)?;
        engine.finish()
    })
    .await
    .map_err(|e| PipelineError::IOError(format!("merge task failed: {}", e)))??;

    // Index
    let index_prefix = if config.args.skip_index {
        None
    } else {
        let prefix = build_dir.join("reference");
        let bowtie2_build = ToolConfig::Bowtie2Build(Bowtie2BuildConfig {
            reference: merged_fasta.clone(),
            index_prefix: prefix.clone(),
        });
        let output = run_tool(&config, &bowtie2_build).await?;
        if !output.status.success() {
            return Err(tool_failure(BOWTIE2_BUILD_TAG, &output));
        }
        Some(prefix)
    };

    Ok(ReferenceBuild {
        ani,
        dereplicated: dereplicated_count,
        merged_fasta,
        index_prefix,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Arguments;

    #[test]
    fn test_validate_ani() {
        assert!(validate_ani(&[0.95, 0.99]).is_ok());
        assert!(validate_ani(&[1.0]).is_ok());
        assert!(matches!(validate_ani(&[]), Err(PipelineError::InvalidConfig(_))));
        assert!(matches!(validate_ani(&[0.0]), Err(PipelineError::InvalidConfig(_))));
        assert!(matches!(validate_ani(&[95.0]), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_dir_name() {
        assert_eq!(build_dir_name(0.95), "ani_0.95");
        assert_eq!(build_dir_name(0.99), "ani_0.99");
    }

    #[test]
    fn test_required_tools() {
        let mut args = Arguments::default();
        args.skip_index = true;
        let config = RunConfig {
            cwd: PathBuf::from("."),
            out_dir: PathBuf::from("."),
            threads: 1,
            args,
        };
        assert_eq!(required_tools(&config), vec![CHECKM2_TAG, DREP_TAG, GTDBTK_TAG]);
    }
}
