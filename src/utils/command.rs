//! Functions and structs for building and running external tool command lines

use std::io;
use std::process::{ExitStatus, Stdio};

use anyhow::anyhow;
use log::{debug, info};
use tokio::process::Command;

use crate::config::defs::{PipelineError, RunConfig, BOWTIE2_BUILD_TAG, CHECKM2_TAG, DREP_TAG, GTDBTK_TAG, TOOL_VERSIONS};
use crate::utils::streams::{output_lines, read_child_output_to_vec};


pub mod checkm2 {
    use std::path::PathBuf;
    use crate::config::defs::RunConfig;

    #[derive(Debug, Clone)]
    pub struct CheckM2Config {
        pub input_dir: PathBuf,
        pub output_dir: PathBuf,
        pub extension: String,
    }

    pub fn arg_generator(run_config: &RunConfig, config: &CheckM2Config) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("predict".to_string());
        args_vec.push("--input".to_string());
        args_vec.push(config.input_dir.to_string_lossy().to_string());
        args_vec.push("--output-directory".to_string());
        args_vec.push(config.output_dir.to_string_lossy().to_string());
        args_vec.push("--threads".to_string());
        args_vec.push(run_config.threads.to_string());
        args_vec.push("-x".to_string());
        args_vec.push(config.extension.clone());
        args_vec.push("--force".to_string());
        args_vec
    }
}

pub mod drep {
    use std::path::PathBuf;
    use crate::config::defs::RunConfig;

    #[derive(Debug, Clone)]
    pub struct DRepConfig {
        pub work_dir: PathBuf,
        pub genomes: Vec<PathBuf>,
        pub ani: f64,
    }

    pub fn arg_generator(run_config: &RunConfig, config: &DRepConfig) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("dereplicate".to_string());
        args_vec.push(config.work_dir.to_string_lossy().to_string());
        args_vec.push("-p".to_string());
        args_vec.push(run_config.threads.to_string());
        args_vec.push("-sa".to_string());
        args_vec.push(config.ani.to_string());
        // Quality filtering has already happened upstream.
        args_vec.push("--ignoreGenomeQuality".to_string());
        args_vec.push("-g".to_string());
        for genome in &config.genomes {
            args_vec.push(genome.to_string_lossy().to_string());
        }
        args_vec
    }
}

pub mod gtdbtk {
    use std::path::PathBuf;
    use crate::config::defs::RunConfig;

    #[derive(Debug, Clone)]
    pub struct GtdbtkConfig {
        pub genome_dir: PathBuf,
        pub out_dir: PathBuf,
        pub extension: String,
    }

    pub fn arg_generator(run_config: &RunConfig, config: &GtdbtkConfig) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("classify_wf".to_string());
        args_vec.push("--genome_dir".to_string());
        args_vec.push(config.genome_dir.to_string_lossy().to_string());
        args_vec.push("--out_dir".to_string());
        args_vec.push(config.out_dir.to_string_lossy().to_string());
        args_vec.push("--cpus".to_string());
        args_vec.push(run_config.threads.to_string());
        args_vec.push("-x".to_string());
        args_vec.push(config.extension.clone());
        args_vec.push("--skip_ani_screen".to_string());
        args_vec
    }
}

pub mod bowtie2_build {
    use std::path::PathBuf;
    use crate::config::defs::RunConfig;

    #[derive(Debug, Clone)]
    pub struct Bowtie2BuildConfig {
        pub reference: PathBuf,
        pub index_prefix: PathBuf,
    }

    pub fn arg_generator(run_config: &RunConfig, config: &Bowtie2BuildConfig) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("--threads".to_string());
        args_vec.push(run_config.threads.to_string());
        args_vec.push(config.reference.to_string_lossy().to_string());
        args_vec.push(config.index_prefix.to_string_lossy().to_string());
        args_vec
    }
}


/// Per-tool settings, one variant per external tool.
#[derive(Debug, Clone)]
pub enum ToolConfig {
    CheckM2(checkm2::CheckM2Config),
    DRep(drep::DRepConfig),
    Gtdbtk(gtdbtk::GtdbtkConfig),
    Bowtie2Build(bowtie2_build::Bowtie2BuildConfig),
}

impl ToolConfig {
    pub fn tag(&self) -> &'static str {
        match self {
            ToolConfig::CheckM2(_) => CHECKM2_TAG,
            ToolConfig::DRep(_) => DREP_TAG,
            ToolConfig::Gtdbtk(_) => GTDBTK_TAG,
            ToolConfig::Bowtie2Build(_) => BOWTIE2_BUILD_TAG,
        }
    }
}

pub fn generate_cli(run_config: &RunConfig, tool_config: &ToolConfig) -> Vec<String> {
    match tool_config {
        ToolConfig::CheckM2(c) => checkm2::arg_generator(run_config, c),
        ToolConfig::DRep(c) => drep::arg_generator(run_config, c),
        ToolConfig::Gtdbtk(c) => gtdbtk::arg_generator(run_config, c),
        ToolConfig::Bowtie2Build(c) => bowtie2_build::arg_generator(run_config, c),
    }
}


/// Exit status and captured stderr of a finished tool.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stderr: Vec<String>,
}

impl ToolOutput {
    /// Last few stderr lines, for error messages.
    pub fn stderr_tail(&self, n: usize) -> String {
        let start = self.stderr.len().saturating_sub(n);
        self.stderr[start..].join("\n")
    }
}

/// Runs a tool to completion. A non-zero exit is returned in `ToolOutput`,
/// not as an error; callers decide whether it is fatal.
pub async fn run_tool(run_config: &RunConfig, tool_config: &ToolConfig) -> Result<ToolOutput, PipelineError> {
    let tool = tool_config.tag();
    let args = generate_cli(run_config, tool_config);
    info!("Running {} {}", tool, args.join(" "));

    let output = Command::new(tool)
        .args(&args)
        .current_dir(&run_config.out_dir)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| spawn_error(tool, e))?;

    let stderr = output_lines(&output.stderr);
    for line in &stderr {
        debug!("[{}] {}", tool, line);
    }
    Ok(ToolOutput { status: output.status, stderr })
}

fn spawn_error(tool: &str, e: io::Error) -> PipelineError {
    if e.kind() == io::ErrorKind::NotFound {
        PipelineError::ToolNotFound(format!("{}. Is it installed and on PATH?", tool))
    } else {
        PipelineError::ToolExecution {
            tool: tool.to_string(),
            error: e.to_string(),
        }
    }
}


/// Pulls a `major.minor` number out of a version banner such as
/// `gtdbtk: version 2.4.0 Copyright ...` or `dRep v3.5.0`.
pub fn parse_version_number(banner: &str) -> Option<f32> {
    banner.split_whitespace().find_map(|token| {
        let token = token.trim_start_matches(['v', 'V']);
        if !token.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        let mut parts = token.split('.');
        let major = parts.next()?;
        let minor: String = parts
            .next()
            .unwrap_or("0")
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        format!("{}.{}", major, if minor.is_empty() { "0" } else { minor.as_str() }).parse().ok()
    })
}

/// Runs `<tool> --version` and returns the first version banner line.
pub async fn check_version(tool: &str) -> anyhow::Result<String> {
    let mut child = Command::new(tool)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| anyhow!("Failed to spawn {}: {}. Is {} installed?", tool, e, tool))?;

    // Some tools print their banner on stderr.
    let (mut lines, stderr) = read_child_output_to_vec(&mut child).await?;
    lines.extend(stderr);

    lines
        .into_iter()
        .find(|line| parse_version_number(line).is_some())
        .ok_or_else(|| anyhow!("No version found in {} --version output", tool))
}

/// Verifies every tool is installed and at least the version in `TOOL_VERSIONS`.
pub async fn check_versions(tools: &[&str]) -> Result<(), PipelineError> {
    for &tool in tools {
        let banner = check_version(tool)
            .await
            .map_err(|e| PipelineError::ToolNotFound(e.to_string()))?;
        let found = parse_version_number(&banner).unwrap_or(0.0);
        let required = TOOL_VERSIONS.get(tool).copied().unwrap_or(0.0);
        if found < required {
            return Err(PipelineError::ToolExecution {
                tool: tool.to_string(),
                error: format!("version {} found, {} or newer required", found, required),
            });
        }
        info!("{} version {} OK", tool, found);
    }
    Ok(())
}
