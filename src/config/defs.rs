use std::path::PathBuf;
use crate::cli::{Arguments, OrphanPolicy};
use lazy_static::lazy_static;
use std::collections::HashMap;
use thiserror::Error;

// External software
pub const GZIP_EXT: &str = "gz";
pub const CHECKM2_TAG: &str = "checkm2";
pub const DREP_TAG: &str = "dRep";
pub const GTDBTK_TAG: &str = "gtdbtk";
pub const BOWTIE2_BUILD_TAG: &str = "bowtie2-build";


lazy_static! {
    pub static ref TOOL_VERSIONS: HashMap<&'static str, f32> = {
        let mut m = HashMap::new();
        m.insert(CHECKM2_TAG, 1.0);
        m.insert(DREP_TAG, 3.4);
        m.insert(GTDBTK_TAG, 2.3);
        m.insert(BOWTIE2_BUILD_TAG, 2.4);

        m
    };
}

// Static Filenames
pub const CHECKM2_REPORT: &str = "quality_report.tsv";
pub const DREP_GENOMES_DIR: &str = "dereplicated_genomes";
pub const QUALITY_PASSED_LIST: &str = "quality_passed.txt";
pub const CHECKM2_DIR: &str = "checkm2";

// Quality report columns
pub const REPORT_NAME_COL: &str = "Name";
pub const REPORT_COMPLETENESS_COL: &str = "Completeness";
pub const REPORT_CONTAMINATION_COL: &str = "Contamination";

// Static Parameters
pub const DEFAULT_MAX_SEQ_LEN: usize = 30_000_000;
pub const DEFAULT_LINE_WIDTH: usize = 60;
pub const HEADER_MARKER: u8 = b'>';
pub const PROVENANCE_SEPARATOR: u8 = b'|';
pub const PART_SUFFIX: &str = "_part";

pub const FASTA_EXTS: &[&'static str] = &["fasta", "fa", "fna", "faa", "ffn", "frn"];


#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot read input {0}")]
    InputUnreadable(String),

    #[error("Output is not writable: {0}")]
    OutputNotWritable(String),

    #[error("{file}: sequence data on line {line} precedes the first header")]
    MalformedInput { file: String, line: usize },

    #[error("Invalid FASTA format: {0}")]
    InvalidFastaFormat(String),

    #[error("Duplicate output identifier: {0}")]
    DuplicateIdentifier(String),

    #[error("Provenance label '{0}' is shared by more than one input")]
    DuplicateLabel(String),

    #[error("No input: {0}")]
    EmptyInput(String),

    #[error("Failed to parse report: {0}")]
    ReportParse(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("{tool} failed: {error}")]
    ToolExecution { tool: String, error: String },

    #[error("I/O error: {0}")]
    IOError(String),
}


/// Settings consumed by the merge engine.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConfig {
    pub threshold: usize,
    pub line_width: usize,
    pub orphan_policy: OrphanPolicy,
    pub check_unique_ids: bool,
}

impl MergeConfig {
    /// Both `threshold` and `line_width` must be positive.
    pub fn new(threshold: usize, line_width: usize) -> Result<Self, PipelineError> {
        if threshold == 0 {
            return Err(PipelineError::InvalidConfig("max sequence length must be positive".to_string()));
        }
        if line_width == 0 {
            return Err(PipelineError::InvalidConfig("line width must be positive".to_string()));
        }
        Ok(MergeConfig {
            threshold,
            line_width,
            orphan_policy: OrphanPolicy::default(),
            check_unique_ids: false,
        })
    }

    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    pub fn with_unique_ids(mut self, check: bool) -> Self {
        self.check_unique_ids = check;
        self
    }

    pub fn from_args(args: &Arguments) -> Result<Self, PipelineError> {
        Ok(MergeConfig::new(args.max_seq_len, args.line_width)?
            .with_orphan_policy(args.orphan_lines)
            .with_unique_ids(args.unique_ids))
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            threshold: DEFAULT_MAX_SEQ_LEN,
            line_width: DEFAULT_LINE_WIDTH,
            orphan_policy: OrphanPolicy::default(),
            check_unique_ids: false,
        }
    }
}


pub struct RunConfig  {
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
    pub threads: usize,
    pub args: Arguments,
}
