use clap::{Parser, ValueEnum};

/// What to do with sequence lines that appear before the first FASTA header.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    #[default]
    Fail,
    Skip,
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "magdb-pipelines", version, about = "Maintains a MAG reference database")]
pub struct Arguments {

    #[arg(short, long, help = "Module to run: merge_fasta or update_db")]
    pub module: String,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(short = 'i', long = "input", num_args = 1.., help = "Input FASTA files (merge_fasta) or a directory of new genomes (update_db)")]
    pub inputs: Vec<String>,

    #[arg(short = 'o', long = "out", help = "Output directory for all generated files. If not specified, a directory named 'magdb_YYYYMMDD' will be created in the current working directory.")]
    pub out_dir: Option<String>,

    #[arg(long, default_value = "merged_genomes.fa")]
    pub merged_name: String,

    #[arg(long, default_value_t = false, help = "Append to an existing merged file instead of starting a new one")]
    pub append: bool,

    #[arg(long, default_value_t = 30_000_000, help = "Maximum residues per output sequence; longer records are split into _partN pieces")]
    pub max_seq_len: usize,

    #[arg(long, default_value_t = 60)]
    pub line_width: usize,

    #[arg(long = "orphan-lines", default_value = "fail", value_enum)]
    pub orphan_lines: OrphanPolicy,

    #[arg(long, default_value_t = false, help = "Fail if an output identifier is emitted twice")]
    pub unique_ids: bool,

    #[arg(long, default_value_t = 16)]
    pub threads: usize,

    #[arg(long, default_value_t = 50.0)]
    pub min_completeness: f64,

    #[arg(long, default_value_t = 10.0)]
    pub max_contamination: f64,

    #[clap(
        long,
        value_delimiter = ',',
        value_parser = clap::value_parser!(f64),
        default_value = "0.95,0.99",
        help = "Comma-separated list of ANI thresholds, one reference build each"
    )]
    pub ani: Vec<f64>,

    #[arg(long, help = "Directory of genomes from the previous reference, appended after the dereplicated set")]
    pub prior_genomes: Option<String>,

    #[arg(long, default_value = "fa")]
    pub extension: String,

    #[arg(long, default_value_t = false)]
    pub skip_classification: bool,

    #[arg(long, default_value_t = false)]
    pub skip_index: bool,
}
