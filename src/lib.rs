// src/lib.rs
pub mod config;
pub mod utils;
pub mod pipelines;
pub mod cli;
pub use cli::{Arguments, OrphanPolicy};
pub use config::defs::{MergeConfig, PipelineError};
pub use utils::merge::{append_fasta_files, MergeEngine, MergeStats};
