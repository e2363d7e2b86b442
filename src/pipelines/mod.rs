pub mod mag_db;
pub mod merge_fasta;
