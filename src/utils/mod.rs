pub mod command;
pub mod fasta;
pub mod file;
pub mod merge;
pub mod quality;
pub mod split;
pub mod streams;
pub mod system;
