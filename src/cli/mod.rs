pub mod args;

use clap::Parser;

pub use args::{Arguments, OrphanPolicy};

pub fn parse() -> Arguments {
    Arguments::parse()
}
