use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(version, about)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Writes every thumbnail in a BIF file to its own JPEG file.
    Extract {
        /// The BIF file to read.
        #[clap(value_parser)]
        input: PathBuf,
        /// The directory to write frames into. Created if missing.
        #[clap(value_parser)]
        output: PathBuf,
        /// Leave out the last frame instead of reading it up to the index
        /// sentinel or end of file.
        #[clap(long)]
        skip_last: bool,
        /// Prefix for the output file names, followed by the frame number.
        #[clap(long, default_value = "frame_")]
        prefix: String,
        /// Overwrite files in a non-empty output directory without asking.
        #[clap(long, short)]
        force: bool,
    },
    /// Prints the header and frame table of a BIF file.
    Info {
        /// The BIF file to inspect.
        #[clap(value_parser)]
        input: PathBuf,
    },
    /// Prints the version of this tool.
    Version,
}
