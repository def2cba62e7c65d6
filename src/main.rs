#![deny(clippy::all)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::exit)]
#![warn(clippy::str_to_string)]
#![warn(clippy::use_debug)]
// For binary-only crates
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod cli;

use std::{
    env,
    fs,
    io::{self, IsTerminal},
    path::Path,
};

use anyhow::{Context, Result, bail};
use bifextract::{
    BifReader,
    ExtractOptions,
    LastFrame,
    extract::{extract, planned_frames},
};
use clap::Parser;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use crate::cli::{Args, Commands};

pub fn main() -> Result<()> {
    let filters = env::var("RUST_LOG").unwrap_or_else(|_| "error,bifextract=info".to_owned());
    pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Extract {
            input,
            output,
            skip_last,
            prefix,
            force,
        } => {
            if !force && has_entries(&output)? {
                if !io::stdin().is_terminal() {
                    bail!(
                        "Output directory {} is not empty; pass --force to overwrite",
                        output.display()
                    );
                }
                if !Confirm::new()
                    .with_prompt(format!(
                        "Directory {} is not empty. Overwrite existing frames?",
                        output.display()
                    ))
                    .interact()?
                {
                    eprintln!("Not overwriting existing files. Exiting.");
                    return Ok(());
                }
            }

            let mut reader = BifReader::open(&input)
                .with_context(|| format!("Failed to read BIF file {}", input.display()))?;
            info!("BIF Version: {}", reader.version());
            info!("Number of frames: {}", reader.frame_count());
            info!("Framewise Separation: {} ms", reader.frame_interval());

            let options = ExtractOptions {
                output_dir: output,
                last_frame: if skip_last {
                    LastFrame::Skip
                } else {
                    LastFrame::Extract
                },
                prefix,
            };

            let progress = ProgressBar::new(planned_frames(&reader, &options) as u64);
            progress.set_style(
                ProgressStyle::with_template(
                    "{spinner} [{elapsed_precise}] [{wide_bar}] {pos}/{len} frames",
                )?
                .progress_chars("#>-"),
            );
            let extraction = extract(&mut reader, &options, |_, _| progress.inc(1))
                .with_context(|| {
                    format!("Failed to extract frames into {}", options.output_dir.display())
                })?;
            progress.finish_and_clear();

            eprintln!(
                "Done, wrote {} frames ({} bytes) to {}",
                extraction.written.len(),
                extraction.bytes,
                options.output_dir.display()
            );
        }
        Commands::Info { input } => {
            let reader = BifReader::open(&input)
                .with_context(|| format!("Failed to read BIF file {}", input.display()))?;
            println!("BIF Version: {}", reader.version());
            println!("Number of frames: {}", reader.frame_count());
            println!("Framewise Separation: {} ms", reader.frame_interval());
            println!("{:>6} {:>12} {:>10} {:>8}", "frame", "timestamp", "offset", "length");
            for (k, frame) in reader.frames().iter().enumerate() {
                let length = reader
                    .payload_range(k)
                    .map_or_else(|_| "-".to_owned(), |range| (range.end - range.start).to_string());
                println!(
                    "{:>6} {:>9} ms {:>10} {:>8}",
                    k, frame.timestamp_ms, frame.offset, length
                );
            }
        }
        Commands::Version => {
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn has_entries(dir: &Path) -> Result<bool> {
    match fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_some()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to list {}", dir.display())),
    }
}
