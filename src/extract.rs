use std::{
    fs::{self, File},
    io::{BufWriter, Read, Seek, Write},
    path::{Path, PathBuf},
};

use log::{debug, warn};

use crate::{error::Result, reader::BifReader};

pub const DEFAULT_PREFIX: &str = "frame_";

/// What to do with the final frame, whose length the index alone does not
/// describe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LastFrame {
    /// Write it, ending at the index sentinel or at end of file.
    #[default]
    Extract,
    /// Leave it out.
    Skip,
}

/// Where and how frames are written.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub output_dir: PathBuf,
    pub last_frame: LastFrame,
    /// Prepended to the zero-based frame number in each file name.
    pub prefix: String,
}

impl ExtractOptions {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
            last_frame: LastFrame::default(),
            prefix: DEFAULT_PREFIX.to_owned(),
        }
    }

    #[must_use]
    pub fn frame_path(&self, k: usize) -> PathBuf {
        self.output_dir.join(frame_file_name(&self.prefix, k))
    }
}

/// Summary of a finished extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub written: Vec<PathBuf>,
    pub bytes: u64,
}

#[must_use]
pub fn frame_file_name(prefix: &str, k: usize) -> String {
    format!("{prefix}{k}.jpg")
}

/// The number of files `extract` will write for `reader` under `options`.
#[must_use]
pub fn planned_frames<R>(reader: &BifReader<R>, options: &ExtractOptions) -> usize {
    let count = reader.frames().len();
    match options.last_frame {
        LastFrame::Extract => count,
        LastFrame::Skip => count.saturating_sub(1),
    }
}

/// Writes every frame of `reader` into `options.output_dir`, creating it if
/// needed. `on_frame` is called after each file is written.
///
/// Stops at the first error. Files written before the error are left behind.
///
/// # Errors
///
/// Returns [`crate::BifError::Io`] if the directory or a file cannot be
/// written, and any error [`BifReader::copy_frame`] reports for a frame.
pub fn extract<R, F>(
    reader: &mut BifReader<R>,
    options: &ExtractOptions,
    mut on_frame: F,
) -> Result<Extraction>
where
    R: Read + Seek,
    F: FnMut(usize, &Path),
{
    fs::create_dir_all(&options.output_dir)?;

    let planned = planned_frames(reader, options);
    if planned < reader.frames().len() {
        warn!("Skipping the last frame");
    }

    let mut extraction = Extraction {
        written: Vec::with_capacity(planned),
        bytes: 0,
    };
    for k in 0..planned {
        // Don't leave an empty file behind for a payload we can't read.
        reader.payload_range(k)?;
        let path = options.frame_path(k);
        let mut output = BufWriter::new(File::create(&path)?);
        let bytes = reader.copy_frame(k, &mut output)?;
        output.flush()?;
        debug!("Wrote {} bytes to {}", bytes, path.display());

        on_frame(k, &path);
        extraction.bytes += bytes;
        extraction.written.push(path);
    }

    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_zero_based() {
        assert_eq!(frame_file_name(DEFAULT_PREFIX, 0), "frame_0.jpg");
        assert_eq!(frame_file_name("thumb-", 184), "thumb-184.jpg");
    }

    #[test]
    fn frame_path_joins_output_dir() {
        let options = ExtractOptions::new("out");
        assert_eq!(options.frame_path(3), Path::new("out").join("frame_3.jpg"));
        assert_eq!(options.last_frame, LastFrame::Extract);
    }
}
