use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BifError>;

/// Errors produced while reading a BIF file.
#[derive(Debug, Error)]
pub enum BifError {
    /// The first 8 bytes are not the BIF signature.
    #[error("not a BIF file: found signature {found:02x?}")]
    Format { found: Vec<u8> },

    /// A header field, index entry or payload runs past the end of the file.
    #[error(
        "file truncated while reading {what} at offset {offset}: needed {needed} bytes, {available} \
         available"
    )]
    Truncated {
        what: &'static str,
        offset: u64,
        needed: u64,
        available: u64,
    },

    /// Index entry `index` points before the entry preceding it.
    #[error("index entry {index} has offset {offset}, which precedes the previous offset {previous}")]
    UnorderedIndex {
        index: usize,
        offset: u32,
        previous: u32,
    },

    /// A payload offset points into the header or index region.
    #[error("frame payload at offset {offset} overlaps the index, which ends at {index_end}")]
    OverlappingPayload { offset: u32, index_end: u64 },

    #[error("frame {frame} is out of range, the file holds {count} frames")]
    FrameOutOfRange { frame: usize, count: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BifError {
    pub(crate) const fn truncated(what: &'static str, offset: u64, needed: u64, available: u64) -> Self {
        Self::Truncated {
            what,
            offset,
            needed,
            available,
        }
    }
}
