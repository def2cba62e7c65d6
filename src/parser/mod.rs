//! Parsers for the fixed-layout parts of a BIF file.
//!
//! These operate on byte slices that the reader has already pulled from the
//! source; they never perform I/O themselves.

pub mod header;
pub mod index;

pub use header::{BIF_MAGIC, HEADER_FIELDS_LEN, HEADER_LEN, Header, parse_header_fields, parse_magic};
pub use index::{INDEX_ENTRY_LEN, IndexEntry, SENTINEL_FRAME_INDEX, parse_index_entry};
