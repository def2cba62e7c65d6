use nom::{IResult, Parser, combinator::map, number::complete::le_u32, sequence::pair};

/// Size in bytes of one index entry.
pub const INDEX_ENTRY_LEN: usize = 8;
/// Frame index value marking the entry that terminates the index.
pub const SENTINEL_FRAME_INDEX: u32 = u32::MAX;

/// A raw `(frame index, payload offset)` pair from the index table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Multiplied by the frame interval to get the presentation timestamp.
    pub frame_index: u32,
    /// Absolute file offset of the frame payload.
    pub offset: u32,
}

impl IndexEntry {
    /// The trailing entry whose offset marks the end of the last payload.
    #[must_use]
    pub const fn is_sentinel(&self) -> bool {
        self.frame_index == SENTINEL_FRAME_INDEX
    }
}

/// # Errors
///
/// Fails if `input` is shorter than [`INDEX_ENTRY_LEN`].
pub fn parse_index_entry(input: &[u8]) -> IResult<&[u8], IndexEntry> {
    map(pair(le_u32, le_u32), |(frame_index, offset)| IndexEntry {
        frame_index,
        offset,
    })
    .parse(input)
}
