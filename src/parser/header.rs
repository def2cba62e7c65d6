use nom::{
    IResult,
    Parser,
    bytes::complete::{tag, take},
    combinator::map,
    number::complete::le_u32,
};

/// The 8-byte signature every BIF file starts with.
pub const BIF_MAGIC: [u8; 8] = [0x89, b'B', b'I', b'F', 0x0d, 0x0a, 0x1a, 0x0a];
/// Total size of the fixed header, including the reserved tail.
pub const HEADER_LEN: usize = 64;
/// Bytes following the signature: three scalars and the reserved padding.
pub const HEADER_FIELDS_LEN: usize = HEADER_LEN - BIF_MAGIC.len();
const RESERVED_LEN: usize = HEADER_FIELDS_LEN - 3 * 4;

/// The scalar fields of a BIF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub frame_count: u32,
    /// Spacing between thumbnails, in milliseconds.
    ///
    /// A value of 0 is treated as 1000 by players, but we report it as
    /// stored.
    pub frame_interval: u32,
}

/// # Errors
///
/// Fails unless `input` starts with [`BIF_MAGIC`].
pub fn parse_magic(input: &[u8]) -> IResult<&[u8], ()> {
    map(tag(BIF_MAGIC.as_slice()), |_| ()).parse(input)
}

/// Parses the 56 bytes that follow the signature.
///
/// # Errors
///
/// Fails if `input` is shorter than [`HEADER_FIELDS_LEN`].
pub fn parse_header_fields(input: &[u8]) -> IResult<&[u8], Header> {
    let (input, version) = le_u32(input)?;
    let (input, frame_count) = le_u32(input)?;
    let (input, frame_interval) = le_u32(input)?;
    let (input, _reserved) = take(RESERVED_LEN).parse(input)?;
    Ok((input, Header {
        version,
        frame_count,
        frame_interval,
    }))
}
