use std::{
    fs::File,
    io::{self, BufReader, Read, Seek, SeekFrom, Write},
    ops::Range,
    path::Path,
    time::Duration,
};

use log::debug;
use nom::{Finish, Parser, multi::count};

use crate::{
    error::{BifError, Result},
    parser::{
        BIF_MAGIC,
        HEADER_FIELDS_LEN,
        HEADER_LEN,
        Header,
        INDEX_ENTRY_LEN,
        IndexEntry,
        parse_header_fields,
        parse_index_entry,
        parse_magic,
    },
};

/// A thumbnail located through the index table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// The raw value stored in the index.
    pub frame_index: u32,
    /// `frame_index * frame_interval`, in milliseconds.
    pub timestamp_ms: u64,
    /// Absolute file offset of the JPEG payload.
    pub offset: u32,
}

impl Frame {
    #[must_use]
    pub const fn timestamp(&self) -> Duration {
        Duration::from_millis(self.timestamp_ms)
    }
}

/// Reads the header and index of a BIF file and extracts frame payloads
/// on demand.
///
/// Every read seeks to an absolute offset first, so calls may be made in any
/// order once construction has validated the file.
pub struct BifReader<R> {
    source: R,
    len: u64,
    header: Header,
    frames: Vec<Frame>,
    /// Where the last payload ends: the sentinel offset, or end of file.
    payload_end: u64,
}

struct Index {
    frames: Vec<Frame>,
    payload_end: u64,
}

impl BifReader<BufReader<File>> {
    /// Opens the file at `path` and reads it with [`BifReader::new`].
    ///
    /// # Errors
    ///
    /// Returns [`BifError::Io`] if the file cannot be opened, and otherwise
    /// fails the same way as [`BifReader::new`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> BifReader<R> {
    /// Validates the signature, then reads the header and index eagerly.
    ///
    /// # Errors
    ///
    /// - [`BifError::Format`] if the first 8 bytes are not the BIF signature.
    /// - [`BifError::Truncated`] if the header or index runs past the end of
    ///   the source.
    /// - [`BifError::UnorderedIndex`] or [`BifError::OverlappingPayload`] for a
    ///   malformed index.
    /// - [`BifError::Io`] if seeking or reading fails.
    pub fn new(mut source: R) -> Result<Self> {
        let len = source.seek(SeekFrom::End(0))?;

        let signature_len = len.min(BIF_MAGIC.len() as u64) as usize;
        let signature = read_at(&mut source, len, 0, signature_len, "signature")?;
        if parse_magic(&signature).finish().is_err() {
            return Err(BifError::Format { found: signature });
        }

        let offset = BIF_MAGIC.len() as u64;
        let fields = read_at(&mut source, len, offset, HEADER_FIELDS_LEN, "header")?;
        let (_, header) = parse_header_fields(&fields).finish().map_err(|e| {
            BifError::truncated(
                "header",
                offset,
                HEADER_FIELDS_LEN as u64,
                e.input.len() as u64,
            )
        })?;
        debug!(
            "BIF header: version {}, {} frames, {} ms apart",
            header.version, header.frame_count, header.frame_interval
        );

        let Index {
            frames,
            payload_end,
        } = read_index(&mut source, len, &header)?;

        Ok(Self {
            source,
            len,
            header,
            frames,
            payload_end,
        })
    }

    /// Reads the index table from the source again.
    ///
    /// Yields the same frames as [`BifReader::frames`] as long as the
    /// underlying file has not changed.
    ///
    /// # Errors
    ///
    /// Fails like [`BifReader::new`] does for the index.
    pub fn read_index(&mut self) -> Result<Vec<Frame>> {
        Ok(read_index(&mut self.source, self.len, &self.header)?.frames)
    }

    /// The byte range of frame `k`'s payload.
    ///
    /// # Errors
    ///
    /// Returns [`BifError::FrameOutOfRange`] for a `k` past the last frame and
    /// [`BifError::Truncated`] if the payload does not lie within the source.
    pub fn payload_range(&self, k: usize) -> Result<Range<u64>> {
        let frame = self.frames.get(k).ok_or(BifError::FrameOutOfRange {
            frame: k,
            count: self.frames.len(),
        })?;
        let start = u64::from(frame.offset);
        let end = self
            .frames
            .get(k + 1)
            .map_or(self.payload_end, |next| u64::from(next.offset));
        if start > self.len || end > self.len {
            return Err(BifError::truncated(
                "frame payload",
                start,
                end.saturating_sub(start),
                self.len.saturating_sub(start),
            ));
        }
        Ok(start..end)
    }

    /// Streams the payload of frame `k` into `sink`, returning the number of
    /// bytes written.
    ///
    /// # Errors
    ///
    /// Fails like [`BifReader::payload_range`], with [`BifError::Truncated`]
    /// if the source ends early, or with [`BifError::Io`] if reading or
    /// writing fails.
    pub fn copy_frame<W: Write + ?Sized>(&mut self, k: usize, sink: &mut W) -> Result<u64> {
        let range = self.payload_range(k)?;
        let needed = range.end - range.start;
        self.source.seek(SeekFrom::Start(range.start))?;
        let copied = io::copy(&mut (&mut self.source).take(needed), sink)?;
        if copied < needed {
            return Err(BifError::truncated(
                "frame payload",
                range.start,
                needed,
                copied,
            ));
        }
        debug!("Copied frame {} ({} bytes at {})", k, copied, range.start);
        Ok(copied)
    }

    /// Reads the payload of frame `k` into memory.
    ///
    /// # Errors
    ///
    /// Fails like [`BifReader::copy_frame`].
    pub fn read_frame(&mut self, k: usize) -> Result<Vec<u8>> {
        let range = self.payload_range(k)?;
        let mut buf = Vec::with_capacity((range.end - range.start) as usize);
        self.copy_frame(k, &mut buf)?;
        Ok(buf)
    }
}

impl<R> BifReader<R> {
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }

    #[must_use]
    pub const fn version(&self) -> u32 {
        self.header.version
    }

    #[must_use]
    pub const fn frame_count(&self) -> u32 {
        self.header.frame_count
    }

    /// Milliseconds between consecutive thumbnails.
    #[must_use]
    pub const fn frame_interval(&self) -> u32 {
        self.header.frame_interval
    }

    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Length of the underlying source in bytes.
    #[must_use]
    pub const fn source_len(&self) -> u64 {
        self.len
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}

fn read_index<R: Read + Seek>(source: &mut R, len: u64, header: &Header) -> Result<Index> {
    let frame_count = header.frame_count as usize;
    let index_start = HEADER_LEN as u64;
    let index_len = u64::from(header.frame_count) * INDEX_ENTRY_LEN as u64;
    let index_end = index_start + index_len;
    let available = len.saturating_sub(index_start);
    if available < index_len {
        return Err(BifError::truncated(
            "index",
            index_start,
            index_len,
            available,
        ));
    }

    let bytes = read_at(source, len, index_start, index_len as usize, "index")?;
    let (_, entries) = count(parse_index_entry, frame_count)
        .parse(bytes.as_slice())
        .finish()
        .map_err(|e| BifError::truncated("index", index_start, index_len, e.input.len() as u64))?;

    let sentinel = if len.saturating_sub(index_end) >= INDEX_ENTRY_LEN as u64 {
        let bytes = read_at(source, len, index_end, INDEX_ENTRY_LEN, "index sentinel")?;
        parse_index_entry(&bytes)
            .finish()
            .ok()
            .map(|(_, entry)| entry)
            .filter(IndexEntry::is_sentinel)
    } else {
        None
    };
    let payload_floor = if sentinel.is_some() {
        index_end + INDEX_ENTRY_LEN as u64
    } else {
        index_end
    };

    let mut frames: Vec<Frame> = Vec::with_capacity(frame_count);
    for (i, entry) in entries.iter().enumerate() {
        match frames.last() {
            None if u64::from(entry.offset) < payload_floor => {
                return Err(BifError::OverlappingPayload {
                    offset: entry.offset,
                    index_end: payload_floor,
                });
            }
            Some(previous) if entry.offset < previous.offset => {
                return Err(BifError::UnorderedIndex {
                    index: i,
                    offset: entry.offset,
                    previous: previous.offset,
                });
            }
            _ => (),
        }
        frames.push(Frame {
            frame_index: entry.frame_index,
            timestamp_ms: u64::from(entry.frame_index) * u64::from(header.frame_interval),
            offset: entry.offset,
        });
    }

    let payload_end = match (sentinel, frames.last()) {
        (Some(sentinel), Some(last)) if sentinel.offset < last.offset => {
            return Err(BifError::UnorderedIndex {
                index: frame_count,
                offset: sentinel.offset,
                previous: last.offset,
            });
        }
        (Some(sentinel), _) => u64::from(sentinel.offset),
        (None, _) => len,
    };
    debug!(
        "Read {} index entries, payloads end at {} ({})",
        frames.len(),
        payload_end,
        if sentinel.is_some() {
            "sentinel"
        } else {
            "end of file"
        }
    );

    Ok(Index {
        frames,
        payload_end,
    })
}

/// Seeks to `offset` and reads exactly `count` bytes of the `len`-byte source.
fn read_at<R: Read + Seek>(
    source: &mut R,
    len: u64,
    offset: u64,
    count: usize,
    what: &'static str,
) -> Result<Vec<u8>> {
    let needed = count as u64;
    let available = len.saturating_sub(offset);
    if available < needed {
        return Err(BifError::truncated(what, offset, needed, available));
    }

    source.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0; count];
    source.read_exact(&mut buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            BifError::truncated(what, offset, needed, available)
        } else {
            BifError::Io(e)
        }
    })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use quickcheck_macros::quickcheck;

    use super::*;

    const JPEG_START: [u8; 4] = [0xff, 0xd8, 0xff, 0xe0];

    /// Lays out a BIF with one payload per entry of `lengths`.
    fn build(interval: u32, lengths: &[usize], sentinel: bool) -> Vec<u8> {
        let count = lengths.len();
        let mut out = Vec::new();
        out.extend_from_slice(&BIF_MAGIC);
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(count as u32).to_le_bytes());
        out.extend_from_slice(&interval.to_le_bytes());
        out.resize(HEADER_LEN, 0);

        let entries = count + usize::from(sentinel);
        let mut offset = HEADER_LEN + entries * INDEX_ENTRY_LEN;
        for (i, len) in lengths.iter().enumerate() {
            out.extend_from_slice(&(i as u32 + 1).to_le_bytes());
            out.extend_from_slice(&(offset as u32).to_le_bytes());
            offset += len;
        }
        if sentinel {
            out.extend_from_slice(&u32::MAX.to_le_bytes());
            out.extend_from_slice(&(offset as u32).to_le_bytes());
        }
        for (i, &len) in lengths.iter().enumerate() {
            if len >= JPEG_START.len() {
                out.extend_from_slice(&JPEG_START);
                out.resize(out.len() + len - JPEG_START.len(), i as u8);
            } else {
                out.resize(out.len() + len, i as u8);
            }
        }
        out
    }

    fn reader(bytes: Vec<u8>) -> Result<BifReader<Cursor<Vec<u8>>>> {
        BifReader::new(Cursor::new(bytes))
    }

    fn set_offset(bytes: &mut [u8], entry: usize, offset: u32) {
        let at = HEADER_LEN + entry * INDEX_ENTRY_LEN + 4;
        bytes[at..at + 4].copy_from_slice(&offset.to_le_bytes());
    }

    #[test]
    fn reads_header() {
        let bif = reader(build(1000, &[10, 20, 30], true)).unwrap();
        assert_eq!(bif.version(), 0);
        assert_eq!(bif.frame_count(), 3);
        assert_eq!(bif.frame_interval(), 1000);
        assert_eq!(bif.frames().len(), 3);
    }

    #[test]
    fn timestamps_scale_with_interval() {
        let bif = reader(build(250, &[4, 4, 4], true)).unwrap();
        let timestamps: Vec<u64> = bif.frames().iter().map(|f| f.timestamp_ms).collect();
        assert_eq!(timestamps, [250, 500, 750]);
        assert_eq!(bif.frames()[2].timestamp(), Duration::from_millis(750));
    }

    #[test]
    fn rejects_bad_signature_before_header() {
        // Too short to hold a header: a format error must win over truncation.
        let err = reader(b"GIF89a".to_vec()).err().unwrap();
        assert!(matches!(err, BifError::Format { .. }));

        let mut bytes = build(1000, &[8], true);
        bytes[0] = b'B';
        bytes[1] = b'I';
        bytes[2] = b'F';
        let err = reader(bytes).err().unwrap();
        assert!(matches!(err, BifError::Format { .. }));
    }

    #[test]
    fn rejects_truncated_header() {
        let bytes = build(1000, &[], false);
        let err = reader(bytes[..20].to_vec()).err().unwrap();
        assert!(matches!(err, BifError::Truncated { what: "header", .. }));
    }

    #[test]
    fn rejects_truncated_index() {
        let bytes = build(1000, &[8, 8, 8], false);
        let cut = HEADER_LEN + 2 * INDEX_ENTRY_LEN + 3;
        let err = reader(bytes[..cut].to_vec()).err().unwrap();
        match err {
            BifError::Truncated {
                what,
                offset,
                needed,
                available,
            } => {
                assert_eq!(what, "index");
                assert_eq!(offset, HEADER_LEN as u64);
                assert_eq!(needed, 24);
                assert_eq!(available, 19);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_unordered_offsets() {
        let mut bytes = build(1000, &[8, 8, 8], true);
        set_offset(&mut bytes, 2, 100);
        let err = reader(bytes).err().unwrap();
        assert!(matches!(err, BifError::UnorderedIndex { index: 2, .. }));
    }

    #[test]
    fn rejects_payload_inside_index() {
        let mut bytes = build(1000, &[8, 8], true);
        set_offset(&mut bytes, 0, 70);
        let err = reader(bytes).err().unwrap();
        assert!(matches!(err, BifError::OverlappingPayload { offset: 70, .. }));
    }

    #[test]
    fn rejects_payload_inside_index_without_sentinel() {
        let mut bytes = build(1000, &[8, 8], false);
        // Index ends at 80 when there is no sentinel.
        set_offset(&mut bytes, 0, 79);
        let err = reader(bytes).err().unwrap();
        assert!(matches!(err, BifError::OverlappingPayload {
            offset: 79,
            index_end: 80
        }));

        let mut bytes = build(1000, &[8, 8], false);
        set_offset(&mut bytes, 0, 80);
        assert!(reader(bytes).is_ok());
    }

    #[test]
    fn rejects_sentinel_before_last_frame() {
        let mut bytes = build(1000, &[8, 8, 8], true);
        // The sentinel is the entry right after the three frames.
        set_offset(&mut bytes, 3, 110);
        let err = reader(bytes).err().unwrap();
        assert!(matches!(err, BifError::UnorderedIndex {
            index: 3,
            offset: 110,
            previous: 112
        }));
    }

    #[test]
    fn last_offset_past_end_is_truncated() {
        let mut bytes = build(1000, &[4], false);
        set_offset(&mut bytes, 0, 5000);
        let mut bif = reader(bytes).unwrap();
        let err = bif.read_frame(0).err().unwrap();
        match err {
            BifError::Truncated {
                what,
                offset,
                available,
                ..
            } => {
                assert_eq!(what, "frame payload");
                assert_eq!(offset, 5000);
                assert_eq!(available, 0);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(bif.copy_frame(0, &mut io::sink()).is_err());
    }

    #[test]
    fn equal_offsets_are_empty_frames() {
        let bif = reader(build(1000, &[8, 0, 8], true)).unwrap();
        let range = bif.payload_range(1).unwrap();
        assert_eq!(range.start, range.end);
    }

    #[test]
    fn last_frame_ends_at_sentinel() {
        let mut bytes = build(1000, &[10, 12], true);
        // Trailing bytes after the sentinel offset are not part of the payload.
        bytes.extend_from_slice(&[0u8; 5]);
        let mut bif = reader(bytes).unwrap();
        assert_eq!(bif.read_frame(1).unwrap().len(), 12);
    }

    #[test]
    fn last_frame_runs_to_end_without_sentinel() {
        let mut bif = reader(build(1000, &[10, 12], false)).unwrap();
        let payload = bif.read_frame(1).unwrap();
        assert_eq!(payload.len(), 12);
        assert_eq!(&payload[..4], &JPEG_START);
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let bytes = build(1000, &[10, 12, 14], true);
        let cut = bytes.len() - 20;
        let mut bif = reader(bytes[..cut].to_vec()).unwrap();
        assert_eq!(bif.read_frame(0).unwrap().len(), 10);
        let err = bif.read_frame(1).err().unwrap();
        assert!(matches!(err, BifError::Truncated {
            what: "frame payload",
            ..
        }));
    }

    #[test]
    fn out_of_range_frame() {
        let mut bif = reader(build(1000, &[10], true)).unwrap();
        let err = bif.read_frame(1).err().unwrap();
        assert!(matches!(err, BifError::FrameOutOfRange {
            frame: 1,
            count: 1
        }));
    }

    #[test]
    fn reads_are_order_independent() {
        let mut bif = reader(build(1000, &[5, 6, 7], true)).unwrap();
        let last = bif.read_frame(2).unwrap();
        let first = bif.read_frame(0).unwrap();
        assert_eq!(bif.read_frame(2).unwrap(), last);
        assert_eq!(bif.read_frame(0).unwrap(), first);
        assert_eq!(bif.read_index().unwrap(), bif.frames());
    }

    #[test]
    fn empty_file_has_no_frames() {
        let bif = reader(build(1000, &[], true)).unwrap();
        assert!(bif.frames().is_empty());
        assert_eq!(bif.frame_count(), 0);
    }

    #[quickcheck]
    fn frame_count_matches_index(lengths: Vec<u8>, sentinel: bool) -> bool {
        let lengths: Vec<usize> = lengths.into_iter().map(usize::from).collect();
        let bif = reader(build(1000, &lengths, sentinel)).unwrap();
        bif.frames().len() == lengths.len() && bif.frame_count() as usize == lengths.len()
    }

    #[quickcheck]
    fn payload_length_is_offset_difference(lengths: Vec<u8>, sentinel: bool) -> bool {
        let lengths: Vec<usize> = lengths.into_iter().map(usize::from).collect();
        let mut bif = reader(build(1000, &lengths, sentinel)).unwrap();
        let offsets: Vec<u32> = bif.frames().iter().map(|f| f.offset).collect();
        let monotonic = offsets.windows(2).all(|w| w[0] <= w[1]);
        monotonic
            && (0..lengths.len()).all(|k| {
                let payload = bif.read_frame(k).unwrap();
                let expected = offsets
                    .get(k + 1)
                    .map_or(lengths[k], |next| (next - offsets[k]) as usize);
                payload.len() == expected && payload.len() == lengths[k]
            })
    }

    #[quickcheck]
    fn reenumeration_is_deterministic(lengths: Vec<u8>) -> bool {
        let lengths: Vec<usize> = lengths.into_iter().map(usize::from).collect();
        let bytes = build(40, &lengths, true);
        let mut bif = reader(bytes.clone()).unwrap();
        let first = bif.read_index().unwrap();
        let second = bif.read_index().unwrap();
        let reopened = reader(bif.into_inner().into_inner()).unwrap();
        first == second && first == reopened.frames() && reopened.source_len() == bytes.len() as u64
    }
}
