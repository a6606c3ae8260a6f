//! Box decoder producing a lazy sequence of [`F4vBox`] values.

use crate::boxes::{
    BootstrapInfoBox, BoxHeader, BoxType, F4vBox, FragmentRandomAccessBox, FragmentRunEntry,
    FragmentRunTable, GlobalAccessEntry, LocalAccessEntry, MediaDataBox, SegmentRunEntry,
    SegmentRunTable, Timestamp, UnimplementedBox,
};
use crate::cursor::{BinaryCursor, FileCursor, MemoryCursor};
use crate::{Error, Result};
use bytes::Bytes;
use std::io::{Read, Seek};
use std::path::Path;

/// Decode every top-level box of a file.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<BoxReader<std::io::BufReader<std::fs::File>>> {
    parse_file_at(path, 0)
}

/// Decode top-level boxes of a file starting at byte `offset`.
pub fn parse_file_at<P: AsRef<Path>>(
    path: P,
    offset: u64,
) -> Result<BoxReader<std::io::BufReader<std::fs::File>>> {
    Ok(BoxReader::new(FileCursor::open(path, offset)?))
}

/// Decode every top-level box of an in-memory buffer.
pub fn parse_bytes(data: impl Into<Bytes>) -> BoxReader<std::io::Cursor<Bytes>> {
    BoxReader::new(MemoryCursor::from_bytes(data))
}

/// Iterator over the top-level boxes of a cursor.
///
/// Yields until the cursor is exhausted. The first error is yielded once and
/// ends the iteration, since the stream position is no longer trustworthy.
pub struct BoxReader<R: Read> {
    cursor: BinaryCursor<R>,
    failed: bool,
}

impl<R: Read + Seek> BoxReader<R> {
    pub fn new(cursor: BinaryCursor<R>) -> Self {
        Self {
            cursor,
            failed: false,
        }
    }

    /// Absolute offset of the next box header.
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Decode the next box, or `None` at end of input.
    pub fn next_box(&mut self) -> Result<Option<F4vBox>> {
        if self.cursor.is_empty() {
            return Ok(None);
        }
        decode_box(&mut self.cursor).map(Some)
    }
}

impl<R: Read + Seek> Iterator for BoxReader<R> {
    type Item = Result<F4vBox>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_box() {
            Ok(next) => next.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Read a box header, including the 64-bit extended size when the 32-bit
/// size field is 1.
///
/// A size of 0 means the box extends to the end of the source. The declared
/// payload must fit in what is left of the source.
pub fn read_box_header<R: Read>(cursor: &mut BinaryCursor<R>) -> Result<BoxHeader> {
    let start = cursor.position();
    let (size, box_type) = read_box_prefix(cursor)?;
    complete_box_header(cursor, start, size, box_type)
}

/// Read the 32-bit size field and the type tag, without checking the size.
pub(crate) fn read_box_prefix<R: Read>(cursor: &mut BinaryCursor<R>) -> Result<(u32, BoxType)> {
    let size = cursor.read_u32()?;
    let mut tag = [0u8; 4];
    for byte in tag.iter_mut() {
        *byte = cursor.read_u8()?;
    }
    Ok((size, BoxType::from_bytes(tag)))
}

/// Finish a header whose prefix was read at `start`: resolve the extended
/// or to-end size and check that the payload fits in the source.
pub(crate) fn complete_box_header<R: Read>(
    cursor: &mut BinaryCursor<R>,
    start: u64,
    size: u32,
    box_type: BoxType,
) -> Result<BoxHeader> {
    let size = size as u64;
    let (payload_size, header_size) = match size {
        1 => {
            let extended = cursor.read_u64()?;
            if extended < 16 {
                return Err(Error::format_mismatch(format!(
                    "box {} at offset {} declares size {} smaller than its header",
                    box_type, start, extended
                )));
            }
            (extended - 16, 16u8)
        }
        0 => (cursor.remaining(), 8u8),
        size if size < 8 => {
            return Err(Error::format_mismatch(format!(
                "box {} at offset {} declares size {} smaller than its header",
                box_type, start, size
            )));
        }
        size => (size - 8, 8u8),
    };

    if payload_size > cursor.remaining() {
        return Err(Error::Truncated {
            offset: cursor.position(),
            needed: payload_size,
            available: cursor.remaining(),
        });
    }

    Ok(BoxHeader {
        payload_size,
        box_type,
        header_size,
    })
}

/// Decode one box at the cursor, leaving the cursor exactly at its end.
pub fn decode_box<R: Read + Seek>(cursor: &mut BinaryCursor<R>) -> Result<F4vBox> {
    let start = cursor.position();
    let header = read_box_header(cursor)?;
    tracing::trace!(
        box_type = %header.box_type,
        offset = start,
        size = header.total_size(),
        "Decoding box"
    );

    let decoded = match header.box_type {
        BoxType::ABST => F4vBox::Bootstrap(parse_abst(cursor, header)?),
        BoxType::AFRA => F4vBox::RandomAccess(parse_afra(cursor, header)?),
        BoxType::MDAT => F4vBox::MediaData(parse_mdat(cursor, header)?),
        _ => {
            cursor.skip(header.payload_size)?;
            F4vBox::Unimplemented(UnimplementedBox { header })
        }
    };

    debug_assert_eq!(cursor.position(), start + header.total_size());
    Ok(decoded)
}

/// Capacity hint for a table of `count` entries of at least `entry_size`
/// bytes, bounded by what the cursor can still hold.
fn capacity_hint<R: Read>(cursor: &BinaryCursor<R>, count: u32, entry_size: u64) -> usize {
    (count as u64).min(cursor.remaining() / entry_size) as usize
}

/// Parse abst (bootstrap info).
fn parse_abst<R: Read>(parent: &mut BinaryCursor<R>, header: BoxHeader) -> Result<BootstrapInfoBox> {
    let mut data = parent.sub_cursor(header.payload_size)?;

    // Version (8) and flags (24) are unused.
    data.skip_bits(32)?;
    let version = data.read_u32()?;
    let profile = data.read_bits(2)? as u8;
    let live = data.read_flag()?;
    let update = data.read_flag()?;
    data.skip_bits(4)?;
    let time_scale = data.read_u32()?;
    let current_media_time = Timestamp::new(data.read_u64()?, time_scale);
    let smpte_timecode_offset = data.read_u64()?;

    let movie_identifier = data.read_optional_cstring()?;
    let server_entries = data.read_string_table()?;
    let quality_entries = data.read_string_table()?;
    let drm_data = data.read_optional_cstring()?;
    let metadata = data.read_optional_cstring()?;

    let segment_count = data.read_u8()?;
    tracing::trace!(segment_count, "abst segment run tables");
    let mut segments = Vec::with_capacity(segment_count as usize);
    for _ in 0..segment_count {
        segments.push(parse_asrt(&mut data)?);
    }

    let fragment_count = data.read_u8()?;
    tracing::trace!(fragment_count, "abst fragment run tables");
    let mut fragment_tables = Vec::with_capacity(fragment_count as usize);
    for _ in 0..fragment_count {
        fragment_tables.push(parse_afrt(&mut data)?);
    }

    Ok(BootstrapInfoBox {
        header,
        version,
        profile,
        live,
        update,
        time_scale,
        current_media_time,
        smpte_timecode_offset,
        movie_identifier,
        server_entries,
        quality_entries,
        drm_data,
        metadata,
        segments,
        fragment_tables,
    })
}

/// Parse an asrt (segment run table) nested in an abst.
fn parse_asrt(parent: &mut MemoryCursor) -> Result<SegmentRunTable> {
    let header = read_box_header(parent)?;
    let mut data = parent.sub_cursor(header.payload_size)?;

    data.skip_bits(8)?;
    let update = data.read_u24()? == 1;
    let quality_segment_url_modifiers = data.read_string_table()?;

    let entry_count = data.read_u32()?;
    let mut entries = Vec::with_capacity(capacity_hint(&data, entry_count, 8));
    for _ in 0..entry_count {
        entries.push(SegmentRunEntry {
            first_segment: data.read_u32()?,
            fragments_per_segment: data.read_u32()?,
        });
    }

    Ok(SegmentRunTable {
        header,
        update,
        quality_segment_url_modifiers,
        entries,
    })
}

/// Parse an afrt (fragment run table) nested in an abst.
fn parse_afrt(parent: &mut MemoryCursor) -> Result<FragmentRunTable> {
    let header = read_box_header(parent)?;
    let mut data = parent.sub_cursor(header.payload_size)?;

    data.skip_bits(8)?;
    let update = data.read_u24()? == 1;
    let time_scale = data.read_u32()?;
    let quality_fragment_url_modifiers = data.read_string_table()?;

    let entry_count = data.read_u32()?;
    let mut entries = Vec::with_capacity(capacity_hint(&data, entry_count, 16));
    for _ in 0..entry_count {
        let first_fragment = data.read_u32()?;
        let first_fragment_timestamp = Timestamp::new(data.read_u64()?, time_scale);
        let fragment_duration = data.read_u32()?;
        let discontinuity_indicator = if fragment_duration == 0 {
            Some(data.read_u8()?)
        } else {
            None
        };
        entries.push(FragmentRunEntry {
            first_fragment,
            first_fragment_timestamp,
            fragment_duration,
            discontinuity_indicator,
        });
    }

    Ok(FragmentRunTable {
        header,
        update,
        time_scale,
        quality_fragment_url_modifiers,
        entries,
    })
}

/// Parse afra (fragment random access).
fn parse_afra<R: Read>(
    parent: &mut BinaryCursor<R>,
    header: BoxHeader,
) -> Result<FragmentRandomAccessBox> {
    let mut data = parent.sub_cursor(header.payload_size)?;

    data.skip_bits(32)?;
    let long_ids = data.read_flag()?;
    let long_offsets = data.read_flag()?;
    let has_global_entries = data.read_flag()?;
    data.skip_bits(5)?;
    let time_scale = data.read_u32()?;

    let read_id = |c: &mut MemoryCursor| -> Result<u32> {
        if long_ids {
            c.read_u32()
        } else {
            c.read_u16().map(u32::from)
        }
    };
    let read_offset = |c: &mut MemoryCursor| -> Result<u64> {
        if long_offsets {
            c.read_u64()
        } else {
            c.read_u32().map(u64::from)
        }
    };
    let offset_size: u64 = if long_offsets { 8 } else { 4 };
    let id_size: u64 = if long_ids { 4 } else { 2 };

    let local_count = data.read_u32()?;
    let mut local_entries = Vec::with_capacity(capacity_hint(&data, local_count, 8 + offset_size));
    for _ in 0..local_count {
        let time = Timestamp::new(data.read_u64()?, time_scale);
        let offset = read_offset(&mut data)?;
        local_entries.push(LocalAccessEntry { time, offset });
    }

    let mut global_entries = Vec::new();
    if has_global_entries {
        let global_count = data.read_u32()?;
        tracing::trace!(global_count, "afra global access entries");
        global_entries.reserve(capacity_hint(
            &data,
            global_count,
            8 + 2 * id_size + 2 * offset_size,
        ));
        for _ in 0..global_count {
            let time = Timestamp::new(data.read_u64()?, time_scale);
            let segment_number = read_id(&mut data)?;
            let fragment_number = read_id(&mut data)?;
            let afra_offset = read_offset(&mut data)?;
            let sample_offset = read_offset(&mut data)?;
            global_entries.push(GlobalAccessEntry {
                time,
                segment_number,
                fragment_number,
                afra_offset,
                sample_offset,
            });
        }
    }

    Ok(FragmentRandomAccessBox {
        header,
        long_ids,
        long_offsets,
        time_scale,
        local_entries,
        global_entries,
    })
}

/// Parse mdat (media data).
fn parse_mdat<R: Read>(cursor: &mut BinaryCursor<R>, header: BoxHeader) -> Result<MediaDataBox> {
    let payload = cursor.read_bytes(header.payload_size)?;
    Ok(MediaDataBox { header, payload })
}
