//! Hand-built box bytes for tests.
//!
//! Only the layouts needed to exercise the decoder and splitter are covered;
//! this is not a general-purpose encoder.

use std::path::{Path, PathBuf};

/// Wrap `payload` in a box with an 8-byte header.
pub fn raw_box(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(tag);
    out.extend_from_slice(payload);
    out
}

/// Wrap `payload` in a box with a 16-byte (extended size) header.
pub fn raw_box_extended(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = 1u32.to_be_bytes().to_vec();
    out.extend_from_slice(tag);
    out.extend_from_slice(&((payload.len() + 16) as u64).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn push_cstring(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

fn push_string_table(out: &mut Vec<u8>, table: &[String]) {
    out.push(table.len() as u8);
    for s in table {
        push_cstring(out, s);
    }
}

/// One afrt entry.
#[derive(Debug, Clone, Copy)]
pub struct AfrtEntrySpec {
    pub first_fragment: u32,
    pub timestamp: u64,
    pub duration: u32,
    pub discontinuity: Option<u8>,
}

impl AfrtEntrySpec {
    pub fn new(first_fragment: u32, timestamp: u64, duration: u32) -> Self {
        Self {
            first_fragment,
            timestamp,
            duration,
            discontinuity: None,
        }
    }

    pub fn discontinuity(first_fragment: u32, timestamp: u64, indicator: u8) -> Self {
        Self {
            first_fragment,
            timestamp,
            duration: 0,
            discontinuity: Some(indicator),
        }
    }
}

/// Segment run table box; `padding` zero bytes are appended inside the box.
pub fn asrt_box(entries: &[(u32, u32)], padding: usize) -> Vec<u8> {
    let mut payload = vec![0, 0, 0, 0];
    push_string_table(&mut payload, &[]);
    payload.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for (first_segment, per_segment) in entries {
        payload.extend_from_slice(&first_segment.to_be_bytes());
        payload.extend_from_slice(&per_segment.to_be_bytes());
    }
    payload.extend(std::iter::repeat(0).take(padding));
    raw_box(b"asrt", &payload)
}

/// Fragment run table box; `padding` zero bytes are appended inside the box.
pub fn afrt_box(time_scale: u32, entries: &[AfrtEntrySpec], padding: usize) -> Vec<u8> {
    let mut payload = vec![0, 0, 0, 0];
    payload.extend_from_slice(&time_scale.to_be_bytes());
    push_string_table(&mut payload, &[]);
    payload.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for entry in entries {
        payload.extend_from_slice(&entry.first_fragment.to_be_bytes());
        payload.extend_from_slice(&entry.timestamp.to_be_bytes());
        payload.extend_from_slice(&entry.duration.to_be_bytes());
        if entry.duration == 0 {
            payload.push(entry.discontinuity.unwrap_or(0));
        }
    }
    payload.extend(std::iter::repeat(0).take(padding));
    raw_box(b"afrt", &payload)
}

/// Description of an abst box.
#[derive(Debug, Clone)]
pub struct AbstSpec {
    pub version: u32,
    pub profile: u8,
    pub live: bool,
    pub update: bool,
    pub time_scale: u32,
    pub current_media_time: u64,
    pub movie_identifier: String,
    pub servers: Vec<String>,
    pub qualities: Vec<String>,
    pub drm_data: String,
    pub metadata: String,
    pub segment_runs: Vec<Vec<(u32, u32)>>,
    pub fragment_time_scale: u32,
    pub fragment_runs: Vec<Vec<AfrtEntrySpec>>,
    /// Trailing bytes added inside each nested table.
    pub table_padding: usize,
}

impl Default for AbstSpec {
    fn default() -> Self {
        Self {
            version: 1,
            profile: 0,
            live: false,
            update: false,
            time_scale: 1000,
            current_media_time: 0,
            movie_identifier: String::new(),
            servers: Vec::new(),
            qualities: Vec::new(),
            drm_data: String::new(),
            metadata: String::new(),
            segment_runs: Vec::new(),
            fragment_time_scale: 1000,
            fragment_runs: Vec::new(),
            table_padding: 0,
        }
    }
}

/// Bootstrap info box.
pub fn abst_box(spec: &AbstSpec) -> Vec<u8> {
    let mut payload = vec![0, 0, 0, 0];
    payload.extend_from_slice(&spec.version.to_be_bytes());
    let flags = ((spec.profile & 0b11) << 6)
        | (if spec.live { 1 << 5 } else { 0 })
        | (if spec.update { 1 << 4 } else { 0 });
    payload.push(flags);
    payload.extend_from_slice(&spec.time_scale.to_be_bytes());
    payload.extend_from_slice(&spec.current_media_time.to_be_bytes());
    payload.extend_from_slice(&0u64.to_be_bytes());
    push_cstring(&mut payload, &spec.movie_identifier);
    push_string_table(&mut payload, &spec.servers);
    push_string_table(&mut payload, &spec.qualities);
    push_cstring(&mut payload, &spec.drm_data);
    push_cstring(&mut payload, &spec.metadata);

    payload.push(spec.segment_runs.len() as u8);
    for entries in &spec.segment_runs {
        payload.extend(asrt_box(entries, spec.table_padding));
    }
    payload.push(spec.fragment_runs.len() as u8);
    for entries in &spec.fragment_runs {
        payload.extend(afrt_box(spec.fragment_time_scale, entries, spec.table_padding));
    }
    raw_box(b"abst", &payload)
}

/// One afra global access entry.
#[derive(Debug, Clone, Copy)]
pub struct GlobalSpec {
    pub time: u64,
    pub segment: u32,
    pub fragment: u32,
    pub afra_offset: u64,
    pub sample_offset: u64,
}

/// Fragment random access box with a time scale of 1000.
pub fn afra_box(
    long_ids: bool,
    long_offsets: bool,
    local: &[(u64, u64)],
    global: Option<&[GlobalSpec]>,
) -> Vec<u8> {
    let push_offset = |out: &mut Vec<u8>, v: u64| {
        if long_offsets {
            out.extend_from_slice(&v.to_be_bytes());
        } else {
            out.extend_from_slice(&(v as u32).to_be_bytes());
        }
    };
    let push_id = |out: &mut Vec<u8>, v: u32| {
        if long_ids {
            out.extend_from_slice(&v.to_be_bytes());
        } else {
            out.extend_from_slice(&(v as u16).to_be_bytes());
        }
    };

    let mut payload = vec![0, 0, 0, 0];
    let flags = (if long_ids { 0x80 } else { 0 })
        | (if long_offsets { 0x40 } else { 0 })
        | (if global.is_some() { 0x20 } else { 0 });
    payload.push(flags);
    payload.extend_from_slice(&1000u32.to_be_bytes());
    payload.extend_from_slice(&(local.len() as u32).to_be_bytes());
    for (time, offset) in local {
        payload.extend_from_slice(&time.to_be_bytes());
        push_offset(&mut payload, *offset);
    }
    if let Some(global) = global {
        payload.extend_from_slice(&(global.len() as u32).to_be_bytes());
        for entry in global {
            payload.extend_from_slice(&entry.time.to_be_bytes());
            push_id(&mut payload, entry.segment);
            push_id(&mut payload, entry.fragment);
            push_offset(&mut payload, entry.afra_offset);
            push_offset(&mut payload, entry.sample_offset);
        }
    }
    raw_box(b"afra", &payload)
}

/// A well-formed fragment: afra, abst, moof, mdat.
pub fn fragment_bytes(fragment_number: u32, media: &[u8]) -> Vec<u8> {
    let mut out = afra_box(false, false, &[(fragment_number as u64 * 4000, 0)], None);
    out.extend(abst_box(&AbstSpec {
        segment_runs: vec![vec![(1, fragment_number)]],
        fragment_runs: vec![vec![AfrtEntrySpec::new(fragment_number, 0, 4000)]],
        ..AbstSpec::default()
    }));
    out.extend(raw_box(b"moof", &fragment_number.to_be_bytes()));
    out.extend(raw_box(b"mdat", media));
    out
}

/// Files written by [`write_segment`].
#[derive(Debug, Clone)]
pub struct SegmentFixture {
    pub index_path: PathBuf,
    pub media_path: PathBuf,
    /// Expected bytes per fragment, in index order.
    pub fragments: Vec<(u32, Vec<u8>)>,
}

/// Write `{base_name}.f4f` and `{base_name}.f4x` into `dir`.
///
/// The media file holds a leading `ftyp`-style box followed by one fragment
/// per number in ascending order; the index lists them in the order given.
pub fn write_segment(dir: &Path, base_name: &str, segment: u32, order: &[u32]) -> SegmentFixture {
    let mut numbers = order.to_vec();
    numbers.sort_unstable();

    let mut media = raw_box(b"ftyp", b"f4v \0\0\0\x01");
    let mut offsets = Vec::new();
    for number in &numbers {
        let bytes = fragment_bytes(*number, format!("media-{number}").as_bytes());
        offsets.push((*number, media.len() as u64, bytes.clone()));
        media.extend(bytes);
    }

    let mut globals = Vec::new();
    let mut fragments = Vec::new();
    for number in order {
        let (_, offset, bytes) = offsets
            .iter()
            .find(|(n, _, _)| n == number)
            .cloned()
            .unwrap_or_default();
        globals.push(GlobalSpec {
            time: *number as u64 * 4000,
            segment,
            fragment: *number,
            afra_offset: offset,
            sample_offset: 0,
        });
        fragments.push((*number, bytes));
    }

    let index = afra_box(false, false, &[], Some(&globals));
    let index_path = dir.join(format!("{base_name}.f4x"));
    let media_path = dir.join(format!("{base_name}.f4f"));
    std::fs::write(&index_path, index).expect("write index fixture");
    std::fs::write(&media_path, media).expect("write media fixture");

    SegmentFixture {
        index_path,
        media_path,
        fragments,
    }
}
