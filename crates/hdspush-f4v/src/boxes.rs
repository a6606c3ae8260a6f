//! Decoded F4V box records.
//!
//! Every record is produced by a single decode pass and owns its data; none
//! of them keeps a handle on the source they were read from.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[cfg(feature = "serialize")]
use serde::Serialize;

/// Four-character box type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxType(pub [u8; 4]);

impl BoxType {
    pub const ABST: Self = Self(*b"abst");
    pub const AFRA: Self = Self(*b"afra");
    pub const ASRT: Self = Self(*b"asrt");
    pub const AFRT: Self = Self(*b"afrt");
    pub const MDAT: Self = Self(*b"mdat");
    pub const MOOF: Self = Self(*b"moof");

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Get the 4-char code as a string.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl std::fmt::Display for BoxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(feature = "serialize")]
impl Serialize for BoxType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Parsed box header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct BoxHeader {
    /// Declared total size minus the header size.
    pub payload_size: u64,
    /// Box type code.
    pub box_type: BoxType,
    /// Size of the header (8 or 16 bytes).
    pub header_size: u8,
}

impl BoxHeader {
    /// Header plus payload, i.e. the number of bytes the box occupies.
    pub fn total_size(&self) -> u64 {
        self.header_size as u64 + self.payload_size
    }
}

/// Raw tick count paired with the time scale that governs it.
///
/// Kept as an exact rational; conversions to wall-clock values happen only
/// when asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Timestamp {
    pub ticks: u64,
    /// Ticks per second.
    pub time_scale: u32,
}

impl Timestamp {
    pub fn new(ticks: u64, time_scale: u32) -> Self {
        Self { ticks, time_scale }
    }

    /// Whole milliseconds since the epoch, rounded down.
    pub fn as_millis(&self) -> Option<u128> {
        if self.time_scale == 0 {
            return None;
        }
        Some(self.ticks as u128 * 1000 / self.time_scale as u128)
    }

    /// Offset from the epoch as a duration (nanosecond precision).
    pub fn as_duration(&self) -> Option<Duration> {
        if self.time_scale == 0 {
            return None;
        }
        let scale = self.time_scale as u64;
        let secs = self.ticks / scale;
        let rem = (self.ticks % scale) as u128;
        let nanos = (rem * 1_000_000_000 / scale as u128) as u32;
        Some(Duration::new(secs, nanos))
    }

    /// Interpret the ticks as time since the Unix epoch.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let duration = self.as_duration()?;
        let secs = i64::try_from(duration.as_secs()).ok()?;
        DateTime::from_timestamp(secs, duration.subsec_nanos())
    }
}

/// Bootstrap info box (`abst`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct BootstrapInfoBox {
    pub header: BoxHeader,
    /// Bootstrap info version (the 32-bit word following version/flags).
    pub version: u32,
    pub profile: u8,
    pub live: bool,
    pub update: bool,
    pub time_scale: u32,
    pub current_media_time: Timestamp,
    pub smpte_timecode_offset: u64,
    pub movie_identifier: Option<String>,
    pub server_entries: Vec<String>,
    pub quality_entries: Vec<String>,
    pub drm_data: Option<String>,
    pub metadata: Option<String>,
    /// Segment run tables, in file order.
    pub segments: Vec<SegmentRunTable>,
    /// Fragment run tables, in file order.
    pub fragment_tables: Vec<FragmentRunTable>,
}

/// Segment run table (`asrt`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct SegmentRunTable {
    pub header: BoxHeader,
    pub update: bool,
    pub quality_segment_url_modifiers: Vec<String>,
    pub entries: Vec<SegmentRunEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct SegmentRunEntry {
    pub first_segment: u32,
    pub fragments_per_segment: u32,
}

/// Fragment run table (`afrt`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct FragmentRunTable {
    pub header: BoxHeader,
    pub update: bool,
    pub time_scale: u32,
    pub quality_fragment_url_modifiers: Vec<String>,
    pub entries: Vec<FragmentRunEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct FragmentRunEntry {
    pub first_fragment: u32,
    pub first_fragment_timestamp: Timestamp,
    /// Duration in milliseconds; zero marks a discontinuity entry.
    pub fragment_duration: u32,
    /// Present only when `fragment_duration` is zero.
    pub discontinuity_indicator: Option<u8>,
}

/// Fragment random access box (`afra`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct FragmentRandomAccessBox {
    pub header: BoxHeader,
    /// Segment/fragment ids are 32-bit instead of 16-bit.
    pub long_ids: bool,
    /// Offsets are 64-bit instead of 32-bit.
    pub long_offsets: bool,
    pub time_scale: u32,
    pub local_entries: Vec<LocalAccessEntry>,
    /// Empty unless the global entries flag was set.
    pub global_entries: Vec<GlobalAccessEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct LocalAccessEntry {
    pub time: Timestamp,
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct GlobalAccessEntry {
    pub time: Timestamp,
    pub segment_number: u32,
    pub fragment_number: u32,
    /// Offset of the fragment's `afra` box in the media file.
    pub afra_offset: u64,
    pub sample_offset: u64,
}

/// Media data box (`mdat`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct MediaDataBox {
    pub header: BoxHeader,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub payload: Bytes,
}

/// Any box type this crate does not decode. Its payload is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct UnimplementedBox {
    pub header: BoxHeader,
}

/// A decoded top-level box.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize), serde(tag = "kind", rename_all = "snake_case"))]
pub enum F4vBox {
    Bootstrap(BootstrapInfoBox),
    RandomAccess(FragmentRandomAccessBox),
    MediaData(MediaDataBox),
    Unimplemented(UnimplementedBox),
}

impl F4vBox {
    pub fn header(&self) -> &BoxHeader {
        match self {
            Self::Bootstrap(b) => &b.header,
            Self::RandomAccess(b) => &b.header,
            Self::MediaData(b) => &b.header,
            Self::Unimplemented(b) => &b.header,
        }
    }

    pub fn box_type(&self) -> BoxType {
        self.header().box_type
    }

    /// Bytes the box occupies in its source, header included.
    pub fn total_size(&self) -> u64 {
        self.header().total_size()
    }
}
