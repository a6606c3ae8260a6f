//! Live-edge estimation from a bootstrap (`abst`) box.
//!
//! The newest fragment is extrapolated from the last fragment run entry:
//! however many whole fragment durations fit between that entry's start and
//! the bootstrap's current media time are added to its fragment number.

use crate::boxes::{BootstrapInfoBox, F4vBox};
use crate::reader::parse_bytes;
use crate::splitter::fragment_name;
use crate::{Error, Result};
use bytes::Bytes;

/// How elapsed time is divided into fragments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LiveEdgeMode {
    /// Floor division on milliseconds; correct for sub-second durations.
    #[default]
    Exact,
    /// Truncate elapsed time and duration to whole seconds before dividing.
    WholeSeconds,
}

/// Estimated live-edge position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveEdge {
    pub segment_number: u32,
    pub fragment_number: u64,
}

impl LiveEdge {
    /// `Seg{segment}-Frag{fragment}`, the suffix HDS clients request.
    pub fn suffix(&self) -> String {
        fragment_name("", self.segment_number, self.fragment_number)
    }
}

impl std::fmt::Display for LiveEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.suffix())
    }
}

/// Estimate the live edge with [`LiveEdgeMode::Exact`].
pub fn resolve_live_edge(abst: &BootstrapInfoBox) -> Result<LiveEdge> {
    resolve_live_edge_with(abst, LiveEdgeMode::Exact)
}

/// Estimate the live edge of a bootstrap box.
pub fn resolve_live_edge_with(abst: &BootstrapInfoBox, mode: LiveEdgeMode) -> Result<LiveEdge> {
    let last_fragment = abst
        .fragment_tables
        .last()
        .and_then(|table| table.entries.last())
        .ok_or_else(|| Error::format_mismatch("bootstrap has no fragment run entries"))?;
    let segment_number = abst
        .segments
        .last()
        .and_then(|table| table.entries.last())
        .map(|entry| entry.first_segment)
        .ok_or_else(|| Error::format_mismatch("bootstrap has no segment run entries"))?;

    let now_ms = abst
        .current_media_time
        .as_millis()
        .ok_or_else(|| Error::format_mismatch("bootstrap time scale is zero"))?;
    let last_ms = last_fragment
        .first_fragment_timestamp
        .as_millis()
        .ok_or_else(|| Error::format_mismatch("fragment run table time scale is zero"))?;
    let elapsed_ms = now_ms.saturating_sub(last_ms);
    let duration_ms = last_fragment.fragment_duration as u128;

    let (elapsed, duration) = match mode {
        LiveEdgeMode::Exact => (elapsed_ms, duration_ms),
        LiveEdgeMode::WholeSeconds => (elapsed_ms / 1000, duration_ms / 1000),
    };
    if duration == 0 {
        return Err(Error::format_mismatch(format!(
            "last fragment duration of {duration_ms}ms is unusable in {mode:?} mode"
        )));
    }

    let fragments_elapsed = elapsed / duration;
    let estimate = last_fragment.first_fragment as u128 + fragments_elapsed;
    let fragment_number = u64::try_from(estimate.saturating_sub(1)).unwrap_or(u64::MAX);

    tracing::debug!(
        segment = segment_number,
        last_known = last_fragment.first_fragment,
        elapsed_ms = elapsed_ms as u64,
        fragment = fragment_number,
        "Estimated live edge"
    );

    Ok(LiveEdge {
        segment_number,
        fragment_number,
    })
}

/// Decode a bootstrap file's bytes and estimate its live edge.
///
/// The last top-level box must be an `abst`.
pub fn live_edge_from_bytes(data: impl Into<Bytes>, mode: LiveEdgeMode) -> Result<LiveEdge> {
    let mut last = None;
    for decoded in parse_bytes(data) {
        last = Some(decoded?);
    }
    match last {
        Some(F4vBox::Bootstrap(abst)) => resolve_live_edge_with(&abst, mode),
        Some(other) => Err(Error::format_mismatch(format!(
            "expected abst as last box, found {}",
            other.box_type()
        ))),
        None => Err(Error::format_mismatch("bootstrap is empty")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, AbstSpec, AfrtEntrySpec};

    const T0: u64 = 1_431_000_000_000;

    fn bootstrap(now_ms: u64, last: AfrtEntrySpec, segment: u32) -> Bytes {
        Bytes::from(fixtures::abst_box(&AbstSpec {
            live: true,
            time_scale: 1000,
            current_media_time: now_ms,
            segment_runs: vec![vec![(1, 10), (segment, 10)]],
            fragment_runs: vec![vec![AfrtEntrySpec::new(1, 0, 2000), last]],
            ..AbstSpec::default()
        }))
    }

    #[test]
    fn test_live_edge_example() {
        let data = bootstrap(T0 + 10_000, AfrtEntrySpec::new(5, T0, 2000), 7);
        let edge = live_edge_from_bytes(data.clone(), LiveEdgeMode::Exact).unwrap();
        assert_eq!(edge.to_string(), "Seg7-Frag9");
        let whole = live_edge_from_bytes(data, LiveEdgeMode::WholeSeconds).unwrap();
        assert_eq!(whole, edge);
    }

    #[test]
    fn test_sub_second_durations() {
        // 10s elapsed at 500ms per fragment: 20 fragments past #5.
        let data = bootstrap(T0 + 10_000, AfrtEntrySpec::new(5, T0, 500), 1);
        let edge = live_edge_from_bytes(data.clone(), LiveEdgeMode::Exact).unwrap();
        assert_eq!(edge.fragment_number, 24);
        assert!(live_edge_from_bytes(data, LiveEdgeMode::WholeSeconds).is_err());
    }

    #[test]
    fn test_fractional_seconds_floor() {
        // 9.9s elapsed at 2s: four whole fragments.
        let data = bootstrap(T0 + 9_900, AfrtEntrySpec::new(5, T0, 2000), 1);
        let edge = live_edge_from_bytes(data, LiveEdgeMode::Exact).unwrap();
        assert_eq!(edge.fragment_number, 8);
    }

    #[test]
    fn test_current_time_before_last_fragment() {
        let data = bootstrap(T0, AfrtEntrySpec::new(5, T0 + 4000, 2000), 1);
        let edge = live_edge_from_bytes(data, LiveEdgeMode::Exact).unwrap();
        assert_eq!(edge.fragment_number, 4);
    }

    #[test]
    fn test_zero_duration_is_error() {
        let data = bootstrap(T0, AfrtEntrySpec::discontinuity(5, T0, 1), 1);
        let err = live_edge_from_bytes(data, LiveEdgeMode::Exact).unwrap_err();
        assert!(matches!(err, Error::FormatMismatch(_)));
    }

    #[test]
    fn test_missing_tables() {
        let data = fixtures::abst_box(&AbstSpec::default());
        let err = live_edge_from_bytes(data, LiveEdgeMode::Exact).unwrap_err();
        assert!(matches!(err, Error::FormatMismatch(_)));
    }

    #[test]
    fn test_non_bootstrap_input() {
        let err = live_edge_from_bytes(fixtures::raw_box(b"mdat", b"x"), LiveEdgeMode::Exact)
            .unwrap_err();
        assert!(matches!(err, Error::FormatMismatch(_)));
    }
}
