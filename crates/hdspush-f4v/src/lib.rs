//! hdspush-f4v: decoding of Adobe HDS box files and fragment extraction
//!
//! Live HDS encoders write a segment as a media file (`.f4f`) and an index
//! (`.f4x`), alongside bootstrap (`.bootstrap`) and manifest (`.f4m`) files.
//! This crate decodes the box format they share and cuts segments into the
//! individually addressable fragments HDS clients request.
//!
//! # Modules
//!
//! - `cursor` - Positioned big-endian bit/byte reader
//! - `boxes` - Decoded box records (`abst`, `afra`, `asrt`, `afrt`, `mdat`)
//! - `reader` - Lazy top-level box decoder
//! - `splitter` - `.f4x` + `.f4f` to fragments
//! - `live_edge` - Newest-fragment estimation from a bootstrap
//!
//! # Example
//!
//! ```no_run
//! use hdspush_f4v::HdsSegmentSplitter;
//!
//! let splitter = HdsSegmentSplitter::new("/var/hds/liveSeg1.f4x", None)?;
//! for fragment in splitter.split()? {
//!     let fragment = fragment?;
//!     println!("{} ({} bytes)", fragment.remote_name(splitter.stream_name()), fragment.payload.len());
//! }
//! # Ok::<(), hdspush_f4v::Error>(())
//! ```

pub mod boxes;
pub mod cursor;
pub mod error;
pub mod live_edge;
pub mod reader;
pub mod splitter;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use boxes::{
    BootstrapInfoBox, BoxHeader, BoxType, F4vBox, FragmentRandomAccessBox, FragmentRunEntry,
    FragmentRunTable, GlobalAccessEntry, LocalAccessEntry, MediaDataBox, SegmentRunEntry,
    SegmentRunTable, Timestamp, UnimplementedBox,
};
pub use cursor::BinaryCursor;
pub use error::{Error, Result};
pub use live_edge::{live_edge_from_bytes, resolve_live_edge, resolve_live_edge_with, LiveEdge, LiveEdgeMode};
pub use reader::{parse_bytes, parse_file, parse_file_at, BoxReader};
pub use splitter::{fragment_name, HdsFragment, HdsSegmentSplitter, WriteSummary};
