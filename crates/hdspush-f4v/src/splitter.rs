//! Splits an HDS segment (`.f4x` index + `.f4f` media) into fragments.
//!
//! The index holds an `afra` box whose global access entries point at the
//! start of each fragment in the media file. A fragment is the run of boxes
//! `afra`, `abst`, `moof`, `mdat` starting at that offset; its bytes are
//! copied out verbatim.

use crate::boxes::{BoxType, F4vBox, GlobalAccessEntry};
use crate::cursor::FileCursor;
use crate::reader::{complete_box_header, parse_file, read_box_prefix};
use crate::{Error, Result};
use bytes::Bytes;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Box order every fragment must follow.
pub const FRAGMENT_BOX_ORDER: [BoxType; 4] =
    [BoxType::AFRA, BoxType::ABST, BoxType::MOOF, BoxType::MDAT];

/// Marker separating the stream name from the segment number in file names.
const SEGMENT_MARKER: &str = "Seg";

/// One extracted fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdsFragment {
    pub fragment_number: u32,
    pub segment_number: u32,
    pub payload: Bytes,
}

impl HdsFragment {
    /// Name used for the fragment by HDS clients: `{stream}Seg{n}-Frag{m}`.
    pub fn remote_name(&self, stream_name: &str) -> String {
        fragment_name(stream_name, self.segment_number, self.fragment_number)
    }
}

/// Format `{stream}Seg{segment}-Frag{fragment}`.
pub fn fragment_name(stream_name: &str, segment_number: u32, fragment_number: impl std::fmt::Display) -> String {
    format!("{stream_name}Seg{segment_number}-Frag{fragment_number}")
}

/// Stream name derived from an index path: the base name up to `Seg`.
pub fn stream_name_of(index_path: &Path) -> String {
    let stem = index_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.split_once(SEGMENT_MARKER) {
        Some((prefix, _)) => prefix.to_string(),
        None => stem,
    }
}

/// Outcome of [`HdsSegmentSplitter::write_fragments`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    pub skipped: usize,
}

/// Splitter bound to one index file and its media file.
#[derive(Debug, Clone)]
pub struct HdsSegmentSplitter {
    index_path: PathBuf,
    media_path: PathBuf,
    stream_name: String,
}

impl HdsSegmentSplitter {
    /// Create a splitter for `index_path`.
    ///
    /// Without an explicit media path the sibling file with the same base
    /// name and an `.f4f` extension is used. Fails with [`Error::NotFound`]
    /// if the media file does not exist.
    pub fn new(index_path: impl Into<PathBuf>, media_path: Option<PathBuf>) -> Result<Self> {
        let index_path = index_path.into();
        let media_path = media_path.unwrap_or_else(|| index_path.with_extension("f4f"));
        if !media_path.is_file() {
            return Err(Error::NotFound(media_path));
        }
        let stream_name = stream_name_of(&index_path);
        Ok(Self {
            index_path,
            media_path,
            stream_name,
        })
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn media_path(&self) -> &Path {
        &self.media_path
    }

    /// Read the index and return the global access entries in file order.
    ///
    /// Every top-level box must be an `afra`.
    pub fn global_entries(&self) -> Result<Vec<GlobalAccessEntry>> {
        let mut entries = Vec::new();
        let mut seen_afra = false;

        for decoded in parse_file(&self.index_path)? {
            match decoded? {
                F4vBox::RandomAccess(afra) => {
                    seen_afra = true;
                    entries.extend(afra.global_entries);
                }
                other => {
                    return Err(Error::format_mismatch(format!(
                        "index file missing global access entries: found {} box in {}",
                        other.box_type(),
                        self.index_path.display()
                    )));
                }
            }
        }

        if !seen_afra {
            return Err(Error::format_mismatch(format!(
                "index file missing global access entries: {} is empty",
                self.index_path.display()
            )));
        }

        tracing::debug!(
            index = %self.index_path.display(),
            entries = entries.len(),
            "Read global access entries"
        );
        Ok(entries)
    }

    /// Fragments in index order.
    ///
    /// The index is decoded up front; each fragment is extracted when the
    /// iterator reaches it. Iteration stops after the first error.
    pub fn split(&self) -> Result<Fragments<'_>> {
        let entries = self.global_entries()?;
        Ok(Fragments {
            splitter: self,
            entries: entries.into_iter(),
            failed: false,
        })
    }

    /// Extract the fragment a global access entry points at.
    pub fn extract(&self, entry: &GlobalAccessEntry) -> Result<HdsFragment> {
        let offset = entry.afra_offset;
        tracing::trace!(
            media = %self.media_path.display(),
            offset,
            fragment = entry.fragment_number,
            "Extracting fragment"
        );

        let length = self.fragment_length(offset)?;
        let payload = self.read_range(offset, length)?;

        Ok(HdsFragment {
            fragment_number: entry.fragment_number,
            segment_number: entry.segment_number,
            payload,
        })
    }

    /// Validate the box order at `offset` and return the fragment length.
    ///
    /// Only box headers are read. A tag is compared before its size is
    /// trusted, so a stale or misaligned offset is a composition error. A
    /// box with the right tag whose payload runs past the end of the file
    /// is [`Error::Truncated`].
    fn fragment_length(&self, offset: u64) -> Result<u64> {
        let mut cursor = FileCursor::open(&self.media_path, offset)?;
        let mut total = 0u64;

        for expected in FRAGMENT_BOX_ORDER {
            if cursor.is_empty() {
                return Err(Error::composition(
                    &self.media_path,
                    offset,
                    format!("expected {expected}, reached end of file"),
                ));
            }

            let start = cursor.position();
            let (size, box_type) = read_box_prefix(&mut cursor).map_err(|e| {
                Error::composition(
                    &self.media_path,
                    offset,
                    format!("expected {expected} at offset {start}: {e}"),
                )
            })?;
            if box_type != expected {
                return Err(Error::composition(
                    &self.media_path,
                    offset,
                    format!("expected {expected}, found {box_type}"),
                ));
            }

            let header = complete_box_header(&mut cursor, start, size, box_type).map_err(|e| {
                if e.is_truncated() {
                    e
                } else {
                    Error::composition(
                        &self.media_path,
                        offset,
                        format!("malformed {expected} header at offset {start}: {e}"),
                    )
                }
            })?;

            cursor.skip(header.payload_size)?;
            total += header.total_size();
        }

        Ok(total)
    }

    fn read_range(&self, offset: u64, length: u64) -> Result<Bytes> {
        let mut file = File::open(&self.media_path)?;
        let file_size = file.metadata()?.len();
        let available = file_size.saturating_sub(offset);
        if length > available {
            return Err(Error::Truncated {
                offset,
                needed: length,
                available,
            });
        }
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Write every fragment into `destination` as `{stream}Seg{n}-Frag{m}`.
    ///
    /// Each file is written to a temporary file in `destination` and renamed
    /// into place. Existing files are left alone unless `force_overwrite`.
    pub fn write_fragments(&self, destination: &Path, force_overwrite: bool) -> Result<WriteSummary> {
        if !destination.exists() {
            tracing::info!("Creating destination directory: {}", destination.display());
            std::fs::create_dir_all(destination)?;
        }

        let mut summary = WriteSummary::default();
        for fragment in self.split()? {
            let fragment = fragment?;
            let target = destination.join(fragment.remote_name(&self.stream_name));

            if target.exists() && !force_overwrite {
                tracing::info!("{} already exists. Not overwriting", target.display());
                summary.skipped += 1;
                continue;
            }

            let mut temp = tempfile::NamedTempFile::new_in(destination)?;
            temp.write_all(&fragment.payload)?;
            tracing::debug!(
                "Writing {} bytes to {}",
                fragment.payload.len(),
                target.display()
            );
            temp.persist(&target).map_err(|e| Error::Io(e.error))?;
            summary.written += 1;
        }

        Ok(summary)
    }
}

/// Iterator returned by [`HdsSegmentSplitter::split`].
pub struct Fragments<'a> {
    splitter: &'a HdsSegmentSplitter,
    entries: std::vec::IntoIter<GlobalAccessEntry>,
    failed: bool,
}

impl Iterator for Fragments<'_> {
    type Item = Result<HdsFragment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let entry = self.entries.next()?;
        let result = self.splitter.extract(&entry);
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, GlobalSpec};

    #[test]
    fn test_stream_name() {
        assert_eq!(stream_name_of(Path::new("/a/livestreamSeg1.f4x")), "livestream");
        assert_eq!(stream_name_of(Path::new("mystreamSeg12")), "mystream");
        assert_eq!(stream_name_of(Path::new("noMarker.f4x")), "noMarker");
    }

    #[test]
    fn test_fragment_name() {
        let fragment = HdsFragment {
            fragment_number: 42,
            segment_number: 3,
            payload: Bytes::new(),
        };
        assert_eq!(fragment.remote_name("live"), "liveSeg3-Frag42");
    }

    #[test]
    fn test_missing_media_file() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("streamSeg1.f4x");
        std::fs::write(&index, fixtures::afra_box(false, false, &[], Some(&[][..]))).unwrap();

        match HdsSegmentSplitter::new(&index, None) {
            Err(Error::NotFound(path)) => assert_eq!(path, dir.path().join("streamSeg1.f4f")),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_explicit_media_path() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = fixtures::write_segment(dir.path(), "streamSeg1", 1, &[1]);
        let renamed = dir.path().join("other.f4f");
        std::fs::rename(&fixture.media_path, &renamed).unwrap();

        let splitter = HdsSegmentSplitter::new(&fixture.index_path, Some(renamed.clone())).unwrap();
        assert_eq!(splitter.media_path(), renamed.as_path());
        assert_eq!(splitter.split().unwrap().count(), 1);
    }

    #[test]
    fn test_split_preserves_index_order() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = fixtures::write_segment(dir.path(), "liveSeg7", 7, &[3, 1, 2]);

        let splitter = HdsSegmentSplitter::new(&fixture.index_path, None).unwrap();
        assert_eq!(splitter.stream_name(), "live");
        let fragments: Vec<HdsFragment> = splitter.split().unwrap().map(|f| f.unwrap()).collect();

        let numbers: Vec<u32> = fragments.iter().map(|f| f.fragment_number).collect();
        assert_eq!(numbers, vec![3, 1, 2]);
        for (fragment, (number, expected)) in fragments.iter().zip(&fixture.fragments) {
            assert_eq!(fragment.fragment_number, *number);
            assert_eq!(fragment.segment_number, 7);
            assert_eq!(fragment.payload.as_ref(), expected.as_slice());
        }
    }

    #[test]
    fn test_non_afra_index_is_format_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("streamSeg1.f4x");
        std::fs::write(&index, fixtures::raw_box(b"mdat", b"nope")).unwrap();
        std::fs::write(dir.path().join("streamSeg1.f4f"), b"").unwrap();

        let splitter = HdsSegmentSplitter::new(&index, None).unwrap();
        assert!(matches!(splitter.split(), Err(Error::FormatMismatch(_))));
    }

    #[test]
    fn test_wrong_box_at_offset_is_composition_error() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = fixtures::write_segment(dir.path(), "streamSeg1", 1, &[1]);
        // Point the index one box too far: at the fragment's abst.
        let afra_len = fixtures::afra_box(false, false, &[(4000, 0)], None).len() as u64;
        let ftyp_len = fixtures::raw_box(b"ftyp", b"f4v \0\0\0\x01").len() as u64;
        let index = fixtures::afra_box(
            false,
            false,
            &[],
            Some(&[GlobalSpec {
                time: 0,
                segment: 1,
                fragment: 1,
                afra_offset: ftyp_len + afra_len,
                sample_offset: 0,
            }][..]),
        );
        std::fs::write(&fixture.index_path, index).unwrap();

        let splitter = HdsSegmentSplitter::new(&fixture.index_path, None).unwrap();
        let mut fragments = splitter.split().unwrap();
        match fragments.next() {
            Some(Err(Error::FragmentComposition { offset, detail, .. })) => {
                assert_eq!(offset, ftyp_len + afra_len);
                assert!(detail.contains("expected afra"), "{detail}");
            }
            other => panic!("expected composition error, got {:?}", other),
        }
        assert!(fragments.next().is_none());
    }

    #[test]
    fn test_missing_mdat_is_composition_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut media = fixtures::afra_box(false, false, &[], None);
        media.extend(fixtures::abst_box(&fixtures::AbstSpec::default()));
        media.extend(fixtures::raw_box(b"moof", b""));
        std::fs::write(dir.path().join("sSeg1.f4f"), &media).unwrap();
        let index = fixtures::afra_box(
            false,
            false,
            &[],
            Some(&[GlobalSpec {
                time: 0,
                segment: 1,
                fragment: 1,
                afra_offset: 0,
                sample_offset: 0,
            }][..]),
        );
        let index_path = dir.path().join("sSeg1.f4x");
        std::fs::write(&index_path, index).unwrap();

        let splitter = HdsSegmentSplitter::new(&index_path, None).unwrap();
        let err = splitter.split().unwrap().next().unwrap().unwrap_err();
        match err {
            Error::FragmentComposition { detail, .. } => {
                assert!(detail.contains("reached end of file"), "{detail}")
            }
            other => panic!("expected composition error, got {:?}", other),
        }
    }

    /// Index pointing at offset 0 of a media file holding `media`.
    fn segment_at_zero(dir: &Path, media: &[u8]) -> HdsSegmentSplitter {
        std::fs::write(dir.join("sSeg1.f4f"), media).unwrap();
        let index = fixtures::afra_box(
            false,
            false,
            &[],
            Some(&[GlobalSpec {
                time: 0,
                segment: 1,
                fragment: 1,
                afra_offset: 0,
                sample_offset: 0,
            }][..]),
        );
        let index_path = dir.join("sSeg1.f4x");
        std::fs::write(&index_path, index).unwrap();
        HdsSegmentSplitter::new(&index_path, None).unwrap()
    }

    fn first_error(splitter: &HdsSegmentSplitter) -> Error {
        splitter.split().unwrap().next().unwrap().unwrap_err()
    }

    #[test]
    fn test_junk_header_is_composition_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut media = vec![0, 0, 0, 3];
        media.extend_from_slice(b"junk");
        media.extend_from_slice(&[0u8; 24]);
        let splitter = segment_at_zero(dir.path(), &media);

        match first_error(&splitter) {
            Error::FragmentComposition { offset, detail, .. } => {
                assert_eq!(offset, 0);
                assert!(detail.contains("found junk"), "{detail}");
            }
            other => panic!("expected composition error, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_wrong_box_is_composition_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut media = vec![0xFF, 0xFF, 0xFF, 0xF0];
        media.extend_from_slice(b"moof");
        media.extend_from_slice(&[0u8; 32]);
        let splitter = segment_at_zero(dir.path(), &media);

        assert!(matches!(
            first_error(&splitter),
            Error::FragmentComposition { .. }
        ));
    }

    #[test]
    fn test_short_header_is_composition_error() {
        let dir = tempfile::tempdir().unwrap();
        let splitter = segment_at_zero(dir.path(), b"\0\0\0");

        match first_error(&splitter) {
            Error::FragmentComposition { detail, .. } => {
                assert!(detail.contains("expected afra at offset 0"), "{detail}")
            }
            other => panic!("expected composition error, got {:?}", other),
        }
    }

    #[test]
    fn test_undersized_afra_is_composition_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut media = vec![0, 0, 0, 4];
        media.extend_from_slice(b"afra");
        let splitter = segment_at_zero(dir.path(), &media);

        match first_error(&splitter) {
            Error::FragmentComposition { detail, .. } => {
                assert!(detail.contains("malformed afra"), "{detail}")
            }
            other => panic!("expected composition error, got {:?}", other),
        }
    }

    #[test]
    fn test_write_fragments_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let fixture = fixtures::write_segment(dir.path(), "liveSeg2", 2, &[1, 2]);
        let splitter = HdsSegmentSplitter::new(&fixture.index_path, None).unwrap();

        let first = splitter.write_fragments(&out, false).unwrap();
        assert_eq!(first, WriteSummary { written: 2, skipped: 0 });
        assert_eq!(
            std::fs::read(out.join("liveSeg2-Frag1")).unwrap(),
            fixture.fragments[0].1
        );

        let second = splitter.write_fragments(&out, false).unwrap();
        assert_eq!(second, WriteSummary { written: 0, skipped: 2 });

        let forced = splitter.write_fragments(&out, true).unwrap();
        assert_eq!(forced.written, 2);
    }
}
