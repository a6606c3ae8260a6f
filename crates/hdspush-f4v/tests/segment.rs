//! End-to-end decoding and splitting over files on disk.

use hdspush_f4v::fixtures::{self, AbstSpec, AfrtEntrySpec};
use hdspush_f4v::{
    parse_bytes, parse_file, BoxType, Error, F4vBox, FragmentRandomAccessBox, HdsSegmentSplitter,
};

fn index_afra(path: &std::path::Path) -> FragmentRandomAccessBox {
    let boxes: Vec<F4vBox> = parse_file(path).unwrap().map(|b| b.unwrap()).collect();
    assert_eq!(boxes.len(), 1);
    match boxes.into_iter().next() {
        Some(F4vBox::RandomAccess(afra)) => afra,
        other => panic!("expected afra, got {:?}", other),
    }
}

#[test]
fn extracted_fragments_decode_as_standalone_files() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = fixtures::write_segment(dir.path(), "eventSeg4", 4, &[10, 11, 12, 13]);

    let splitter = HdsSegmentSplitter::new(&fixture.index_path, None).unwrap();
    for fragment in splitter.split().unwrap() {
        let fragment = fragment.unwrap();
        let types: Vec<BoxType> = parse_bytes(fragment.payload.clone())
            .map(|b| b.unwrap().box_type())
            .collect();
        assert_eq!(
            types,
            vec![BoxType::AFRA, BoxType::ABST, BoxType::MOOF, BoxType::MDAT]
        );

        let last = parse_bytes(fragment.payload.clone()).last().unwrap().unwrap();
        match last {
            F4vBox::MediaData(mdat) => {
                let expected = format!("media-{}", fragment.fragment_number);
                assert_eq!(mdat.payload.as_ref(), expected.as_bytes());
            }
            other => panic!("expected mdat, got {:?}", other),
        }
    }
}

#[test]
fn index_offsets_match_media_layout() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = fixtures::write_segment(dir.path(), "eventSeg1", 1, &[2, 1]);
    let afra = index_afra(&fixture.index_path);

    let mut offsets: Vec<u64> = afra.global_entries.iter().map(|e| e.afra_offset).collect();
    offsets.sort_unstable();

    // Each fragment starts where the previous one ends.
    let media = std::fs::read(&fixture.media_path).unwrap();
    let first_len = fixture
        .fragments
        .iter()
        .find(|(n, _)| *n == 1)
        .map(|(_, b)| b.len() as u64)
        .unwrap();
    assert_eq!(offsets[1] - offsets[0], first_len);
    assert_eq!(offsets[0], 16);
    assert!(offsets[1] < media.len() as u64);
}

#[test]
fn truncated_media_file_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = fixtures::write_segment(dir.path(), "cutSeg1", 1, &[1, 2]);
    let media = std::fs::read(&fixture.media_path).unwrap();
    std::fs::write(&fixture.media_path, &media[..media.len() - 3]).unwrap();

    let splitter = HdsSegmentSplitter::new(&fixture.index_path, None).unwrap();
    let results: Vec<_> = splitter.split().unwrap().collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    match &results[1] {
        Err(Error::Truncated { .. }) => {}
        other => panic!("expected truncation, got {:?}", other),
    }
}

#[test]
fn bootstrap_table_counts_match_declared_counts() {
    for (segments, fragments) in [(0usize, 0usize), (1, 1), (3, 2)] {
        let spec = AbstSpec {
            segment_runs: (0..segments).map(|i| vec![(i as u32 + 1, 5)]).collect(),
            fragment_runs: (0..fragments)
                .map(|i| vec![AfrtEntrySpec::new(i as u32 * 5 + 1, 0, 4000)])
                .collect(),
            ..AbstSpec::default()
        };
        let decoded = parse_bytes(fixtures::abst_box(&spec)).next().unwrap().unwrap();
        match decoded {
            F4vBox::Bootstrap(abst) => {
                assert_eq!(abst.segments.len(), segments);
                assert_eq!(abst.fragment_tables.len(), fragments);
            }
            other => panic!("expected abst, got {:?}", other),
        }
    }
}
