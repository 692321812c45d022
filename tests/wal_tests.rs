//! End-to-end tests for the write-ahead log.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use pagelog::{
    segments, CorruptionKind, Error, Wal, WalMetrics, WalOptions, WalReader, PAGE_SIZE,
};
use tempfile::TempDir;

fn open_wal(dir: &Path, segment_size: usize) -> Wal {
    let options = WalOptions::new().segment_size(segment_size);
    Wal::open(dir, options, Arc::new(WalMetrics::new())).unwrap()
}

/// Read every record from every segment, ascending by index.
fn read_all(dir: &Path) -> Vec<Vec<u8>> {
    let mut refs = segments(dir).unwrap();
    refs.sort_by_key(|r| r.index);

    let mut records = Vec::new();
    for r in refs {
        let mut reader = WalReader::open(dir, r.index, &r.extension).unwrap();
        while reader.next() {
            records.push(reader.record().to_vec());
        }
        assert!(reader.err().is_none(), "unexpected error: {:?}", reader.err());
    }
    records
}

/// Parse the fragment stream of one segment file, returning every
/// fragment's length field.
fn scan_fragment_lengths(path: &Path) -> Vec<usize> {
    let bytes = std::fs::read(path).unwrap();
    let mut lengths = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] & 0x07 == 0 {
            // Page terminator: skip to the next page boundary.
            pos = (pos / PAGE_SIZE + 1) * PAGE_SIZE;
            continue;
        }
        let length = u16::from_be_bytes([bytes[pos + 1], bytes[pos + 2]]) as usize;
        lengths.push(length);
        pos += 7 + length;
    }

    lengths
}

/// Test writing mixed-size records and reading them back in order.
#[test]
fn wal_write_read_roundtrip() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(dir.path(), PAGE_SIZE * 4);

    let test_data: Vec<Vec<u8>> = vec![
        b"test record 1".to_vec(),
        b"test record 2 with some longer content".to_vec(),
        b"test record 3".to_vec(),
        b"large record ".repeat(1000),
    ];

    for (i, data) in test_data.iter().enumerate() {
        wal.log(data, i as u64).unwrap();
    }
    wal.stop().unwrap();

    assert_eq!(read_all(dir.path()), test_data);

    // Every segment is page-aligned at rest.
    for r in segments(dir.path()).unwrap() {
        let len = std::fs::metadata(r.path(dir.path())).unwrap().len();
        assert_eq!(len % PAGE_SIZE as u64, 0, "segment {} misaligned", r.name);
    }
}

/// Test that appends exceeding the segment size force rotation.
#[test]
fn wal_segment_rotation() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(dir.path(), PAGE_SIZE * 2);

    let large = vec![b'x'; PAGE_SIZE];
    wal.log(&large, 1).unwrap();
    wal.log(&large, 2).unwrap();
    wal.log(&large, 3).unwrap();
    wal.stop().unwrap();

    let refs = segments(dir.path()).unwrap();
    assert!(refs.len() >= 3, "expected >= 3 segments, got {}", refs.len());

    assert_eq!(
        read_all(dir.path()),
        vec![large.clone(), large.clone(), large]
    );
}

/// Test that a record spanning several pages reassembles exactly.
#[test]
fn wal_multi_page_record() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(dir.path(), PAGE_SIZE * 8);

    let record: Vec<u8> = (0..PAGE_SIZE * 3).map(|i| (i % 251) as u8).collect();
    wal.log(&record, 0).unwrap();
    wal.stop().unwrap();

    assert_eq!(read_all(dir.path()), vec![record]);
}

/// Test recovery: a second instance appends after the first stopped.
#[test]
fn wal_reopen_appends() {
    let dir = TempDir::new().unwrap();

    let wal = open_wal(dir.path(), PAGE_SIZE * 4);
    wal.log(b"recovery test 1", 0).unwrap();
    wal.log(b"recovery test 2", 1).unwrap();
    wal.stop().unwrap();

    let wal = open_wal(dir.path(), PAGE_SIZE * 4);
    wal.log(b"recovery test 3", 2).unwrap();
    wal.stop().unwrap();

    assert_eq!(
        read_all(dir.path()),
        vec![
            b"recovery test 1".to_vec(),
            b"recovery test 2".to_vec(),
            b"recovery test 3".to_vec(),
        ]
    );
}

/// Test that many small records across rotations all survive.
#[test]
fn wal_read_multiple_segments() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(dir.path(), PAGE_SIZE * 2);

    let expected: Vec<Vec<u8>> = (0..10)
        .map(|i| format!("test record {i}: {}", "payload ".repeat(2000)).into_bytes())
        .collect();

    for (i, data) in expected.iter().enumerate() {
        wal.log(data, i as u64).unwrap();
    }
    wal.stop().unwrap();

    assert!(segments(dir.path()).unwrap().len() > 1);
    assert_eq!(read_all(dir.path()), expected);
}

/// Test that overwritten bytes inside a record are caught by the CRC.
#[test]
fn wal_corruption_detected() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(dir.path(), PAGE_SIZE * 4);

    let original = b"test data for corruption test".to_vec();
    wal.log(&original, 1).unwrap();
    wal.stop().unwrap();

    let refs = segments(dir.path()).unwrap();
    let r = &refs[0];
    let path = r.path(dir.path());

    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(20)).unwrap();
    file.write_all(&[0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
    drop(file);

    let mut reader = WalReader::open(dir.path(), r.index, &r.extension).unwrap();
    while reader.next() {
        assert_ne!(reader.record(), &original[..], "corrupted record read back intact");
    }
    assert!(matches!(
        reader.err().and_then(Error::corruption_kind),
        Some(CorruptionKind::BadCrc { .. })
    ));
}

/// Test that a single flipped payload bit surfaces as a CRC failure.
#[test]
fn wal_single_bit_flip_detected() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(dir.path(), PAGE_SIZE * 4);

    wal.log(&vec![b'z'; 512], 0).unwrap();
    wal.stop().unwrap();

    let refs = segments(dir.path()).unwrap();
    let r = &refs[0];
    let path = r.path(dir.path());

    // Flip one bit in the middle of the payload (header is 7 bytes).
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[7 + 256] ^= 0x10;
    std::fs::write(&path, &bytes).unwrap();

    let mut reader = WalReader::open(dir.path(), r.index, &r.extension).unwrap();
    assert!(!reader.next());
    assert!(matches!(
        reader.err().and_then(Error::corruption_kind),
        Some(CorruptionKind::BadCrc { .. })
    ));
}

/// Test that a non-zero byte in page padding surfaces as a torn page.
#[test]
fn wal_torn_page_detected() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(dir.path(), PAGE_SIZE * 4);

    wal.log(b"lonely record", 0).unwrap();
    wal.stop().unwrap();

    let refs = segments(dir.path()).unwrap();
    let r = &refs[0];
    let path = r.path(dir.path());

    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(PAGE_SIZE as u64 - 100)).unwrap();
    file.write_all(&[0xAA]).unwrap();
    drop(file);

    let mut reader = WalReader::open(dir.path(), r.index, &r.extension).unwrap();
    assert!(reader.next());
    assert_eq!(reader.record(), b"lonely record");

    assert!(!reader.next());
    assert_eq!(
        reader.err().and_then(Error::corruption_kind),
        Some(CorruptionKind::TornPage)
    );
}

/// Test that a file truncated mid-fragment reads as a torn tail.
#[test]
fn wal_truncated_tail_detected() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(dir.path(), PAGE_SIZE * 4);

    wal.log(&vec![b'q'; 1000], 0).unwrap();
    wal.stop().unwrap();

    let refs = segments(dir.path()).unwrap();
    let r = &refs[0];
    let path = r.path(dir.path());

    // Cut the file in the middle of the fragment payload.
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(500).unwrap();
    drop(file);

    let mut reader = WalReader::open(dir.path(), r.index, &r.extension).unwrap();
    assert!(!reader.next());
    assert_eq!(
        reader.err().and_then(Error::corruption_kind),
        Some(CorruptionKind::TornTail)
    );
}

/// Test that no fragment's length field ever exceeds a page's capacity.
#[test]
fn wal_framing_bound() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(dir.path(), PAGE_SIZE * 2);

    for i in 0..4u64 {
        wal.log(&vec![b'f'; PAGE_SIZE + 123], i).unwrap();
    }
    wal.stop().unwrap();

    let mut saw_fragments = false;
    for r in segments(dir.path()).unwrap() {
        for length in scan_fragment_lengths(&r.path(dir.path())) {
            saw_fragments = true;
            assert!(length <= PAGE_SIZE - 7, "fragment length {length} too large");
        }
    }
    assert!(saw_fragments);
}

/// Test that a misaligned segment size is rejected at open.
#[test]
fn wal_invalid_segment_size() {
    let dir = TempDir::new().unwrap();
    let options = WalOptions::new().segment_size(33000);

    let err = Wal::open(dir.path(), options, Arc::new(WalMetrics::new())).unwrap_err();
    assert!(matches!(err, Error::InvalidSegmentSize { size: 33000 }));
}

/// Test an empty log: stop without writes, then read.
#[test]
fn wal_empty_log_reads_nothing() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(dir.path(), PAGE_SIZE * 4);
    wal.stop().unwrap();

    let r = pagelog::last_segment(dir.path()).unwrap().unwrap();
    let mut reader = WalReader::open(dir.path(), r.index, &r.extension).unwrap();

    assert!(!reader.next());
    assert!(reader.err().is_none());
}

/// Test that stopping twice reports the lifecycle error.
#[test]
fn wal_idempotent_stop() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(dir.path(), PAGE_SIZE * 4);

    wal.stop().unwrap();
    assert!(matches!(wal.stop(), Err(Error::WalAlreadyClosed)));
}

/// Test that a reader sees the flushed tail of the active segment.
#[test]
fn wal_reader_sees_partial_flush() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(dir.path(), PAGE_SIZE * 4);

    wal.log(b"visible before stop", 0).unwrap();

    let active = wal.active_segment_ref().unwrap();
    let mut reader = WalReader::open(dir.path(), active.index, &active.extension).unwrap();
    assert!(reader.next());
    assert_eq!(reader.record(), b"visible before stop");
    assert!(!reader.next());
    assert!(reader.err().is_none());

    wal.stop().unwrap();
}

/// Test the records iterator across a stop/reopen cycle.
#[test]
fn wal_records_iterator() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(dir.path(), PAGE_SIZE * 4);

    wal.log(b"first", 0).unwrap();
    wal.log(b"second", 1).unwrap();
    wal.stop().unwrap();

    let r = pagelog::last_segment(dir.path()).unwrap().unwrap();
    let records: Vec<_> = WalReader::open(dir.path(), r.index, &r.extension)
        .unwrap()
        .records()
        .collect::<pagelog::Result<_>>()
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(&records[0][..], b"first");
    assert_eq!(&records[1][..], b"second");
}
