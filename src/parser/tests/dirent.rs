#![cfg(test)]

use crate::parser::dirent::entries;
use crate::parser::Error;
use crate::protocol::{DirectoryEntry, ATTR_DIRECTORY, ATTR_READ_ONLY};
use crate::serializer;

fn sample(name: &str, attributes: u8, size: u32) -> DirectoryEntry {
    DirectoryEntry { name: name.to_owned(), attributes, date: 0x5821, time: 0x4A31, size }
}

#[test]
fn test_single_record_layout() {
    let mut buf = Vec::new();
    serializer::dirent::entry(&mut buf, &sample("a.txt", ATTR_READ_ONLY, 512)).unwrap();
    assert_eq!(buf[0], 5);
    assert_eq!(&buf[1..6], b"a.txt");
    assert_eq!(buf[6], ATTR_READ_ONLY);
    assert_eq!(&buf[7..9], &[0x21, 0x58]);
    assert_eq!(&buf[9..11], &[0x31, 0x4A]);
    assert_eq!(&buf[11..15], &512u32.to_le_bytes());
    assert_eq!(buf.len(), 15);
}

#[test]
fn test_multiple_records() {
    let list =
        vec![sample("dir", ATTR_DIRECTORY, 0), sample("data.bin", 0, 70000), sample("x", 0, 1)];
    let mut buf = Vec::new();
    serializer::dirent::entries(&mut buf, &list).unwrap();
    let parsed = entries(&buf).unwrap();
    assert_eq!(parsed, list);
    assert!(parsed[0].is_directory());
    assert!(!parsed[1].is_directory());
}

#[test]
fn test_truncated_record() {
    let mut buf = Vec::new();
    serializer::dirent::entry(&mut buf, &sample("name", 0, 3)).unwrap();
    buf.truncate(buf.len() - 2);
    assert!(matches!(entries(&buf), Err(Error::IO(_))));
}

#[test]
fn test_empty_block() {
    assert!(entries(&[]).unwrap().is_empty());
}
