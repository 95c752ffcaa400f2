#![cfg(test)]

use crate::protocol::{fat_date, fat_time, ErrorCode};
use crate::serializer::{error, i32, name, reserved, u16, u32};

#[test]
fn test_scalars_little_endian() {
    let mut buf = Vec::new();
    u16(&mut buf, 0x1234).unwrap();
    u32(&mut buf, 0xDEADBEEF).unwrap();
    i32(&mut buf, -2).unwrap();
    assert_eq!(&buf[..2], &[0x34, 0x12]);
    assert_eq!(&buf[2..6], &[0xEF, 0xBE, 0xAD, 0xDE]);
    assert_eq!(&buf[6..10], &(-2i32).to_le_bytes());
}

#[test]
fn test_name_length_prefix() {
    let mut buf = Vec::new();
    name(&mut buf, "\\\\vol1").unwrap();
    assert_eq!(&buf[..2], &[6, 0]);
    assert_eq!(&buf[2..], b"\\\\vol1");
}

#[test]
fn test_name_too_long() {
    let mut buf = Vec::new();
    let long = "x".repeat(2000);
    assert!(name(&mut buf, &long).is_err());
}

#[test]
fn test_error_code_byte() {
    let mut buf = Vec::new();
    error(&mut buf, ErrorCode::EndOfFile).unwrap();
    assert_eq!(buf, vec![45]);
}

#[test]
fn test_reserved_padding_bytes() {
    let mut buf = Vec::new();
    reserved(&mut buf, 3).unwrap();
    assert_eq!(buf, vec![0xFF, 0xFF, 0xFF]);
}

#[test]
fn test_fat_date_word() {
    // 2024-03-07: ((2024-1980) << 9) | (3 << 5) | 7
    assert_eq!(fat_date(2024, 3, 7), (44 << 9) | (3 << 5) | 7);
    // Clamped below the 1980 epoch.
    assert_eq!(fat_date(1970, 1, 1), (1 << 5) | 1);
}

#[test]
fn test_fat_time_word() {
    // 13:45:31 -> seconds stored at 2-second resolution.
    assert_eq!(fat_time(13, 45, 31), (13 << 11) | (45 << 5) | 15);
}
