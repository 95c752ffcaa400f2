#![cfg(test)]

use crate::client::selftest::{pattern_byte, CCD_PATTERNS};

#[test]
fn test_pattern_bytes() {
    // Word 0 encodes 0x00000000 big-endian, xored with the mask.
    assert_eq!(pattern_byte(0), 0xDE);
    assert_eq!(pattern_byte(1), 0xAD);
    assert_eq!(pattern_byte(2), 0xBE);
    assert_eq!(pattern_byte(3), 0xEF);
    // Word 1 encodes 0x00000001 big-endian.
    assert_eq!(pattern_byte(4), 0xDE);
    assert_eq!(pattern_byte(7), 0x01 ^ 0xEF);
    // Word 0x0102 starts at byte offset 0x0408.
    assert_eq!(pattern_byte(0x0408 + 2), 0x01 ^ 0xBE);
    assert_eq!(pattern_byte(0x0408 + 3), 0x02 ^ 0xEF);
}

#[test]
fn test_pattern_table_shape() {
    assert!(CCD_PATTERNS.len() >= 40);
    // The walk starts and ends with an absolute reset.
    assert_eq!(CCD_PATTERNS.first().map(|p| p.pattern), Some(r"\\vol1"));
    assert_eq!(CCD_PATTERNS.last().map(|p| p.pattern), Some(r"\\vol1"));
    assert!(CCD_PATTERNS.iter().any(|p| !p.expect_pass));
}
