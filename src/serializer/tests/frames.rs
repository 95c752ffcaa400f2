#![cfg(test)]

use crate::protocol::{ErrorCode, GroupFunction, SeekMode, MAX_DATA_LEN};
use crate::serializer::{cm, dh, fa, Frame};

#[test]
fn test_short_frames_padded_to_eight() {
    // Every message shorter than the minimum transfer length must be
    // right-padded with 0xFF on the physical transmission.
    let frames = [
        cm::cc_maintenance(2).unwrap(),
        cm::get_fs_properties_req(0).unwrap(),
        dh::get_current_dir_req(1).unwrap(),
        dh::change_current_dir_res(1, ErrorCode::Success).unwrap(),
        fa::close_file_req(9, 3).unwrap(),
        fa::close_file_res(9, ErrorCode::InvalidHandle).unwrap(),
    ];
    for frame in frames {
        assert_eq!(frame.len(), 8, "{frame:?}");
        let used = match frame[0] {
            0x00 => 2,  // maintenance: header + version
            0x01 => 2,  // properties request: header + tan
            0x10 => 2,  // current dir request: header + tan
            0x11 => 3,  // change dir response: header + tan + error
            0x24 => 3,  // close: header + tan + handle or error
            other => panic!("unexpected header {other:#x}"),
        };
        assert!(frame[used..].iter().all(|&b| b == 0xFF), "{frame:?}");
    }
}

#[test]
fn test_frame_builder_keeps_long_payloads() {
    let mut frame = Frame::new(GroupFunction(0x22));
    use std::io::Write;
    frame.write_all(&[0u8; 20]).unwrap();
    assert_eq!(frame.finish().len(), 21);
}

#[test]
fn test_header_byte_packs_group_and_function() {
    let frame = fa::seek_file_req(0, 1, SeekMode::Set, 0).unwrap();
    assert_eq!(frame[0] >> 4, 2);
    assert_eq!(frame[0] & 0x0F, 1);
}

#[test]
fn test_read_data_cap_enforced() {
    let too_big = vec![0u8; MAX_DATA_LEN + 1];
    assert!(fa::read_file_res(0, ErrorCode::Success, &too_big).is_err());
    let exactly = vec![0u8; MAX_DATA_LEN];
    assert!(fa::read_file_res(0, ErrorCode::Success, &exactly).is_ok());
}
