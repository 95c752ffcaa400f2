use std::path::Path;

use isobusfs::path::{normalize, to_host_path, Error, IsobusPath};

const MFS: &str = "mfs";

fn dir(s: &str) -> IsobusPath {
    IsobusPath::parse(s).expect("valid absolute path")
}

#[test]
fn absolute_path_replaces_current() {
    let current = dir(r"\\vol1\dir1");
    let result = normalize(&current, r"\\vol2\data", MFS).unwrap();
    assert_eq!(result.to_string(), r"\\vol2\data");
}

#[test]
fn relative_path_appends() {
    let current = dir(r"\\vol1\dir1");
    let result = normalize(&current, r"sub\deeper", MFS).unwrap();
    assert_eq!(result.to_string(), r"\\vol1\dir1\sub\deeper");
}

#[test]
fn dotdot_pops_one_segment() {
    // current \\vol1\dir1, argument ..\dir5 -> \\vol1\dir5
    let current = dir(r"\\vol1\dir1");
    let result = normalize(&current, r"..\dir5", MFS).unwrap();
    assert_eq!(result.to_string(), r"\\vol1\dir5");
}

#[test]
fn trailing_separators_are_inert() {
    // current \\vol1\dir1\dir2, argument ..\\\ -> \\vol1\dir1
    let current = dir(r"\\vol1\dir1\dir2");
    let result = normalize(&current, r"..\\\", MFS).unwrap();
    assert_eq!(result.to_string(), r"\\vol1\dir1");
}

#[test]
fn run_of_separators_alone_is_rejected() {
    let current = dir(r"\\vol1");
    assert!(matches!(normalize(&current, r"\\\\", MFS), Err(Error::EmptyVolume)));
    assert!(matches!(normalize(&current, r"\\\\\\\\", MFS), Err(Error::EmptyVolume)));
}

#[test]
fn three_leading_separators_rejected() {
    let current = dir(r"\\vol1");
    assert!(matches!(normalize(&current, r"\\\vol1", MFS), Err(Error::EmptyVolume)));
}

#[test]
fn tilde_expands_at_volume_root() {
    // current \\vol1, argument ~\ -> \\vol1\mfs
    let current = dir(r"\\vol1");
    let result = normalize(&current, r"~\", MFS).unwrap();
    assert_eq!(result.to_string(), r"\\vol1\mfs");

    let result = normalize(&current, "~", MFS).unwrap();
    assert_eq!(result.to_string(), r"\\vol1\mfs");
}

#[test]
fn tilde_expands_against_current_volume_not_directory() {
    let current = dir(r"\\vol2\somewhere\deep");
    let result = normalize(&current, r"~\cfg", MFS).unwrap();
    assert_eq!(result.to_string(), r"\\vol2\mfs\cfg");
}

#[test]
fn misplaced_tilde_rejected() {
    let current = dir(r"\\vol1");
    assert!(matches!(normalize(&current, r"\~", MFS), Err(Error::TildeNotAtRoot)));
    assert!(matches!(normalize(&current, r"\~\x", MFS), Err(Error::TildeNotAtRoot)));
    assert!(matches!(normalize(&current, r"\\~\x", MFS), Err(Error::TildeNotAtRoot)));
}

#[test]
fn tilde_is_a_regular_component_away_from_the_root() {
    let current = dir(r"\\vol1\dir1");
    let result = normalize(&current, r"a\~\b", MFS).unwrap();
    assert_eq!(result.to_string(), r"\\vol1\dir1\a\~\b");
}

#[test]
fn normalization_is_idempotent() {
    let inputs =
        [r"\\vol1", r"\\vol1\dir1", r"\\vol1\dir1\dir2\file.txt", r"\\v\a\b\c\d\e"];
    let current = dir(r"\\other\place");
    for input in inputs {
        let once = normalize(&current, input, MFS).unwrap();
        let twice = normalize(&current, &once.to_string(), MFS).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.to_string(), input);
    }
}

#[test]
fn dotdot_never_crosses_the_volume_root() {
    let current = dir(r"\\vol1\a\b");
    for input in [r"..", r"..\..", r"..\..\..", r"..\..\..\..\..\..\..\.."] {
        let result = normalize(&current, input, MFS).unwrap();
        assert_eq!(result.volume(), "vol1");
        assert!(result.to_string().starts_with(r"\\vol1"));
    }
    let all_the_way = normalize(&current, r"..\..\..\..", MFS).unwrap();
    assert_eq!(all_the_way.to_string(), r"\\vol1");
}

#[test]
fn forbidden_characters_rejected() {
    let current = dir(r"\\vol1");
    for input in
        ["a*b", "a?b", "a<b", "a>b", "a|b", "a/b", "\u{0000}x", "\u{001F}x", "\u{007F}x", "\u{0090}x"]
    {
        assert!(
            matches!(normalize(&current, input, MFS), Err(Error::ForbiddenCharacter(_))),
            "{input:?} must be rejected"
        );
    }
}

#[test]
fn dot_segments_are_consumed() {
    let current = dir(r"\\vol1\dir1");
    let result = normalize(&current, r".\sub\.\leaf", MFS).unwrap();
    assert_eq!(result.to_string(), r"\\vol1\dir1\sub\leaf");
}

#[test]
fn parse_requires_absolute_input() {
    assert!(matches!(IsobusPath::parse("dir"), Err(Error::NotAbsolute)));
    assert!(matches!(IsobusPath::parse(r"\\"), Err(Error::EmptyVolume)));
    assert!(matches!(IsobusPath::parse(r"\\~"), Err(Error::TildeNotAtRoot)));
}

#[test]
fn host_translation_joins_segments() {
    let path = dir(r"\\vol1\dir1\file.bin");
    let host = to_host_path(Path::new("/srv/vol1"), &path).unwrap();
    assert_eq!(host, Path::new("/srv/vol1/dir1/file.bin"));
}

#[test]
fn host_translation_enforces_length() {
    let current = dir(r"\\vol1");
    let long = "x".repeat(200);
    let mut input = String::from(r"\\vol1");
    for _ in 0..8 {
        input.push('\\');
        input.push_str(&long);
    }
    let path = normalize(&current, &input, MFS).unwrap();
    assert!(matches!(
        to_host_path(Path::new("/srv/vol1"), &path),
        Err(Error::HostPathTooLong)
    ));
}
