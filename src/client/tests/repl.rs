#![cfg(test)]

use std::path::PathBuf;

use crate::client::repl::parse;
use crate::client::Command;

#[test]
fn test_empty_line() {
    assert_eq!(parse(""), Ok(None));
    assert_eq!(parse("   "), Ok(None));
}

#[test]
fn test_simple_commands() {
    assert_eq!(parse("help"), Ok(Some(Command::Help)));
    assert_eq!(parse("exit"), Ok(Some(Command::Exit)));
    assert_eq!(parse("quit"), Ok(Some(Command::Exit)));
    assert_eq!(parse("dmesg"), Ok(Some(Command::Dmesg)));
    assert_eq!(parse("selftest"), Ok(Some(Command::Selftest)));
    assert_eq!(parse("pwd"), Ok(Some(Command::Pwd)));
}

#[test]
fn test_cd_defaults_to_dot() {
    assert_eq!(parse("cd"), Ok(Some(Command::Cd { path: ".".to_owned() })));
    assert_eq!(
        parse(r"cd \\vol1\dir"),
        Ok(Some(Command::Cd { path: r"\\vol1\dir".to_owned() }))
    );
}

#[test]
fn test_ls_variants() {
    assert_eq!(parse("ls"), Ok(Some(Command::Ls { long: false, path: ".".to_owned() })));
    assert_eq!(parse("ls -l"), Ok(Some(Command::Ls { long: true, path: ".".to_owned() })));
    assert_eq!(
        parse(r"ls -l \\vol1"),
        Ok(Some(Command::Ls { long: true, path: r"\\vol1".to_owned() }))
    );
    assert_eq!(
        parse(r"ll sub"),
        Ok(Some(Command::Ls { long: true, path: "sub".to_owned() }))
    );
}

#[test]
fn test_get_variants() {
    assert_eq!(
        parse(r"get \\vol1\a.bin"),
        Ok(Some(Command::Get { remote: r"\\vol1\a.bin".to_owned(), local: None }))
    );
    assert_eq!(
        parse(r"get \\vol1\a.bin copy.bin"),
        Ok(Some(Command::Get {
            remote: r"\\vol1\a.bin".to_owned(),
            local: Some(PathBuf::from("copy.bin")),
        }))
    );
    assert!(parse("get").is_err());
}

#[test]
fn test_unknown_and_trailing() {
    assert!(parse("frobnicate").is_err());
    assert!(parse("pwd extra").is_err());
}
