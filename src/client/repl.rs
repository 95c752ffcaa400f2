//! Parsing of interactive command lines.

use std::path::PathBuf;

use super::Command;

/// Help text printed by the `help` command.
pub const HELP: &str = "\
commands:
  help                 print this text
  exit | quit          leave the client
  dmesg                print the transmit log
  selftest             run the built-in server exercise
  ls [-l] [path]       list a directory (default: .)
  ll [path]            list a directory, long format
  cd [path]            change the current directory
  pwd                  print the current directory
  get <remote> [local] download a file
paths use backslashes: \\\\volume\\directory\\file";

/// Parses one command line. An empty line parses to `None`; an unknown
/// command or malformed arguments report a message for the user.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let parsed = match command {
        "help" => Command::Help,
        "exit" | "quit" => Command::Exit,
        "dmesg" => Command::Dmesg,
        "selftest" => Command::Selftest,
        "pwd" => Command::Pwd,
        "cd" => Command::Cd { path: words.next().unwrap_or(".").to_owned() },
        "ls" | "ll" => {
            let mut long = command == "ll";
            let mut path = None;
            for word in words.by_ref() {
                if word == "-l" {
                    long = true;
                } else {
                    path = Some(word.to_owned());
                    break;
                }
            }
            Command::Ls { long, path: path.unwrap_or_else(|| ".".to_owned()) }
        }
        "get" => {
            let Some(remote) = words.next() else {
                return Err("get: remote path required".to_owned());
            };
            Command::Get {
                remote: remote.to_owned(),
                local: words.next().map(PathBuf::from),
            }
        }
        other => return Err(format!("unknown command {other:?}, try help")),
    };
    if let Some(extra) = words.next() {
        return Err(format!("{command}: unexpected argument {extra:?}"));
    }
    Ok(Some(parsed))
}
