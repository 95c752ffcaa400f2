//! Shared fixtures: a temporary volume tree matching what the selftest
//! harness expects, and helpers to drive the server with raw frames.

#![allow(dead_code)]

use std::time::Instant;

use tempfile::TempDir;

use isobusfs::client::selftest::pattern_byte;
use isobusfs::config::ServerConfig;
use isobusfs::parser::{self, Response};
use isobusfs::server::Server;

pub const CLIENT: u8 = 0x90;
pub const CLIENT2: u8 = 0x91;
pub const SERVER: u8 = 0x28;

/// Bytes of a pattern file of the given length.
pub fn pattern_data(len: usize) -> Vec<u8> {
    (0..len as u64).map(pattern_byte).collect()
}

pub struct Fixture {
    pub tempdir: TempDir,
    pub config: ServerConfig,
}

impl Fixture {
    /// Builds the volume tree the selftest walks: `dir1/dir2`, `dir5`,
    /// `mfs`, `selftest/nested/deep` and `selftest/pattern.bin`.
    pub fn new() -> Self {
        let tempdir = TempDir::new().expect("create temp dir");
        for dir in ["dir1/dir2", "dir5", "mfs", "selftest/nested/deep"] {
            std::fs::create_dir_all(tempdir.path().join(dir)).expect("create fixture dir");
        }
        std::fs::write(tempdir.path().join("selftest/pattern.bin"), pattern_data(1024))
            .expect("write pattern file");

        let text = format!(
            "default_volume = \"vol1\"\nmanufacturer_dir = \"mfs\"\n\n\
             [[volume]]\nname = \"vol1\"\npath = \"{}\"\n",
            tempdir.path().display()
        );
        let config = ServerConfig::parse(&text).expect("valid fixture config");
        Self { tempdir, config }
    }

    pub fn server(&self, now: Instant) -> Server {
        Server::new(&self.config, now)
    }

    pub fn write_file(&self, rel: &str, data: &[u8]) {
        std::fs::write(self.tempdir.path().join(rel), data).expect("write fixture file");
    }
}

/// Sends one raw request frame and decodes the single queued reply.
pub async fn exchange(server: &mut Server, src: u8, frame: Vec<u8>, now: Instant) -> Response {
    server.handle_datagram(src, &frame, now).await;
    let outbox = server.take_outbox();
    assert_eq!(outbox.len(), 1, "expected exactly one reply");
    parser::response(&outbox[0].data).expect("decodable reply")
}
