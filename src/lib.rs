//! ISOBUS FS - an ISO 11783-13 File System client/server pair speaking the
//! J1939 transport.

pub mod client;
pub mod config;
pub mod parser;
pub mod path;
pub mod protocol;
pub mod serializer;
pub mod server;
pub mod transport;
