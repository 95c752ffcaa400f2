//! The file-server state machine.
//!
//! A single task owns every table: client sessions keyed by source address,
//! the shared open-handle table, the volume table and the status beacon.
//! [`Server::handle_datagram`] decodes one inbound message and queues the
//! reply; [`Server::tick`] runs the periodic work (idle-client eviction and
//! the status broadcast). [`Server::run`] drives both over an endpoint.

pub mod handles;
pub mod session;
pub mod status;
pub mod volume;

use std::io;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::parser::{self, Request};
use crate::path::{self, IsobusPath};
use crate::protocol::{
    ErrorCode, VolumeMode, CAP_MULTIPLE_VOLUMES, FILE_HANDLE_ERROR, FSS_BUSY_READING,
    MAX_HANDLES, OPEN_ACCESS_MASK, OPEN_READ_WRITE, OPEN_WRITE, PADDING_BYTE, PGN_ACK,
    PGN_CLIENT_TO_FS, PGN_FS_TO_CLIENT, VERSION_NUMBER,
};
use crate::serializer::{ack, cm, dh, fa};
use crate::transport::{Addr, Dest, Endpoint, Outgoing};

use self::handles::{map_io_error, HandleTable};
use self::session::SessionTable;
use self::status::Beacon;
use self::volume::VolumeTable;

/// The file server.
pub struct Server {
    volumes: VolumeTable,
    sessions: SessionTable,
    handles: HandleTable,
    beacon: Beacon,
    busy: u8,
    outbox: Vec<Outgoing>,
}

impl Server {
    pub fn new(config: &ServerConfig, now: Instant) -> Self {
        Self {
            volumes: VolumeTable::new(config),
            sessions: SessionTable::new(),
            handles: HandleTable::new(),
            beacon: Beacon::new(now),
            busy: 0,
            outbox: Vec::new(),
        }
    }

    /// Number of currently open handles.
    pub fn open_files(&self) -> u8 {
        self.handles.open_count()
    }

    /// Reference count of one handle, for observation.
    pub fn handle_refcount(&self, handle: u8) -> Option<usize> {
        self.handles.refcount(handle)
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.sessions.len()
    }

    /// Takes every message queued since the last drain.
    pub fn take_outbox(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    /// Processes one inbound datagram from a client.
    pub async fn handle_datagram(&mut self, src: Addr, data: &[u8], now: Instant) {
        let request = match parser::request(data) {
            Ok(request) => request,
            Err(err) => {
                warn!(src, "rejecting frame: {err:?}");
                let offending = data.first().copied().unwrap_or(PADDING_BYTE);
                if let Err(err) = self.nack(src, offending) {
                    warn!(src, "cannot build negative acknowledgment: {err}");
                }
                return;
            }
        };
        if self.sessions.touch(src, now).is_none() {
            return;
        }
        if let Err(err) = self.handle_request(src, request).await {
            warn!(src, "cannot serialize response: {err}");
        }
    }

    /// Runs the periodic work: idle-client eviction and the status beacon.
    pub fn tick(&mut self, now: Instant) -> io::Result<()> {
        for addr in self.sessions.evict_idle(now) {
            self.handles.release_client(addr);
            self.volumes.release_all(addr);
        }
        if let Some(frame) = self.beacon.tick(now, self.busy, self.handles.open_count())? {
            self.outbox.push(Outgoing {
                dest: Dest::Broadcast,
                pgn: PGN_FS_TO_CLIENT,
                data: frame,
            });
            // Busy bits cover the work observed since the previous beacon.
            self.busy = 0;
        }
        Ok(())
    }

    /// The next instant periodic work becomes due.
    pub fn next_deadline(&self, now: Instant) -> Instant {
        let far = now + Duration::from_secs(3600);
        self.beacon
            .next_deadline()
            .min(self.sessions.next_deadline().unwrap_or(far))
    }

    /// Drives the server over an endpoint until the transport closes.
    pub async fn run<E: Endpoint>(mut self, mut endpoint: E) -> crate::transport::Result<()> {
        loop {
            if let Err(err) = self.tick(Instant::now()) {
                warn!("periodic work failed: {err}");
            }
            for out in self.take_outbox() {
                match out.dest {
                    Dest::Unicast(addr) => endpoint.send_reply(addr, out.pgn, out.data).await?,
                    Dest::Broadcast => endpoint.broadcast(out.pgn, out.data).await?,
                }
            }
            let deadline = tokio::time::Instant::from_std(self.next_deadline(Instant::now()));
            tokio::select! {
                result = endpoint.recv_any() => {
                    let datagram = result?;
                    if datagram.pgn == PGN_CLIENT_TO_FS {
                        self.handle_datagram(datagram.src, &datagram.data, Instant::now()).await;
                    } else {
                        debug!(src = datagram.src, pgn = datagram.pgn, "ignoring datagram");
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }

    async fn handle_request(&mut self, src: Addr, request: Request) -> io::Result<()> {
        match request {
            Request::CcMaintenance(m) => {
                debug!(src, version = m.version, "connection maintenance");
                Ok(())
            }
            Request::GetFsProperties(req) => {
                let frame = cm::get_fs_properties_res(
                    req.tan,
                    ErrorCode::Success,
                    VERSION_NUMBER,
                    MAX_HANDLES as u8,
                    CAP_MULTIPLE_VOLUMES,
                )?;
                self.reply(src, frame);
                Ok(())
            }
            Request::VolumeStatus(req) => self.volume_status(src, req),
            Request::GetCurrentDir(req) => {
                let dir = self.current_dir(src);
                let frame =
                    dh::get_current_dir_res(req.tan, ErrorCode::Success, &dir.to_string())?;
                self.reply(src, frame);
                Ok(())
            }
            Request::ChangeCurrentDir(req) => self.change_dir(src, req).await,
            Request::OpenFile(req) => self.open_file(src, req).await,
            Request::SeekFile(req) => {
                let frame = match self.handles.seek(req.handle, req.mode, req.offset).await {
                    Ok(position) => fa::seek_file_res(req.tan, ErrorCode::Success, position)?,
                    Err(code) => fa::seek_file_res(req.tan, code, 0)?,
                };
                self.reply(src, frame);
                Ok(())
            }
            Request::ReadFile(req) => {
                self.busy |= FSS_BUSY_READING;
                let frame =
                    match self.handles.read(req.handle, req.count, req.report_hidden).await {
                        Ok(outcome) => fa::read_file_res(req.tan, outcome.error, &outcome.data)?,
                        Err(code) => fa::read_file_res(req.tan, code, &[])?,
                    };
                self.reply(src, frame);
                Ok(())
            }
            Request::WriteFile(req) => {
                let frame = fa::write_file_res(req.tan, ErrorCode::FunctionNotSupported, 0)?;
                self.reply(src, frame);
                Ok(())
            }
            Request::CloseFile(req) => {
                let frame = match self.handles.close(req.handle, src) {
                    Ok(()) => fa::close_file_res(req.tan, ErrorCode::Success)?,
                    Err(code) => fa::close_file_res(req.tan, code)?,
                };
                self.reply(src, frame);
                Ok(())
            }
        }
    }

    fn volume_status(&mut self, src: Addr, req: parser::cm::VolumeStatusReq) -> io::Result<()> {
        let volume_name = if req.name.is_empty() {
            // No name given: the volume of the current directory. A client
            // whose current directory was never set falls back to the
            // default volume.
            match self.sessions.get_mut(src).and_then(|s| s.current_dir.as_ref()) {
                Some(dir) => dir.volume().to_owned(),
                None => self.volumes.default_root().volume().to_owned(),
            }
        } else {
            match IsobusPath::parse(&req.name) {
                Ok(parsed) => parsed.volume().to_owned(),
                Err(err) => {
                    let frame = cm::volume_status_res(
                        req.tan,
                        err.error_code(),
                        crate::protocol::VolumeStatus::Present,
                        &req.name,
                    )?;
                    self.reply(src, frame);
                    return Ok(());
                }
            }
        };
        let status = match req.mode {
            VolumeMode::Query => self.volumes.find(&volume_name).map(|v| v.status()),
            VolumeMode::InUse => self.volumes.add_user(&volume_name, src),
            VolumeMode::Release => self.volumes.release_user(&volume_name, src),
        };
        let frame = match status {
            Some(status) => cm::volume_status_res(
                req.tan,
                ErrorCode::Success,
                status,
                &IsobusPath::root(&volume_name).to_string(),
            )?,
            None => cm::volume_status_res(
                req.tan,
                ErrorCode::InvalidGivenSourceName,
                crate::protocol::VolumeStatus::Present,
                &req.name,
            )?,
        };
        self.reply(src, frame);
        Ok(())
    }

    async fn change_dir(
        &mut self,
        src: Addr,
        req: parser::dh::ChangeCurrentDirReq,
    ) -> io::Result<()> {
        let current = self.current_dir(src);
        let target = match path::normalize(&current, &req.name, self.volumes.manufacturer_dir())
        {
            Ok(target) => target,
            Err(err) => {
                let frame = dh::change_current_dir_res(req.tan, err.error_code())?;
                self.reply(src, frame);
                return Ok(());
            }
        };
        let code = match self.volumes.resolve(&target) {
            Ok(host) => match tokio::fs::metadata(&host).await {
                Ok(metadata) if metadata.is_dir() => {
                    if let Some(session) = self.sessions.get_mut(src) {
                        session.current_dir = Some(target);
                    }
                    ErrorCode::Success
                }
                Ok(_) => ErrorCode::InvalidAccess,
                Err(err) => map_io_error(&err),
            },
            Err(code) => code,
        };
        let frame = dh::change_current_dir_res(req.tan, code)?;
        self.reply(src, frame);
        Ok(())
    }

    async fn open_file(&mut self, src: Addr, req: parser::fa::OpenFileReq) -> io::Result<()> {
        let current = self.current_dir(src);
        let target = match path::normalize(&current, &req.name, self.volumes.manufacturer_dir())
        {
            Ok(target) => target,
            Err(err) => {
                let frame =
                    fa::open_file_res(req.tan, err.error_code(), FILE_HANDLE_ERROR)?;
                self.reply(src, frame);
                return Ok(());
            }
        };
        let host = match self.volumes.resolve(&target) {
            Ok(host) => host,
            Err(code) => {
                let frame = fa::open_file_res(req.tan, code, FILE_HANDLE_ERROR)?;
                self.reply(src, frame);
                return Ok(());
            }
        };
        let access = req.flags & OPEN_ACCESS_MASK;
        if matches!(access, OPEN_WRITE | OPEN_READ_WRITE) {
            let writable =
                self.volumes.find(target.volume()).map(|v| v.writable).unwrap_or(false);
            if !writable {
                let frame =
                    fa::open_file_res(req.tan, ErrorCode::AccessDenied, FILE_HANDLE_ERROR)?;
                self.reply(src, frame);
                return Ok(());
            }
        }
        let frame = match self.handles.open(src, host, req.flags).await {
            Ok(handle) => fa::open_file_res(req.tan, ErrorCode::Success, handle)?,
            Err(code) => fa::open_file_res(req.tan, code, FILE_HANDLE_ERROR)?,
        };
        self.reply(src, frame);
        Ok(())
    }

    /// Current directory of a client, set to the default volume root the
    /// first time it is needed.
    fn current_dir(&mut self, addr: Addr) -> IsobusPath {
        let default = self.volumes.default_root();
        match self.sessions.get_mut(addr) {
            Some(session) => session.current_dir.get_or_insert(default).clone(),
            None => default,
        }
    }

    fn reply(&mut self, dst: Addr, data: Vec<u8>) {
        self.outbox.push(Outgoing { dest: Dest::Unicast(dst), pgn: PGN_FS_TO_CLIENT, data });
    }

    fn nack(&mut self, dst: Addr, offending: u8) -> io::Result<()> {
        let frame = ack::nack(offending, dst, PGN_CLIENT_TO_FS)?;
        self.outbox.push(Outgoing { dest: Dest::Unicast(dst), pgn: PGN_ACK, data: frame });
        Ok(())
    }
}
