#![cfg(test)]

use std::time::{Duration, Instant};

use crate::client::{Command, Engine, Failure, Op, State};
use crate::protocol::{ErrorCode, PGN_ACK, PGN_CLIENT_TO_FS, PGN_FS_TO_CLIENT};
use crate::serializer::{ack, cm, dh};
use crate::transport::{AbortKind, Datagram, SessionEvent};

const SERVER: u8 = 0x28;

fn engine(now: Instant) -> Engine {
    Engine::new(SERVER, now)
}

fn from_server(data: Vec<u8>) -> Datagram {
    Datagram { src: SERVER, pgn: PGN_FS_TO_CLIENT, data }
}

/// The transaction number byte of the last queued request.
fn sent_tan(engine: &mut Engine) -> u8 {
    let outbox = engine.take_outbox();
    let frame = outbox.last().expect("a frame was queued");
    assert_eq!(frame.pgn, PGN_CLIENT_TO_FS);
    frame.data[1]
}

#[test]
fn test_pwd_round_trip() {
    let now = Instant::now();
    let mut engine = engine(now);
    engine.submit(Command::Pwd, now);
    let tan = sent_tan(&mut engine);
    assert_eq!(tan, 0);
    assert_eq!(engine.state(), State::Waiting(crate::client::Op::CurrentDir));

    let res = dh::get_current_dir_res(tan, ErrorCode::Success, r"\\vol1\logs").unwrap();
    engine.handle_datagram(&from_server(res), now);
    let console = engine.take_console();
    assert_eq!(console, vec![r"\\vol1\logs".to_owned()]);
}

#[test]
fn test_tan_mismatch_fails_transaction() {
    let now = Instant::now();
    let mut engine = engine(now);
    engine.submit(Command::Pwd, now);
    let _ = sent_tan(&mut engine);

    let res = dh::get_current_dir_res(9, ErrorCode::Success, r"\\vol1").unwrap();
    engine.handle_datagram(&from_server(res), now);
    let console = engine.take_console();
    assert_eq!(console.len(), 1);
    assert!(console[0].contains("46"), "{console:?}");
}

#[test]
fn test_tan_wraps_over_256_requests() {
    let now = Instant::now();
    let mut engine = engine(now);
    for i in 0..256u32 {
        engine.submit(Command::Pwd, now);
        let tan = sent_tan(&mut engine);
        assert_eq!(tan, i as u8);
        let res = dh::get_current_dir_res(tan, ErrorCode::Success, r"\\vol1").unwrap();
        engine.handle_datagram(&from_server(res), now);
        engine.take_console();
    }

    // The 257th request reuses transaction number zero; a stale response
    // carrying 255 must be rejected.
    engine.submit(Command::Pwd, now);
    let tan = sent_tan(&mut engine);
    assert_eq!(tan, 0);
    let stale = dh::get_current_dir_res(255, ErrorCode::Success, r"\\vol1").unwrap();
    engine.handle_datagram(&from_server(stale), now);
    let console = engine.take_console();
    assert!(console[0].starts_with("Error"), "{console:?}");

    // And the wrapped number itself is accepted on the next transaction.
    engine.submit(Command::Pwd, now);
    let tan = sent_tan(&mut engine);
    assert_eq!(tan, 1);
    let res = dh::get_current_dir_res(tan, ErrorCode::Success, r"\\vol1").unwrap();
    engine.handle_datagram(&from_server(res), now);
    assert_eq!(engine.take_console(), vec![r"\\vol1".to_owned()]);
}

#[test]
fn test_pending_request_times_out() {
    let now = Instant::now();
    let mut engine = engine(now);
    engine.submit(Command::Pwd, now);
    let _ = sent_tan(&mut engine);

    engine.tick(now + Duration::from_millis(999));
    assert!(engine.take_console().is_empty());

    engine.tick(now + Duration::from_millis(1001));
    let console = engine.take_console();
    assert_eq!(console.len(), 1);
    assert!(console[0].contains("timed out"), "{console:?}");

    // The entry is gone: a late response no longer reaches the pipeline.
    let res = dh::get_current_dir_res(0, ErrorCode::Success, r"\\vol1").unwrap();
    engine.handle_datagram(&from_server(res), now + Duration::from_millis(1002));
    assert!(engine.take_console().is_empty());
}

#[test]
fn test_transport_abort_fails_pending_before_deadline() {
    let now = Instant::now();
    let mut engine = engine(now);
    engine.submit(Command::Pwd, now);
    let _ = sent_tan(&mut engine);
    assert_eq!(engine.state(), State::Waiting(Op::CurrentDir));

    // Well before the one-second request deadline.
    engine.handle_session_event(
        SessionEvent::Aborted(AbortKind::Timeout),
        now + Duration::from_millis(10),
    );
    let console = engine.take_console();
    assert_eq!(console.len(), 1);
    assert!(console[0].starts_with("Error"), "{console:?}");
    assert!(matches!(
        engine.state(),
        State::Failed(Op::CurrentDir, Failure::Aborted(AbortKind::Timeout))
    ));

    // The pending entry is gone: neither the deadline sweep nor a late
    // response produces anything further.
    engine.tick(now + Duration::from_millis(1500));
    assert!(engine.take_console().is_empty());
    let res = dh::get_current_dir_res(0, ErrorCode::Success, r"\\vol1").unwrap();
    engine.handle_datagram(&from_server(res), now + Duration::from_millis(1500));
    assert!(engine.take_console().is_empty());

    // With no pipeline left, a further abort restores the idle state.
    engine.handle_session_event(
        SessionEvent::Aborted(AbortKind::Timeout),
        now + Duration::from_millis(1600),
    );
    assert_eq!(engine.state(), State::Idle);
}

#[test]
fn test_nack_unwinds_to_idle() {
    let now = Instant::now();
    let mut engine = engine(now);
    engine.submit(Command::Pwd, now);
    let _ = sent_tan(&mut engine);

    let frame = ack::nack(0x10, SERVER, PGN_CLIENT_TO_FS).unwrap();
    engine.handle_datagram(&Datagram { src: SERVER, pgn: PGN_ACK, data: frame }, now);
    let console = engine.take_console();
    assert!(console[0].starts_with("Error"), "{console:?}");
    assert!(matches!(engine.state(), State::Failed(..)));
}

#[test]
fn test_fs_status_connects_and_starts_maintenance() {
    let now = Instant::now();
    let mut engine = engine(now);
    assert_eq!(engine.state(), State::Connecting);
    assert!(!engine.is_connected());

    let status = cm::fs_status(0, 0).unwrap();
    engine.handle_datagram(&from_server(status), now);
    assert!(engine.is_connected());
    assert_eq!(engine.state(), State::Idle);

    engine.tick(now);
    let outbox = engine.take_outbox();
    assert_eq!(outbox.len(), 1);
    // Maintenance message: connection-management group, function 0.
    assert_eq!(outbox[0].data[0], 0x00);
}

#[test]
fn test_second_command_rejected_while_busy() {
    let now = Instant::now();
    let mut engine = engine(now);
    engine.submit(Command::Pwd, now);
    let _ = sent_tan(&mut engine);
    engine.submit(Command::Pwd, now);
    let console = engine.take_console();
    assert_eq!(console.len(), 1);
    assert!(console[0].starts_with("busy"), "{console:?}");
}
