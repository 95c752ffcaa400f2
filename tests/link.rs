mod common;

use std::time::Instant;

use common::{Fixture, CLIENT, SERVER};

use isobusfs::client::{self, Engine};
use isobusfs::transport::mem::Hub;
use isobusfs::transport::{Endpoint, SessionEvent};
use tokio::sync::mpsc;

#[tokio::test]
async fn unicast_and_broadcast_reach_their_peers() {
    let hub = Hub::new();
    let a = hub.endpoint(0x10);
    let mut b = hub.endpoint(0x11);
    let mut c = hub.endpoint(0x12);

    a.send_reply(0x11, 0x0AB00, vec![1, 2, 3]).await.unwrap();
    let datagram = b.recv_any().await.unwrap();
    assert_eq!(datagram.src, 0x10);
    assert_eq!(datagram.pgn, 0x0AB00);
    assert_eq!(datagram.data, vec![1, 2, 3]);

    a.broadcast(0x0AB00, vec![9]).await.unwrap();
    assert_eq!(b.recv_any().await.unwrap().data, vec![9]);
    assert_eq!(c.recv_any().await.unwrap().data, vec![9]);
}

#[tokio::test]
async fn send_to_a_vanished_peer_aborts_the_session() {
    let hub = Hub::new();
    let mut a = hub.endpoint(0x10);
    let _b = hub.endpoint(0x11);
    hub.drop_endpoint(0x11);

    a.send_reply(0x11, 0x0AA00, vec![1]).await.unwrap();
    let events = a.drain_error_queue();
    assert!(
        events.iter().any(|e| matches!(e, SessionEvent::Aborted(_))),
        "{events:?}"
    );
    assert!(a.drain_error_queue().is_empty(), "the queue drains once");
}

/// The whole stack over the in-process link: server task, client task, and
/// the scripted selftest, exactly as the binary wires them.
#[tokio::test]
async fn selftest_runs_over_the_link() {
    let fixture = Fixture::new();
    let hub = Hub::new();
    let server_endpoint = hub.endpoint(SERVER);
    let client_endpoint = hub.endpoint(CLIENT);

    let server = fixture.server(Instant::now());
    tokio::spawn(async move {
        let _ = server.run(server_endpoint).await;
    });

    let (line_tx, line_rx) = mpsc::unbounded_channel();
    line_tx.send("selftest".to_owned()).unwrap();

    let engine = Engine::new(SERVER, Instant::now());
    let code = client::run(engine, client_endpoint, line_rx, false).await.unwrap();
    drop(line_tx);
    assert_eq!(code, 0);
}
