use std::time::{Duration, Instant};

use isobusfs::server::status::{Beacon, BUSY_INTERVAL, CHANGE_BURST, IDLE_INTERVAL};

fn fires(beacon: &mut Beacon, at: Instant, status: u8) -> bool {
    beacon.tick(at, status, 0).unwrap().is_some()
}

#[test]
fn steady_idle_cadence_is_two_seconds() {
    let start = Instant::now();
    let mut beacon = Beacon::new(start);

    assert!(fires(&mut beacon, start, 0));
    let mut last = start;
    for _ in 0..5 {
        let next = beacon.next_deadline();
        assert_eq!(next.duration_since(last), IDLE_INTERVAL);
        assert!(!fires(&mut beacon, next - Duration::from_millis(1), 0));
        assert!(fires(&mut beacon, next, 0));
        last = next;
    }
}

#[test]
fn status_change_fires_immediately_and_bursts() {
    let start = Instant::now();
    let mut beacon = Beacon::new(start);
    assert!(fires(&mut beacon, start, 0));

    // Mid-cycle flip: the beacon fires right away.
    let flip = start + Duration::from_millis(700);
    assert!(fires(&mut beacon, flip, 1));

    // The next five broadcasts run at the busy cadence even though the
    // status byte is already back to idle.
    let mut at = flip;
    for _ in 0..CHANGE_BURST {
        let next = beacon.next_deadline();
        assert_eq!(next.duration_since(at), BUSY_INTERVAL);
        assert!(fires(&mut beacon, next, 0));
        at = next;
    }
    // Wait: flipping back to idle is itself a change on the first burst
    // tick, so the cadence stays busy until the byte settles.
    let next = beacon.next_deadline();
    assert_eq!(next.duration_since(at), BUSY_INTERVAL);
}

#[test]
fn burst_settles_back_to_idle_cadence() {
    let start = Instant::now();
    let mut beacon = Beacon::new(start);
    assert!(fires(&mut beacon, start, 1));

    // Hold the status steady through the burst.
    let mut at = start;
    for _ in 0..CHANGE_BURST + 2 {
        let next = beacon.next_deadline();
        assert_eq!(next.duration_since(at), BUSY_INTERVAL);
        assert!(fires(&mut beacon, next, 1));
        at = next;
    }

    // Dropping to idle is a change: one more immediate beacon and a burst,
    // then the cadence opens up to the idle interval.
    let drop_at = beacon.next_deadline();
    assert!(fires(&mut beacon, drop_at, 0));
    let mut at = drop_at;
    for _ in 0..CHANGE_BURST {
        let next = beacon.next_deadline();
        assert_eq!(next.duration_since(at), BUSY_INTERVAL);
        assert!(fires(&mut beacon, next, 0));
        at = next;
    }
    assert_eq!(beacon.next_deadline().duration_since(at), IDLE_INTERVAL);
}
