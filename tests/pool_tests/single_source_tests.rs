//! Single Source Tests

#[path = "../common/mod.rs"]
mod common;

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use tntdriver::{Client, ClientSource, Closeable, DriverError, SingleSource, POOL_CLOSED};

use common::*;

fn settle() {
    thread::sleep(Duration::from_millis(100));
}

#[test]
fn test_acquire_release_cycle() {
    let (client, _) = DummyClient::new(7);
    let source = SingleSource::new(client);

    for _ in 0..3 {
        let lease = source.acquire().unwrap();
        assert!(source.is_lent());
        assert_eq!(lease.get().unwrap().id, 7);
    }
    assert!(!source.is_lent());
}

#[test]
fn test_second_acquire_blocks_until_release() {
    let (client, _) = DummyClient::new(1);
    let source = SingleSource::new(client);
    let mut held = source.acquire().unwrap();

    let waiter = {
        let source = source.clone();
        thread::spawn(move || source.acquire().map(|lease| lease.get().unwrap().id))
    };
    settle();
    assert!(!waiter.is_finished());

    held.close();
    assert_eq!(waiter.join().unwrap().unwrap(), 1);
}

#[test]
fn test_close_wakes_all_waiters() {
    let (client, closed) = DummyClient::new(1);
    let source = SingleSource::new(client);
    let held = source.acquire().unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let source = source.clone();
            thread::spawn(move || source.acquire().err())
        })
        .collect();
    settle();
    source.close();

    for waiter in waiters {
        let err = waiter.join().unwrap().unwrap();
        assert!(matches!(err, DriverError::PoolClosed));
        assert_eq!(err.to_string(), POOL_CLOSED);
    }

    // The lent client is closed once it comes back.
    assert!(!closed.load(Ordering::SeqCst));
    drop(held);
    assert!(closed.load(Ordering::SeqCst));
}

#[test]
fn test_close_closes_idle_client() {
    let (client, closed) = DummyClient::new(1);
    let source = SingleSource::new(client);

    source.close();
    source.close();

    assert!(closed.load(Ordering::SeqCst));
    assert!(source.is_closed());
    assert!(source.acquire().is_err());
}

#[test]
fn test_lease_over_session() {
    let (session, written) = session(&[ok(1, empty_body())]);
    let source = SingleSource::new(session);

    let mut lease = source.acquire().unwrap();
    lease.ping().unwrap();
    assert_eq!(lease.version().unwrap(), BANNER);
    lease.close();

    let err = lease.ping().unwrap_err();
    assert!(matches!(err, DriverError::ConnectionClosed));
    assert_eq!(sent(&written).len(), 1);

    let lease = source.acquire().unwrap();
    assert!(!lease.is_closed());
}
