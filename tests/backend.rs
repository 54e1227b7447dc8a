use std::net::{Ipv4Addr, TcpListener};
use std::sync::Arc;
use tcpbal::backend::{Backend, BackendStatus, Roster, MAX_SERVERS};
use tcpbal::metadata::BackendMeta;

fn meta(name: &str, port: u16) -> BackendMeta {
    BackendMeta {
        name: name.to_string(),
        addr: Ipv4Addr::new(127, 0, 0, 1),
        port,
    }
}

#[test]
fn backend_new_test() {
    let backend = Backend::new(meta("SERVER_0", 2000), 1000);
    assert_eq!(backend.name(), "SERVER_0");
    assert_eq!(backend.addr(), Ipv4Addr::new(127, 0, 0, 1));
    assert_eq!(backend.port(), 2000);
    assert_eq!(backend.status(), BackendStatus::Inactive);
    assert_eq!(backend.max_connections(), 1000);
    assert_eq!(backend.assigned_count(), 0);
    assert_eq!(backend.bytes_in(), 0);
    assert_eq!(backend.load(), 0.0);
    assert!(backend.has_capacity());
}

#[test]
fn backend_dial_success() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let backend = Backend::new(meta("SERVER_0", port), 1000);
    assert!(backend.dial().is_ok());
    assert_eq!(backend.status(), BackendStatus::Active);
}

#[test]
fn backend_dial_failure() {
    // Bind then drop so the port is closed again by the time we dial it.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let backend = Backend::new(meta("SERVER_0", port), 1000);
    assert!(backend.dial().is_err());
    assert_eq!(backend.status(), BackendStatus::Error);
}

#[test]
fn backend_relay_accounts_bytes() {
    let backend = Backend::new(meta("SERVER_0", 2000), 1000);
    backend.relay(0, b"hello\n");
    backend.relay(0, b"ping");
    assert_eq!(backend.bytes_in(), 10);
}

#[test]
fn roster_populate_and_clear() {
    let mut roster = Roster::new();
    assert!(roster.is_empty());
    roster.populate(0, Arc::new(Backend::new(meta("SERVER_0", 2000), 1000)));
    roster.populate(1, Arc::new(Backend::new(meta("SERVER_1", 2001), 1000)));
    assert_eq!(roster.len(), 2);
    assert!(roster.get(0).is_some());
    roster.clear(0);
    assert_eq!(roster.len(), 1);
    assert!(roster.get(0).is_none());
    assert!(roster.get(1).is_some());
}

#[test]
fn roster_iter_skips_empty_slots() {
    let mut roster = Roster::new();
    roster.populate(1, Arc::new(Backend::new(meta("SERVER_1", 2001), 1000)));
    roster.populate(4, Arc::new(Backend::new(meta("SERVER_4", 2004), 1000)));
    let indices: Vec<usize> = roster.iter().map(|(i, _)| i).collect();
    assert_eq!(indices, vec![1, 4]);
    assert!(roster.iter().all(|(i, b)| b.port() == 2000 + i as u16));
}

#[test]
fn roster_capacity_availability() {
    let mut roster = Roster::new();
    assert!(!roster.has_capacity_available());
    roster.populate(0, Arc::new(Backend::new(meta("SERVER_0", 2000), 1000)));
    assert!(roster.has_capacity_available());
    assert!(MAX_SERVERS >= roster.len());
}
