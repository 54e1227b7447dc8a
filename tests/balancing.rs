use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::sync::Arc;
use tcpbal::backend::{Backend, Roster};
use tcpbal::balancing::{
    LeastLoadBalancing, LoadBalancing, RandomBalancing, RoundRobinBalancing,
};
use tcpbal::metadata::BackendMeta;
use tcpbal::pollset::Client;
use tcpbal::server::Dispatcher;

fn meta(name: &str, port: u16) -> BackendMeta {
    BackendMeta {
        name: name.to_string(),
        addr: Ipv4Addr::new(127, 0, 0, 1),
        port,
    }
}

/// Open a loopback connection pair and wrap the accepted side as a client.
/// The far side is returned so the socket stays open for the test's
/// duration.
fn tether(listener: &TcpListener, id: u64) -> (Client, TcpStream) {
    let downstream = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (stream, peer) = listener.accept().unwrap();
    (Client::new(id, stream, peer), downstream)
}

#[test]
fn least_load_empty_roster() {
    let roster = Roster::new();
    let mut algo = LeastLoadBalancing::new();
    assert_eq!(algo.next_backend(&roster), None);
}

#[test]
fn least_load_ties_break_on_lower_index() {
    let mut roster = Roster::new();
    roster.populate(0, Arc::new(Backend::new(meta("SERVER_0", 2000), 1000)));
    roster.populate(1, Arc::new(Backend::new(meta("SERVER_1", 2001), 1000)));
    let mut algo = LeastLoadBalancing::new();
    assert_eq!(algo.next_backend(&roster), Some(0));
}

#[test]
fn least_load_prefers_lower_load() {
    let mut roster = Roster::new();
    roster.populate(0, Arc::new(Backend::new(meta("SERVER_0", 2000), 1000)));
    roster.populate(1, Arc::new(Backend::new(meta("SERVER_1", 2001), 1000)));
    let roster = Arc::new(roster);
    let mut dispatcher = Dispatcher::new(Arc::clone(&roster), Box::new(LeastLoadBalancing::new()));

    let gateway = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut held = Vec::new();
    // Dispatch alternates while loads stay level: slot 0, then slot 1.
    for id in 0..2 {
        let (client, downstream) = tether(&gateway, id);
        held.push(downstream);
        dispatcher.assign_client(client).unwrap();
    }
    assert_eq!(roster.get(0).unwrap().assigned_count(), 1);
    assert_eq!(roster.get(1).unwrap().assigned_count(), 1);
    // A level tie goes back to the lower slot.
    let (client, downstream) = tether(&gateway, 2);
    held.push(downstream);
    assert_eq!(dispatcher.assign_client(client), Ok(0));

    // Slot 0 now carries the higher load, so selection moves to slot 1.
    let mut algo = LeastLoadBalancing::new();
    assert_eq!(algo.next_backend(&roster), Some(1));
}

#[test]
fn least_load_all_at_capacity() {
    let mut roster = Roster::new();
    roster.populate(0, Arc::new(Backend::new(meta("SERVER_0", 2000), 1)));
    let roster = Arc::new(roster);
    let mut dispatcher = Dispatcher::new(Arc::clone(&roster), Box::new(LeastLoadBalancing::new()));

    let gateway = TcpListener::bind("127.0.0.1:0").unwrap();
    let (client, _downstream) = tether(&gateway, 0);
    dispatcher.assign_client(client).unwrap();

    let mut algo = LeastLoadBalancing::new();
    assert_eq!(algo.next_backend(&roster), None);
}

#[test]
fn round_robin_cycles_over_populated_slots() {
    let mut roster = Roster::new();
    roster.populate(0, Arc::new(Backend::new(meta("SERVER_0", 2000), 1000)));
    roster.populate(2, Arc::new(Backend::new(meta("SERVER_2", 2002), 1000)));
    let mut algo = RoundRobinBalancing::new();
    assert_eq!(algo.next_backend(&roster), Some(0));
    assert_eq!(algo.next_backend(&roster), Some(2));
    assert_eq!(algo.next_backend(&roster), Some(0));
}

#[test]
fn round_robin_empty_roster() {
    let roster = Roster::new();
    let mut algo = RoundRobinBalancing::new();
    assert_eq!(algo.next_backend(&roster), None);
}

#[test]
fn random_only_picks_populated_slots() {
    let mut roster = Roster::new();
    roster.populate(3, Arc::new(Backend::new(meta("SERVER_3", 2003), 1000)));
    let mut algo = RandomBalancing::new();
    for _ in 0..50 {
        match algo.next_backend(&roster) {
            Some(index) => assert_eq!(index, 3),
            None => {}
        }
    }
}
