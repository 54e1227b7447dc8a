//! Acceptor and dispatcher.
//!
//! Provides a `run` function that owns the listening socket, accepts inbound
//! clients on the calling thread and hands each one to the `Dispatcher`,
//! which picks a backend and installs the client in its poll set.
use crate::backend::Roster;
use crate::balancing::LoadBalancing;
use crate::pollset::Client;
use crate::Config;
use log::{debug, error, info, warn};
use net2::TcpBuilder;
use std::error::Error;
use std::fmt;
use std::io;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, PartialEq)]
pub enum DispatchError {
    /// Every populated roster slot is at its connection limit.
    NoCapacity,
    /// The chosen backend filled up between selection and handover.
    Saturated,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NoCapacity => write!(f, "no backend below capacity"),
            DispatchError::Saturated => write!(f, "selected backend reached capacity"),
        }
    }
}

impl Error for DispatchError {}

/// Admission path: selects a backend for each accepted client and performs
/// the locked handover to its worker.
pub struct Dispatcher {
    roster: Arc<Roster>,
    balancer: Box<dyn LoadBalancing + Send + Sync>,
}

impl Dispatcher {
    pub fn new(roster: Arc<Roster>, balancer: Box<dyn LoadBalancing + Send + Sync>) -> Dispatcher {
        Dispatcher { roster, balancer }
    }

    /// Assign `client` to a backend and signal that backend's worker.
    ///
    /// On success the client sits at the tail of the chosen backend's poll
    /// set and the assigned count has grown by exactly one. On rejection the
    /// client is consumed, which closes its socket.
    ///
    /// # Errors
    ///
    /// `NoCapacity` when no populated backend is below its limit,
    /// `Saturated` when the chosen backend filled up before the handover
    /// locks were taken.
    pub fn assign_client(&mut self, client: Client) -> Result<usize, DispatchError> {
        let index = self.select()?;
        let backend = self
            .roster
            .get(index)
            .ok_or(DispatchError::NoCapacity)?;
        // Handover order: capacity lock, then poll lock. The worker takes
        // them one at a time, so this is the only two-lock sequence.
        let mut assigned = backend.assigned.lock().unwrap();
        if *assigned >= backend.max_connections() {
            return Err(DispatchError::Saturated);
        }
        let mut set = backend.poll_set.lock().unwrap();
        set.push(client);
        *assigned += 1;
        // Signalled while the capacity lock is held; the worker re-checks
        // the count predicate after waking.
        backend.available.notify_one();
        Ok(index)
    }

    /// Ask the balancing policy for a slot, looping while some backend still
    /// has spare capacity.
    fn select(&mut self) -> Result<usize, DispatchError> {
        loop {
            if !self.roster.has_capacity_available() {
                return Err(DispatchError::NoCapacity);
            }
            if let Some(index) = self.balancer.next_backend(&self.roster) {
                return Ok(index);
            }
        }
    }
}

/// Open the listening socket: TCP over IPv4, INADDR_ANY, with the
/// configured backlog.
///
/// # Errors
///
/// Any socket, bind or listen failure is returned as-is; the caller treats
/// it as fatal.
pub fn bind(config: &Config) -> io::Result<TcpListener> {
    let builder = TcpBuilder::new_v4()?;
    builder.reuse_address(true)?;
    builder.bind(("0.0.0.0", config.port))?;
    builder.listen(config.backlog)
}

/// Acceptor loop. Never returns in normal operation; the shutdown flag is
/// observed between accepts, so it takes effect after the next inbound
/// connection at the latest.
pub fn run(
    listener: TcpListener,
    roster: Arc<Roster>,
    balancer: Box<dyn LoadBalancing + Send + Sync>,
    shutdown: Arc<AtomicBool>,
) {
    let mut dispatcher = Dispatcher::new(roster, balancer);
    let mut next_id: u64 = 0;
    loop {
        if shutdown.load(Ordering::Acquire) {
            info!("acceptor shutting down");
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                let client = Client::new(next_id, stream, peer);
                next_id += 1;
                debug!("accepted client {} from {}", client.id, peer);
                match dispatcher.assign_client(client) {
                    Ok(index) => debug!("client assigned to roster slot {}", index),
                    Err(e) => warn!("client from {} rejected: {}", peer, e),
                }
            }
            Err(e) => error!("accept failed: {}", e),
        }
    }
}
