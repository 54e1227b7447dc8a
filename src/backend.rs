use crate::metadata::BackendMeta;
use crate::pollset::PollSet;
use log::{error, info, trace, warn};
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Upper bound on roster slots; extra metadata lines are dropped.
pub const MAX_SERVERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackendStatus {
    Active,
    Inactive,
    Error,
}

/// Connection-facing state guarded by the identity lock: the operating
/// status and, once dialled, the outbound socket.
struct Link {
    status: BackendStatus,
    upstream: Option<TcpStream>,
}

/// One upstream server: identity, capacity bookkeeping and the poll set its
/// worker drains.
///
/// The three locks are deliberately fine-grained. `link` is near-static
/// after the dial, `assigned` changes on every dispatch and disconnect, and
/// `poll_set` belongs to the worker except for the brief append during
/// handover. Whenever the capacity and poll locks are both needed, the
/// capacity lock is taken first.
pub struct Backend {
    name: String,
    addr: Ipv4Addr,
    port: u16,
    link: Mutex<Link>,
    max_connections: usize,
    bytes_in: AtomicUsize,
    pub(crate) assigned: Mutex<usize>,
    pub(crate) available: Condvar,
    pub(crate) poll_set: Mutex<PollSet>,
}

impl Backend {
    /// Create a new Backend from its roster metadata.
    ///
    /// The record starts out `Inactive` with no clients; the poll arrays are
    /// allocated up front for `max_connections` entries.
    pub fn new(meta: BackendMeta, max_connections: usize) -> Backend {
        Backend {
            name: meta.name,
            addr: meta.addr,
            port: meta.port,
            link: Mutex::new(Link {
                status: BackendStatus::Inactive,
                upstream: None,
            }),
            max_connections,
            bytes_in: AtomicUsize::new(0),
            assigned: Mutex::new(0),
            available: Condvar::new(),
            poll_set: Mutex::new(PollSet::with_capacity(max_connections)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn status(&self) -> BackendStatus {
        self.link.lock().unwrap().status
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn assigned_count(&self) -> usize {
        *self.assigned.lock().unwrap()
    }

    /// Fraction of this backend's capacity currently in use, the selection
    /// key for least-load balancing.
    pub fn load(&self) -> f64 {
        let assigned = self.assigned.lock().unwrap();
        *assigned as f64 / self.max_connections as f64
    }

    pub fn has_capacity(&self) -> bool {
        *self.assigned.lock().unwrap() < self.max_connections
    }

    pub fn bytes_in(&self) -> usize {
        self.bytes_in.load(Ordering::Acquire)
    }

    /// Dial the backend once with plain blocking TCP.
    ///
    /// Success stores the outbound socket and marks the backend `Active`;
    /// failure marks it `Error` so the bootstrap prunes the slot. There are
    /// no reconnect attempts.
    ///
    /// # Errors
    ///
    /// Returns the underlying connect error, already logged.
    pub fn dial(&self) -> io::Result<()> {
        let target = SocketAddrV4::new(self.addr, self.port);
        match TcpStream::connect(target) {
            Ok(stream) => {
                let mut link = self.link.lock().unwrap();
                link.upstream = Some(stream);
                link.status = BackendStatus::Active;
                info!("backend {} connected at {}", self.name, target);
                Ok(())
            }
            Err(e) => {
                self.link.lock().unwrap().status = BackendStatus::Error;
                error!("can't connect to backend {} at {}: {}", self.name, target, e);
                Err(e)
            }
        }
    }

    /// Hand a drained client payload over to the outbound socket.
    ///
    /// This is the seam where client-to-backend forwarding plugs in; the
    /// current transport accounts the payload and traces it toward the
    /// upstream connection.
    pub fn relay(&self, client_id: u64, payload: &[u8]) {
        self.bytes_in.fetch_add(payload.len(), Ordering::Relaxed);
        let link = self.link.lock().unwrap();
        match &link.upstream {
            Some(_) => trace!(
                "client {} -> backend {}: {} bytes",
                client_id,
                self.name,
                payload.len()
            ),
            None => warn!(
                "backend {} has no upstream socket, {} bytes from client {} not relayed",
                self.name,
                payload.len(),
                client_id
            ),
        }
    }
}

/// Fixed-capacity registry of backends.
///
/// Slots are populated densely at bootstrap and only ever transition from
/// populated to empty, when a dial or worker spawn fails. By the time the
/// acceptor runs the roster is immutable, so selection iterates it without
/// a lock of its own.
pub struct Roster {
    slots: [Option<Arc<Backend>>; MAX_SERVERS],
}

impl Roster {
    pub fn new() -> Roster {
        Roster {
            slots: Default::default(),
        }
    }

    pub fn populate(&mut self, index: usize, backend: Arc<Backend>) {
        self.slots[index] = Some(backend);
    }

    pub fn clear(&mut self, index: usize) {
        self.slots[index] = None;
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Backend>> {
        self.slots[index].as_ref()
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Populated slots with their roster indices, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Arc<Backend>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|b| (i, b)))
    }

    pub fn has_capacity_available(&self) -> bool {
        self.iter().any(|(_, b)| b.has_capacity())
    }
}

impl Default for Roster {
    fn default() -> Roster {
        Roster::new()
    }
}
