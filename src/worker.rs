//! Per-backend worker.
//!
//! One long-lived thread per connected backend. The worker parks on the
//! backend's condition variable until the dispatcher hands over at least one
//! client, then polls the assigned descriptors for readability and drains
//! every ready socket.
use crate::backend::Backend;
use crate::pollset::PollSet;
use log::{debug, error, warn};
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Read buffer handed to every `read` on a ready client socket.
pub const BUFSIZE: usize = 1024;

/// Readiness poll timeout. Debug builds use a longer window to keep traces
/// legible under a debugger.
#[cfg(not(debug_assertions))]
pub const POLL_TIMEOUT_MS: i32 = 100;
#[cfg(debug_assertions)]
pub const POLL_TIMEOUT_MS: i32 = 1000;

/// Bound on how long an idle worker sleeps between shutdown checks.
const IDLE_RECHECK: Duration = Duration::from_millis(250);

/// Spawn the worker thread serving `backend`.
///
/// # Errors
///
/// Returns `Err` when the OS refuses to create the thread; the caller
/// deallocates the roster slot in that case.
pub fn spawn(backend: Arc<Backend>, shutdown: Arc<AtomicBool>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("worker-{}", backend.name()))
        .spawn(move || run(backend, shutdown))
}

/// Worker loop. Runs until the shutdown flag is raised.
///
/// Each iteration parks until the backend has at least one assigned client,
/// snapshots the live count, polls that prefix of the descriptor array and
/// drains every readable socket. Peer closes are swap-removed from the poll
/// set; the matching capacity decrements are applied after the poll lock is
/// released so the worker never holds both backend locks at once.
pub fn run(backend: Arc<Backend>, shutdown: Arc<AtomicBool>) {
    let mut buf = [0u8; BUFSIZE];
    while !shutdown.load(Ordering::Acquire) {
        let n = match wait_for_clients(&backend, &shutdown) {
            Some(n) => n,
            None => break,
        };
        let mut disconnected = 0;
        {
            let mut set = backend.poll_set.lock().unwrap();
            // The snapshot may run ahead of the poll set for one cycle when
            // a disconnect from the previous iteration has not been
            // decremented yet.
            let n = n.min(set.len());
            if n == 0 {
                continue;
            }
            match set.poll(n, POLL_TIMEOUT_MS) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("poll failed on backend {}: {}", backend.name(), e);
                    continue;
                }
            }
            // Highest index first, so a swap-remove only disturbs entries
            // this pass is already done with.
            for i in (0..n).rev() {
                if set.readable(i) {
                    let id = set.client(i).id;
                    match set.client_mut(i).stream.read(&mut buf) {
                        Ok(0) => {
                            drop_client(&mut set, i);
                            disconnected += 1;
                        }
                        Ok(count) => backend.relay(id, &buf[..count]),
                        Err(ref e)
                            if e.kind() == io::ErrorKind::WouldBlock
                                || e.kind() == io::ErrorKind::Interrupted => {}
                        Err(e) => warn!("read error on client {}: {}", id, e),
                    }
                } else if set.hung_up(i) {
                    drop_client(&mut set, i);
                    disconnected += 1;
                }
            }
        }
        if disconnected > 0 {
            let mut assigned = backend.assigned.lock().unwrap();
            *assigned -= disconnected;
        }
    }
    debug!("worker for backend {} stopped", backend.name());
}

/// Park until the dispatcher signals work, re-checking the predicate on
/// every wake. Returns the assigned-client count, or `None` on shutdown.
fn wait_for_clients(backend: &Backend, shutdown: &AtomicBool) -> Option<usize> {
    let mut assigned = backend.assigned.lock().unwrap();
    while *assigned == 0 {
        if shutdown.load(Ordering::Acquire) {
            return None;
        }
        let (guard, _) = backend
            .available
            .wait_timeout(assigned, IDLE_RECHECK)
            .unwrap();
        assigned = guard;
    }
    Some(*assigned)
}

/// Remove entry `i` from the poll set; dropping the client closes its
/// socket.
fn drop_client(set: &mut PollSet, i: usize) {
    let client = set.swap_remove(i);
    debug!("client {} from {} disconnected", client.id, client.peer);
}
