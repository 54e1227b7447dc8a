//! Roster bootstrap.
//!
//! Builds the roster from parsed metadata, dials every backend and spawns a
//! worker per survivor. Slots whose dial or worker spawn fails are nulled
//! here, before the acceptor exists, so the dispatcher only ever iterates a
//! stable roster.
use crate::backend::{Backend, BackendStatus, Roster, MAX_SERVERS};
use crate::metadata::BackendMeta;
use crate::worker;
use log::error;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

/// Initialise the roster: populate slots densely, dial each backend on a
/// transient thread and spawn workers for the ones that connected.
///
/// The returned roster holds only `Active` backends with a running worker;
/// an empty roster means every connection attempt failed and the caller
/// must not open the listening socket.
pub fn init_servers(
    metas: Vec<BackendMeta>,
    max_connections: usize,
    shutdown: &Arc<AtomicBool>,
) -> Roster {
    let mut roster = Roster::new();
    let mut backends = Vec::new();
    for (index, meta) in metas.into_iter().take(MAX_SERVERS).enumerate() {
        let backend = Arc::new(Backend::new(meta, max_connections));
        roster.populate(index, Arc::clone(&backend));
        backends.push((index, backend));
    }

    // Dial phase: one transient thread per slot, joined before anything
    // else runs. Each dial records Active or Error on its own record.
    let dialers: Vec<_> = backends
        .iter()
        .map(|(_, backend)| {
            let backend = Arc::clone(backend);
            thread::spawn(move || {
                let _ = backend.dial();
            })
        })
        .collect();
    for dialer in dialers {
        let _ = dialer.join();
    }

    for (index, backend) in backends {
        if backend.status() != BackendStatus::Active {
            roster.clear(index);
            continue;
        }
        let spawned = worker::spawn(Arc::clone(&backend), Arc::clone(shutdown));
        if let Err(e) = spawned {
            error!("can't spawn worker for backend {}: {}", backend.name(), e);
            roster.clear(index);
        }
    }
    roster
}
