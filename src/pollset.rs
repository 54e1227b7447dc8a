//! Poll set owned by each backend.
//!
//! Keeps the two index-correspondent arrays a worker polls over: a
//! contiguous `libc::pollfd` array, as `poll(2)` requires, and the client
//! records those descriptors belong to. Entry i of both arrays always refers
//! to the same client; every mutation touches both arrays together.
use std::io;
use std::net::{SocketAddr, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};

/// One proxied downstream connection.
#[derive(Debug)]
pub struct Client {
    pub id: u64,
    pub stream: TcpStream,
    pub peer: SocketAddr,
}

impl Client {
    pub fn new(id: u64, stream: TcpStream, peer: SocketAddr) -> Client {
        Client { id, stream, peer }
    }
}

pub struct PollSet {
    fds: Vec<libc::pollfd>,
    clients: Vec<Client>,
}

impl PollSet {
    /// Create an empty poll set with room for `capacity` clients.
    pub fn with_capacity(capacity: usize) -> PollSet {
        PollSet {
            fds: Vec::with_capacity(capacity),
            clients: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Append a client, registering read interest on its descriptor.
    pub fn push(&mut self, client: Client) {
        self.fds.push(libc::pollfd {
            fd: client.stream.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        });
        self.clients.push(client);
    }

    /// Remove entry `index` from both arrays, handing back the client. The
    /// last entry takes its place so the live prefix stays dense.
    pub fn swap_remove(&mut self, index: usize) -> Client {
        self.fds.swap_remove(index);
        self.clients.swap_remove(index)
    }

    /// Wait for readiness on the first `n` descriptors.
    ///
    /// Returns the number of descriptors with events pending, zero on
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns the raw OS error when `poll(2)` fails, `Interrupted` on
    /// `EINTR` included.
    pub fn poll(&mut self, n: usize, timeout_ms: i32) -> io::Result<usize> {
        let fds = &mut self.fds[..n];
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), n as libc::nfds_t, timeout_ms) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(rc as usize)
        }
    }

    /// Did the last poll report entry `index` readable?
    pub fn readable(&self, index: usize) -> bool {
        self.fds[index].revents & libc::POLLIN != 0
    }

    /// Did the last poll report a hang-up or error condition on entry
    /// `index`?
    pub fn hung_up(&self, index: usize) -> bool {
        self.fds[index].revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0
    }

    /// Descriptor registered at entry `index`.
    pub fn fd(&self, index: usize) -> RawFd {
        self.fds[index].fd
    }

    /// Is entry `index` registered for read events?
    pub fn watches_readable(&self, index: usize) -> bool {
        self.fds[index].events & libc::POLLIN != 0
    }

    pub fn client(&self, index: usize) -> &Client {
        &self.clients[index]
    }

    pub fn client_mut(&mut self, index: usize) -> &mut Client {
        &mut self.clients[index]
    }
}
