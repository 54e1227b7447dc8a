//! Balancing algorithms over the backend roster.
//!
//! Provides a public trait `LoadBalancing`; every balancing algorithm
//! implements this trait exposing a `next_backend` method.
use crate::backend::{Roster, MAX_SERVERS};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Supported balancing algorithm types.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub enum BalancingAlgorithm {
    #[serde(rename = "least-load")]
    LeastLoad,
    #[serde(rename = "round-robin")]
    RoundRobin,
    #[serde(rename = "random")]
    Random,
}

/// Factory function, used to create the balancing policy based on the
/// requested type.
pub fn get_balancer(algo: &BalancingAlgorithm) -> Box<dyn LoadBalancing + Send + Sync> {
    match algo {
        BalancingAlgorithm::LeastLoad => Box::new(LeastLoadBalancing::new()),
        BalancingAlgorithm::RoundRobin => Box::new(RoundRobinBalancing::new()),
        BalancingAlgorithm::Random => Box::new(RandomBalancing::new()),
    }
}

/// Generic balancing algorithm trait. Exposes only one method
/// `next_backend` which takes a reference to the roster.
pub trait LoadBalancing {
    /// Return the index of a populated slot according to the heuristic the
    /// algorithm represents, or `None` when it cannot produce one. Requires
    /// `mut self` as some algorithms store a state that must be updated at
    /// every call.
    fn next_backend(&mut self, roster: &Roster) -> Option<usize>;
}

pub struct LeastLoadBalancing;

impl LeastLoadBalancing {
    pub fn new() -> LeastLoadBalancing {
        LeastLoadBalancing {}
    }
}

impl LoadBalancing for LeastLoadBalancing {
    /// Find the populated slot with the lowest load ratio.
    ///
    /// The initial best is a full backend (load 1.0) and only a strictly
    /// lower load displaces it, so any backend below capacity wins over an
    /// unselected state and ties go to the lower roster index. Returns
    /// `None` when every populated slot is at capacity.
    fn next_backend(&mut self, roster: &Roster) -> Option<usize> {
        let mut best = None;
        let mut best_load = 1.0;
        for (i, backend) in roster.iter() {
            let load = backend.load();
            if load < best_load {
                best_load = load;
                best = Some(i);
            }
        }
        best
    }
}

pub struct RoundRobinBalancing {
    next_index: AtomicUsize,
}

impl RoundRobinBalancing {
    /// Create a new RoundRobinBalancing algorithm.
    pub fn new() -> RoundRobinBalancing {
        RoundRobinBalancing {
            next_index: AtomicUsize::new(0),
        }
    }
}

impl LoadBalancing for RoundRobinBalancing {
    /// Return the next populated slot with spare capacity, scanning from
    /// the slot after the previous pick.
    ///
    /// Returns `None` when no slot can take another client.
    fn next_backend(&mut self, roster: &Roster) -> Option<usize> {
        let start = self.next_index.load(Ordering::Acquire) % MAX_SERVERS;
        self.next_index.store(start + 1, Ordering::Relaxed);
        for offset in 0..MAX_SERVERS {
            let index = (start + offset) % MAX_SERVERS;
            if let Some(backend) = roster.get(index) {
                if backend.has_capacity() {
                    return Some(index);
                }
            }
        }
        None
    }
}

pub struct RandomBalancing;

impl RandomBalancing {
    pub fn new() -> RandomBalancing {
        RandomBalancing {}
    }
}

impl LoadBalancing for RandomBalancing {
    /// Return a randomly chosen slot, restricted to populated slots below
    /// capacity.
    ///
    /// A miss returns `None` and the dispatcher retries while capacity
    /// remains somewhere in the roster.
    fn next_backend(&mut self, roster: &Roster) -> Option<usize> {
        let index = rand::thread_rng().gen_range(0, MAX_SERVERS);
        match roster.get(index) {
            Some(backend) if backend.has_capacity() => Some(index),
            _ => None,
        }
    }
}
