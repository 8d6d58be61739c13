//! Request coalescing.
//!
//! When several callers ask for the same key while a fetch for it is
//! outstanding, only the first caller performs the fetch; the others wait
//! for its result.
//!
//! ```text
//! load_user(7) ─┐
//!               │                         one GET
//! load_user(7) ─┼──► RequestCoalescer ──► /user/7
//!               │          │                 │
//! load_user(7) ─┘          ▼                 ▼
//!                    all three receive the same result
//! ```
//!
//! Waiters subscribe to a per-key broadcast channel. The leader publishes
//! through a [`Leader`] guard; if the guard is dropped without completing,
//! waiters observe [`OsmError::Cancelled`].

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::OsmError;

type Shared<V> = Result<V, OsmError>;

struct Entry<V> {
    generation: u64,
    sender: broadcast::Sender<Shared<V>>,
}

/// Tracks in-flight fetches by key.
pub struct RequestCoalescer<K, V> {
    in_flight: Mutex<HashMap<K, Entry<V>>>,
    next_generation: AtomicU64,
    stats: Mutex<CoalescerStats>,
}

/// Counters for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CoalescerStats {
    /// Total registrations
    pub total_requests: u64,
    /// Registrations that waited for an existing fetch
    pub coalesced_requests: u64,
    /// Registrations that started a fetch
    pub new_requests: u64,
}

impl CoalescerStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

/// Outcome of registering interest in a key.
pub enum CoalesceResult<'a, K, V>
where
    K: Hash + Eq + Clone + std::fmt::Debug,
    V: Clone,
{
    /// First caller: perform the fetch and publish with [`Leader::complete`].
    Leader(Leader<'a, K, V>),
    /// Another caller is fetching.
    Waiter(Waiter<V>),
}

/// The caller responsible for fetching a key.
pub struct Leader<'a, K, V>
where
    K: Hash + Eq + Clone + std::fmt::Debug,
    V: Clone,
{
    coalescer: &'a RequestCoalescer<K, V>,
    key: K,
    generation: u64,
    completed: bool,
}

impl<K, V> Leader<'_, K, V>
where
    K: Hash + Eq + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Publishes the result to every waiter and clears the key.
    pub fn complete(mut self, result: Shared<V>) {
        self.completed = true;
        self.coalescer.publish(&self.key, self.generation, result);
    }
}

impl<K, V> Drop for Leader<'_, K, V>
where
    K: Hash + Eq + Clone + std::fmt::Debug,
    V: Clone,
{
    fn drop(&mut self) {
        if !self.completed {
            self.coalescer
                .publish(&self.key, self.generation, Err(OsmError::Cancelled));
        }
    }
}

/// A caller waiting on another caller's fetch.
pub struct Waiter<V> {
    receiver: broadcast::Receiver<Shared<V>>,
}

impl<V: Clone> Waiter<V> {
    /// Waits for the leader's result.
    pub async fn wait(mut self) -> Shared<V> {
        self.receiver
            .recv()
            .await
            .unwrap_or(Err(OsmError::Cancelled))
    }
}

impl<K, V> RequestCoalescer<K, V>
where
    K: Hash + Eq + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            stats: Mutex::new(CoalescerStats::default()),
        }
    }

    /// Registers a caller for `key`.
    pub fn register(&self, key: K) -> CoalesceResult<'_, K, V> {
        let mut in_flight = self.in_flight.lock();
        let mut stats = self.stats.lock();
        stats.total_requests += 1;

        if let Some(entry) = in_flight.get(&key) {
            stats.coalesced_requests += 1;
            debug!(key = ?key, "Coalescing request with in-flight fetch");
            return CoalesceResult::Waiter(Waiter {
                receiver: entry.sender.subscribe(),
            });
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (sender, _rx) = broadcast::channel(1);
        in_flight.insert(key.clone(), Entry { generation, sender });
        stats.new_requests += 1;
        CoalesceResult::Leader(Leader {
            coalescer: self,
            key,
            generation,
            completed: false,
        })
    }

    fn publish(&self, key: &K, generation: u64, result: Shared<V>) {
        let entry = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(key) {
                Some(entry) if entry.generation == generation => in_flight.remove(key),
                // Superseded by abort_all; a newer leader owns the key.
                _ => None,
            }
        };

        if let Some(entry) = entry {
            let waiters = entry.sender.receiver_count();
            // Receivers may all have been dropped.
            let _ = entry.sender.send(result);
            if waiters > 0 {
                debug!(key = ?key, waiters, "Broadcast result to coalesced waiters");
            }
        }
    }

    /// Fails every in-flight key with `error` and forgets it. Leaders that
    /// complete later publish nowhere.
    pub fn abort_all(&self, error: OsmError) {
        let drained: Vec<Entry<V>> = self.in_flight.lock().drain().map(|(_, e)| e).collect();
        for entry in drained {
            let _ = entry.sender.send(Err(error.clone()));
        }
    }

    /// Returns the number of currently in-flight keys.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> CoalescerStats {
        *self.stats.lock()
    }
}

impl<K, V> Default for RequestCoalescer<K, V>
where
    K: Hash + Eq + Clone + std::fmt::Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
