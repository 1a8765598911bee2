//! Connection registry
//!
//! Authoritative mapping of active usernames to their clients. Every operation
//! takes the single registry lock and releases it before returning, so callers
//! never hold it across a stream write.
//!
//! Registration can be split in two: `reserve` claims a seat and a username,
//! and `Reservation::complete` makes the client visible. Between the two the
//! caller may write to the stream with no other writer able to reach it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::client::Client;
use crate::error::HubError;
use crate::transport::ChatStream;
use crate::types::Username;

#[derive(Default)]
struct Inner {
    clients: HashMap<Username, Arc<Client>>,
    /// Seats claimed by reservations not yet completed
    pending: HashSet<Username>,
    /// Sequence number for the next generated username
    next_sequence: u64,
}

/// Registry of connected clients, bounded by `max_clients`
pub struct Registry {
    inner: Mutex<Inner>,
    max_clients: usize,
}

impl Registry {
    /// Create an empty registry holding at most `max_clients` entries
    pub fn new(max_clients: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_clients,
        }
    }

    // The map is consistent between statements, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a stream under a freshly generated username
    ///
    /// Fails with `CapacityExceeded` when the registry is full; the stream is
    /// then not stored anywhere.
    pub fn register(&self, stream: Arc<dyn ChatStream>) -> Result<Arc<Client>, HubError> {
        Ok(self.reserve()?.complete(stream))
    }

    /// Claim a seat and a unique username without registering a client yet
    ///
    /// The seat counts against `max_clients` until the reservation is
    /// completed or dropped.
    pub fn reserve(&self) -> Result<Reservation<'_>, HubError> {
        let mut inner = self.lock();

        let taken = inner.clients.len() + inner.pending.len();
        if taken >= self.max_clients {
            warn!(
                "Registry full ({}/{}), rejecting client",
                taken, self.max_clients
            );
            return Err(HubError::CapacityExceeded);
        }

        // Unique by sequence number; still re-checked against live entries
        let username = loop {
            let candidate = Username::generate(inner.next_sequence);
            inner.next_sequence += 1;
            if !inner.clients.contains_key(&candidate) && !inner.pending.contains(&candidate) {
                break candidate;
            }
        };
        inner.pending.insert(username.clone());

        Ok(Reservation {
            registry: self,
            username,
            completed: false,
        })
    }

    /// Remove a client; no-op when the username is not registered
    ///
    /// Closing the stream is left to the caller.
    pub fn deregister(&self, username: &str) -> Option<Arc<Client>> {
        let mut inner = self.lock();
        let removed = inner.clients.remove(username);
        if removed.is_some() {
            info!(
                "Deregistered {} ({}/{})",
                username,
                inner.clients.len(),
                self.max_clients
            );
        } else {
            debug!("Deregister of unknown user {}", username);
        }
        removed
    }

    /// Check whether a username is currently registered
    pub fn exists(&self, username: &str) -> bool {
        self.lock().clients.contains_key(username)
    }

    /// Look up a registered client
    pub fn get(&self, username: &str) -> Option<Arc<Client>> {
        self.lock().clients.get(username).cloned()
    }

    /// Copy of the current entries, taken under the lock
    pub fn snapshot(&self) -> Vec<Arc<Client>> {
        self.lock().clients.values().cloned().collect()
    }

    /// Registered usernames in sorted order
    pub fn usernames(&self) -> Vec<Username> {
        let mut names: Vec<Username> = self.lock().clients.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }
}

/// A claimed seat and username, released on drop unless completed
#[must_use]
pub struct Reservation<'a> {
    registry: &'a Registry,
    username: Username,
    completed: bool,
}

impl Reservation<'_> {
    /// Username the client will be registered under
    pub fn username(&self) -> &Username {
        &self.username
    }

    /// Register the client under the reserved username
    pub fn complete(mut self, stream: Arc<dyn ChatStream>) -> Arc<Client> {
        let client = Arc::new(Client::new(self.username.clone(), stream));
        let mut inner = self.registry.lock();
        inner.pending.remove(&self.username);
        inner.clients.insert(self.username.clone(), client.clone());
        self.completed = true;

        info!(
            "Registered {} ({}/{})",
            self.username,
            inner.clients.len(),
            self.registry.max_clients
        );
        client
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.registry.lock().pending.remove(&self.username);
            debug!("Released reservation for {}", self.username);
        }
    }
}
