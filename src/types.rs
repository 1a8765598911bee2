//! Basic type definitions for the chat hub
//!
//! Provides newtype wrappers for type safety:
//! - `ConnectionId`: UUID-based identifier for a connection attempt
//! - `Username`: server-generated, unique chat name of a session

use uuid::Uuid;

/// Template words for generated usernames
const USERNAME_TEMPLATES: &[&str] = &[
    "Apple",
    "Banana",
    "Cherry",
    "Date",
    "Elderberry",
    "Fig",
    "Grape",
    "Honeydew",
];

/// Connection identifier (newtype pattern)
///
/// Assigned as soon as a TCP peer is accepted, before the session has a
/// username, so every log line of a connection can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Username of a registered session
///
/// Never client-supplied. Generated as a random template word followed by a
/// sequence number, e.g. `Cherry17`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Username(pub String);

impl Username {
    /// Generate a username carrying the given sequence number
    ///
    /// Distinct sequence numbers always give distinct usernames, whatever
    /// template word is drawn.
    pub fn generate(sequence: u64) -> Self {
        use rand::seq::SliceRandom;
        let template = USERNAME_TEMPLATES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("User");
        Self(format!("{}{}", template, sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Hash and Eq are derived from the inner String, so lookups by &str agree
impl std::borrow::Borrow<str> for Username {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Username {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
