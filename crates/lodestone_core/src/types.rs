//! # Core Type Definitions
//!
//! Small identifier types shared by the simulation core, the router and the
//! game server crates.
//!
//! ## Key Types
//!
//! - [`ConnectionId`] - Identifier of a live network connection
//! - [`Topic`] - Name of a router channel of interest

use std::fmt;

/// Type alias for connection identifiers.
///
/// Connection IDs are allocated by the network layer when a client connects and
/// are used as the key for sessions and as the origin of routed mail.
pub type ConnectionId = usize;

/// A named channel of interest in the message router.
///
/// Topics are declared statically by message types, so the wrapper only carries
/// a `&'static str`. Comparison and hashing use the name.
///
/// # Examples
///
/// ```rust
/// use lodestone_core::Topic;
///
/// const CHAT: Topic = Topic::new("world.chat");
/// assert_eq!(CHAT.as_str(), "world.chat");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(&'static str);

impl Topic {
    /// Creates a topic from a static name.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the topic name.
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
