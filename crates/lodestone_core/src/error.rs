//! Error types for the simulation core.
//!
//! Each subsystem gets its own enum so callers can match on the failure modes
//! that matter to them: the world (capacity, stale handles, system failures),
//! the packet codec (framing and field decoding) and the router.

use crate::ecs::EntityHandle;

/// Failures raised by the entity store and the system scheduler.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// Every identity slot is in use.
    #[error("entity capacity exhausted ({capacity} identities in use)")]
    Capacity { capacity: u32 },

    /// The handle refers to a destroyed entity or a recycled identity.
    #[error("entity {0} is no longer alive")]
    StaleEntity(EntityHandle),

    /// A system's processor failed; the rest of the tick was skipped.
    #[error("system '{system}' failed: {reason}")]
    System { system: &'static str, reason: String },

    /// A system's run policy failed; the rest of the tick was skipped.
    #[error("policy of system '{system}' failed: {reason}")]
    Policy { system: &'static str, reason: String },
}

/// Failures raised while framing or decoding packets.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended inside a frame.
    #[error("truncated packet")]
    Truncated,

    /// The length prefix ran past its fifth byte.
    #[error("malformed length prefix")]
    MalformedLength,

    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },

    /// No message type is registered for this kind byte.
    #[error("unregistered packet kind {0}")]
    UnknownKind(u8),

    /// A payload field could not be decoded.
    #[error("invalid field: {0}")]
    InvalidField(String),
}

impl CodecError {
    /// Whether the connection that produced this error must be dropped.
    ///
    /// Only an unknown kind is survivable: the frame was read in full and can be
    /// skipped.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CodecError::UnknownKind(_))
    }
}

/// Failures raised by router subscription management.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("mailbox {0} is closed")]
    MailboxClosed(u64),
}
