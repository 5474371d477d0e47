use crate::types::ConnectionId;
use tokio::time::Instant;

/// A routed payload together with the client it came from.
///
/// The optional deadline lets a consumer drop work whose requester has already
/// given up.
#[derive(Debug, Clone)]
pub struct Mail<T> {
    pub client: ConnectionId,
    pub payload: T,
    pub deadline: Option<Instant>,
}

impl<T> Mail<T> {
    pub fn new(client: ConnectionId, payload: T) -> Self {
        Self {
            client,
            payload,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// True once the deadline, if any, has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}
