use super::message::{Message, MessageConfig};
use super::packet::Packet;
use crate::error::CodecError;
use crate::types::Topic;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

type Decoder<T> = Box<dyn Fn(&[u8]) -> Result<T, CodecError> + Send + Sync>;

struct Entry<T> {
    config: MessageConfig,
    decode: Decoder<T>,
}

/// Maps kind bytes to a topic and a decoder into the command type `T`.
///
/// Built once at startup and shared read-only afterwards.
///
/// ```rust,ignore
/// let registry = MessageRegistry::new()
///     .register(ClientCommand::Login)
///     .register(ClientCommand::Move);
/// let (topic, command) = registry.decode(&packet)?;
/// ```
pub struct MessageRegistry<T> {
    entries: BTreeMap<u8, Entry<T>>,
}

impl<T: 'static> MessageRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registers message type `M`, wrapped into `T` by `wrap`.
    ///
    /// Registering a kind twice keeps the later registration.
    pub fn register<M: Message>(mut self, wrap: fn(M) -> T) -> Self {
        let config = M::config();
        let decode: Decoder<T> = Box::new(move |payload: &[u8]| M::demarshal(payload).map(wrap));
        if self.entries.insert(config.kind, Entry { config, decode }).is_some() {
            warn!("Message kind {} registered twice; keeping the last", config.kind);
        }
        self
    }

    /// Decodes `packet` and returns the topic it should be published on.
    pub fn decode(&self, packet: &Packet) -> Result<(Topic, T), CodecError> {
        let entry = self
            .entries
            .get(&packet.kind)
            .ok_or(CodecError::UnknownKind(packet.kind))?;
        let message = (entry.decode)(&packet.payload)?;
        Ok((entry.config.topic, message))
    }

    pub fn config_of(&self, kind: u8) -> Option<MessageConfig> {
        self.entries.get(&kind).map(|entry| entry.config)
    }

    /// Distinct topics of all registered messages.
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.entries.values().map(|entry| entry.config.topic).collect();
        topics.sort();
        topics.dedup();
        topics
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: 'static> Default for MessageRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MessageRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(kind, entry)| (kind, entry.config.topic)))
            .finish()
    }
}
