use super::packet::Packet;
use crate::error::CodecError;
use crate::types::Topic;

/// Static routing information of a message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageConfig {
    pub kind: u8,
    pub topic: Topic,
}

/// A client message type with a fixed kind byte and destination topic.
pub trait Message: Sized + Send + 'static {
    /// Kind byte identifying this message on the wire.
    const KIND: u8;
    /// Topic decoded messages are published on.
    const TOPIC: Topic;

    fn demarshal(payload: &[u8]) -> Result<Self, CodecError>;

    fn marshal(&self, buf: &mut Vec<u8>);

    fn config() -> MessageConfig {
        MessageConfig {
            kind: Self::KIND,
            topic: Self::TOPIC,
        }
    }

    fn to_packet(&self) -> Packet {
        let mut payload = Vec::new();
        self.marshal(&mut payload);
        Packet::new(Self::KIND, payload)
    }
}
