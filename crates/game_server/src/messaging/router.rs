//! Routing of decoded client packets onto the server's router.

use super::types::{ClientCommand, Inbound, AUTH_LOGIN};
use crate::error::ServerError;
use lodestone_core::{ConnectionId, Mail, MessageRegistry, Packet, Router};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{trace, warn};

/// Decodes `packet` and publishes it on its topic.
///
/// Unknown kinds are logged and skipped. Any other decode failure is a
/// protocol error and the caller should drop the connection. A publish that
/// times out is logged; the client is not told.
///
/// # Arguments
///
/// * `packet` - The framed packet read from the client
/// * `client` - Connection the packet arrived on
/// * `registry` - Kind-to-message lookup table
/// * `router` - Destination of the decoded command
/// * `login_deadline` - Time budget attached to login requests
pub async fn route_client_packet(
    packet: &Packet,
    client: ConnectionId,
    registry: &MessageRegistry<ClientCommand>,
    router: &Router<Inbound>,
    login_deadline: Duration,
) -> Result<(), ServerError> {
    let (topic, command) = match registry.decode(packet) {
        Ok(decoded) => decoded,
        Err(e) if !e.is_fatal() => {
            warn!("⚠️ Connection {} sent {}; packet dropped", client, e);
            return Ok(());
        }
        Err(e) => return Err(ServerError::Protocol(format!("connection {client}: {e}"))),
    };

    let mut mail = Mail::new(client, Inbound::Command(command));
    if topic == AUTH_LOGIN {
        mail = mail.with_deadline(Instant::now() + login_deadline);
    }

    trace!("📨 Connection {} -> '{}'", client, topic);
    if !router.publish(topic, mail).await {
        warn!("📭 Message from connection {} on '{}' was not fully delivered", client, topic);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::types::{command_registry, ChatSay, LoginRequest, WORLD_CHAT};
    use lodestone_core::{Message, RouterConfig};

    #[tokio::test]
    async fn decoded_commands_reach_their_topic() {
        let router = Router::new(RouterConfig::default());
        let registry = command_registry();
        let mut chat = router.subscribe(WORLD_CHAT).await;
        let mut login = router.subscribe(AUTH_LOGIN).await;

        let say = ChatSay { text: "hello".into() };
        route_client_packet(&say.to_packet(), 7, &registry, &router, Duration::from_secs(1))
            .await
            .unwrap();
        let mail = chat.recv().await.unwrap();
        assert_eq!(mail.client, 7);
        assert!(mail.deadline.is_none());
        assert!(matches!(mail.payload, Inbound::Command(ClientCommand::Chat(ref c)) if c.text == "hello"));

        let request = LoginRequest { username: "ada".into(), password: "pw".into() };
        route_client_packet(&request.to_packet(), 7, &registry, &router, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(login.recv().await.unwrap().deadline.is_some());
    }

    #[tokio::test]
    async fn unknown_kinds_are_skipped_but_garbage_is_fatal() {
        let router = Router::new(RouterConfig::default());
        let registry = command_registry();

        let unknown = Packet::new(77, vec![1, 2, 3]);
        assert!(route_client_packet(&unknown, 1, &registry, &router, Duration::ZERO).await.is_ok());

        let garbage = Packet::new(ChatSay::KIND, vec![9]);
        let err = route_client_packet(&garbage, 1, &registry, &router, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Protocol(_)));
    }
}
