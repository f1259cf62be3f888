//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{BridgeEvent, DeviceId};
use crate::service::DeviceService;

const WILDCARD: &str = "*";

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<BridgeEvent>,
    device_service: Arc<DeviceService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text, &mut subs, &device_service).await;
                        if let Some(json) = encode(&reply)
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        let Some(view) = subs.project(&event) else {
                            continue;
                        };
                        let Ok(payload) = serde_json::to_value(view.as_ref()) else {
                            tracing::warn!(event_type = event.event_type_str(), "event not serializable");
                            continue;
                        };
                        if let Some(json) = encode(&WsMessage::event(payload))
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

fn encode(msg: &WsMessage) -> Option<String> {
    serde_json::to_string(msg).ok()
}

/// Handles a text message from the client and builds the reply.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    device_service: &DeviceService,
) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error(String::new(), 400, "malformed JSON");
    };
    if msg.msg_type != WsMessageType::Command {
        return WsMessage::error(msg.id, 400, "expected a command message");
    }
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return WsMessage::error(msg.id, 404, "unknown command");
    };

    match command {
        WsCommand::Subscribe { device_ids } => {
            let (ids, wildcard) = parse_device_ids(&device_ids);
            subs.subscribe(&ids, wildcard);
            WsMessage::response(
                msg.id,
                serde_json::json!({
                    "subscribed": ids,
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Unsubscribe { device_ids } => {
            let (ids, wildcard) = parse_device_ids(&device_ids);
            subs.unsubscribe(&ids, wildcard);
            WsMessage::response(
                msg.id,
                serde_json::json!({
                    "unsubscribed": ids,
                    "remaining_count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::GetDevice { device_id } => {
            let result = match DeviceId::parse(&device_id) {
                Ok(id) => device_service.device(&id).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(view) => WsMessage::response(
                    msg.id,
                    serde_json::to_value(&view).unwrap_or_default(),
                ),
                Err(e) => WsMessage::error(msg.id, e.status_code().as_u16(), &e.to_string()),
            }
        }
    }
}

/// Splits raw ids into parsed device ids and the wildcard flag. Blank ids
/// are dropped.
fn parse_device_ids(raw: &[String]) -> (Vec<DeviceId>, bool) {
    let wildcard = raw.iter().any(|s| s.trim() == WILDCARD);
    let ids = raw
        .iter()
        .filter(|s| s.trim() != WILDCARD)
        .filter_map(|s| DeviceId::parse(s).ok())
        .collect();
    (ids, wildcard)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{DevicePatch, EventBus};
    use crate::store::InMemoryDocumentStore;

    fn make_service() -> DeviceService {
        DeviceService::new(Arc::new(InMemoryDocumentStore::new()), EventBus::new(16))
    }

    #[test]
    fn parse_device_ids_splits_wildcard() {
        let raw = vec!["*".to_string(), "ESP32_001".to_string(), " ".to_string()];
        let (ids, wildcard) = parse_device_ids(&raw);
        assert!(wildcard);
        assert_eq!(ids.len(), 1);
        assert_eq!(ids.first().map(DeviceId::as_str), Some("ESP32_001"));
    }

    #[tokio::test]
    async fn subscribe_command_updates_manager() {
        let service = make_service();
        let mut subs = SubscriptionManager::new();
        let text = r#"{"id":"1","type":"command","payload":{"command":"subscribe","device_ids":["ESP32_001"]}}"#;

        let reply = handle_text_message(text, &mut subs, &service).await;
        assert_eq!(reply.msg_type, WsMessageType::Response);
        assert_eq!(reply.id, "1");
        assert_eq!(reply.payload["count"], 1);
        assert_eq!(subs.count(), 1);
    }

    #[tokio::test]
    async fn malformed_and_unknown_messages_are_errors() {
        let service = make_service();
        let mut subs = SubscriptionManager::new();

        let reply = handle_text_message("not json", &mut subs, &service).await;
        assert_eq!(reply.msg_type, WsMessageType::Error);
        assert_eq!(reply.payload["code"], 400);

        let text = r#"{"id":"2","type":"command","payload":{"command":"swap"}}"#;
        let reply = handle_text_message(text, &mut subs, &service).await;
        assert_eq!(reply.msg_type, WsMessageType::Error);
        assert_eq!(reply.payload["code"], 404);
    }

    #[tokio::test]
    async fn get_device_command_returns_view_or_not_found() {
        let service = make_service();
        let mut subs = SubscriptionManager::new();
        let text = r#"{"id":"3","type":"command","payload":{"command":"get_device","device_id":"ESP32_001"}}"#;

        let reply = handle_text_message(text, &mut subs, &service).await;
        assert_eq!(reply.msg_type, WsMessageType::Error);
        assert_eq!(reply.payload["code"], 404);

        let Ok(id) = DeviceId::parse("ESP32_001") else {
            panic!("valid id");
        };
        let _ = service.update_device(&id, DevicePatch::default()).await;

        let reply = handle_text_message(text, &mut subs, &service).await;
        assert_eq!(reply.msg_type, WsMessageType::Response);
        assert_eq!(reply.payload["device_id"], "ESP32_001");
        assert_eq!(reply.payload["status"], "online");
    }
}
