//! WebSocket stream of registry events.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use super::handlers::AppState;
use super::types::WsMessage;

/// WebSocket upgrade handler.
pub async fn events_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn to_text<T: Serialize>(value: &T) -> Option<Message> {
    serde_json::to_string(value)
        .ok()
        .map(|json| Message::Text(json.into()))
}

/// Forward registry events until either side closes.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let mut events = state.registry.subscribe();
    let (mut sink, mut stream) = socket.split();
    tracing::debug!("events socket connected");

    loop {
        tokio::select! {
            event = events.recv() => {
                let msg = match event {
                    Ok(event) => to_text(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "events socket lagging");
                        to_text(&WsMessage::Lagged { skipped })
                    }
                    Err(RecvError::Closed) => break,
                };
                if let Some(msg) = msg {
                    if sink.send(msg).await.is_err() {
                        break;
                    }
                }
            }
            incoming = stream.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text.to_string(),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                        continue;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };

                let reply = match serde_json::from_str::<WsMessage>(&text) {
                    Ok(WsMessage::Ping) => WsMessage::Pong,
                    Ok(_) => continue,
                    Err(e) => WsMessage::Error {
                        code: "PARSE_ERROR".to_string(),
                        message: e.to_string(),
                    },
                };
                if let Some(msg) = to_text(&reply) {
                    if sink.send(msg).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    tracing::debug!("events socket closed");
}
