//! Frame streaming handlers
//!
//! Both transports read from the same hub: `/ws` pushes every frame as it is
//! produced, `frames/latest` serves pull/poll clients with no per-client
//! server-side session.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use futures::{SinkExt, StreamExt};

use crate::models::Frame;
use crate::{AppError, AppResult, AppState};

/// Non-blocking read of the most recent frame
pub async fn latest(State(state): State<AppState>) -> AppResult<Json<Frame>> {
    let frame = state
        .hub
        .latest()
        .ok_or_else(|| AppError::NotFound("No frame produced yet".to_string()))?;
    Ok(Json((*frame).clone()))
}

/// WebSocket upgrade for the push stream
pub async fn ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_frames(socket, state))
}

async fn stream_frames(socket: WebSocket, state: AppState) {
    let mut subscription = state.hub.subscribe_push();
    let id = subscription.id;
    tracing::debug!(subscriber = %id, "websocket client connected");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = subscription.recv() => {
                let Some(frame) = frame else { break };
                let payload = match serde_json::to_string(&*frame) {
                    Ok(payload) => payload,
                    Err(err) => {
                        tracing::error!("frame serialization failed: {}", err);
                        break;
                    }
                };
                if sink.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            msg = stream.next() => {
                match msg {
                    // Transport closed: unsubscribe, do not leak the slot
                    None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.hub.unsubscribe(id);
    tracing::debug!(subscriber = %id, "websocket client disconnected");
}
