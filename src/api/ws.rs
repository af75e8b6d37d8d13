// =============================================================================
// WebSocket Handler — Push-based dashboard updates
// =============================================================================
//
// Clients connect to `/api/v1/ws` (with `?token=<token>` when an admin token
// is configured) and receive:
//   1. An immediate full StateSnapshot on connect.
//   2. A fresh snapshot whenever `state_version` has changed, checked every
//      500 ms.
//
// Ping frames are answered with Pong. Anything else from the client is ignored.
// =============================================================================

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::api::auth::token_matches;
use crate::app_state::AppState;

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Upgrade handler. The dashboard is read-only, so the token is only enforced
/// when one is configured.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    if state.admin_token().is_some() {
        let token = query.token.unwrap_or_default();
        if !token_matches(state.admin_token(), &token) {
            warn!("WebSocket connection rejected: invalid token");
            return (StatusCode::FORBIDDEN, "Invalid or missing token").into_response();
        }
    }

    info!("WebSocket connection accepted");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
        .into_response()
}

async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut last_sent_version = state.current_state_version();
    if let Err(e) = send_snapshot(&mut sender, &state).await {
        warn!(error = %e, "Failed to send initial WebSocket snapshot");
        return;
    }

    let mut push_interval = interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = push_interval.tick() => {
                let current_version = state.current_state_version();
                if current_version != last_sent_version {
                    if let Err(e) = send_snapshot(&mut sender, &state).await {
                        debug!(error = %e, "WebSocket send failed, disconnecting");
                        break;
                    }
                    last_sent_version = current_version;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(error = %e, "Failed to send Pong, disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket receive error, disconnecting");
                        break;
                    }
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

/// Serialize and send the current StateSnapshot.
async fn send_snapshot<S>(sender: &mut S, state: &Arc<AppState>) -> Result<(), axum::Error>
where
    S: futures_util::Sink<Message, Error = axum::Error> + Unpin,
{
    let seq = state.ws_sequence_number.fetch_add(1, Ordering::Relaxed) + 1;
    let snapshot = state.build_snapshot();

    match serde_json::to_string(&snapshot) {
        Ok(json) => {
            sender.send(Message::Text(json.into())).await?;
            debug!(version = snapshot.state_version, seq, "WebSocket snapshot sent");
        }
        // Not a network error; keep the connection.
        Err(e) => warn!(error = %e, "Failed to serialize snapshot"),
    }
    Ok(())
}
