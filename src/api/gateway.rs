use crate::api::AppState;
use crate::delivery::LiveUpdate;
use crate::domain::auth::verify_jwt;
use axum::{
    extract::{
        Query, State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    token: String,
}

/// One frame pushed to a connected client: the channel the update arrived
/// on plus its JSON payload, verbatim.
#[derive(Debug, Serialize)]
struct GatewayFrame<'a> {
    topic: &'a str,
    payload: &'a serde_json::value::RawValue,
}

/// Upgrades to a live-update session. Browsers cannot set headers on a
/// WebSocket handshake, so the token travels as a query parameter.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match verify_jwt(&params.token, state.auth_service.jwt_secret()) {
        Ok(claims) => ws.on_upgrade(move |socket| handle_socket(socket, state, claims.sub)),
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket handshake failed: invalid token");
            axum::http::StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

#[tracing::instrument(skip(socket, state), fields(user_id = %user_id))]
async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    tracing::debug!("Gateway session opened");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut updates = state.delivery_service.subscribe(user_id);
    let mut shutdown = state.shutdown_rx.clone();

    let (outbound_tx, mut outbound_rx) =
        mpsc::channel::<WsMessage>(state.config.websocket.outbound_buffer_size);

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if ws_tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => {
                    if let Some(frame) = encode_frame(&update) {
                        if outbound_tx.send(WsMessage::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Nothing is replayed; the client re-syncs from storage.
                    tracing::warn!(skipped, "Gateway session lagged behind live updates");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            inbound = ws_rx.next() => match inbound {
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Gateway socket error");
                    break;
                }
            },
            _ = shutdown.changed() => break,
        }
    }

    drop(outbound_tx);
    let _ = writer.await;
    tracing::debug!("Gateway session closed");
}

fn encode_frame(update: &LiveUpdate) -> Option<String> {
    let text = std::str::from_utf8(&update.payload).ok()?;
    let payload: &serde_json::value::RawValue = serde_json::from_str(text).ok()?;
    serde_json::to_string(&GatewayFrame { topic: &update.topic, payload }).ok()
}
