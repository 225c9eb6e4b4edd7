//! Per-client WebSocket: streams notification events to an observer and
//! accepts approval decisions back.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::OnboardingEngine;
use crate::hub::{EventPayload, NotificationEvent};
use crate::workflow::StepId;

use super::responses::ApiError;
use super::routes::AppState;

/// Actions an observer can send over the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ObserverAction {
    /// Approve or reject the step currently awaiting a decision.
    Decide {
        step_id: StepId,
        approved: bool,
        #[serde(default)]
        feedback: Option<String>,
    },
}

/// GET /ws/{client_id}
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let client_id = Uuid::parse_str(&client_id)
        .map_err(|_| ApiError::bad_request(format!("Invalid client id: {client_id}")))?;
    info!(client_id = %client_id, "Observer connecting");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, client_id, state.engine)))
}

async fn handle_socket(mut socket: WebSocket, client_id: Uuid, engine: OnboardingEngine) {
    // Events published before this point are not replayed; the observer is
    // expected to query the status endpoint to catch up.
    let mut sub = engine.hub().subscribe(client_id).await;
    info!(client_id = %client_id, "Observer connected");

    loop {
        tokio::select! {
            // Forward engine events to this observer.
            event = sub.recv() => {
                match event {
                    Some(event) => {
                        match serde_json::to_string(&event) {
                            Ok(json) => {
                                if socket.send(Message::Text(json.into())).await.is_err() {
                                    debug!(client_id = %client_id, "Observer disconnected during send");
                                    break;
                                }
                            }
                            Err(e) => warn!(client_id = %client_id, error = %e, "Failed to encode event"),
                        }
                    }
                    None => {
                        debug!(client_id = %client_id, "Event channel closed");
                        break;
                    }
                }
            }

            // Receive observer actions.
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_observer_message(&text, client_id, &engine, &mut socket).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(client_id = %client_id, "Observer disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(client_id = %client_id, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    sub.unsubscribe();
    info!(client_id = %client_id, "Observer connection closed");
}

async fn handle_observer_message(
    text: &str,
    client_id: Uuid,
    engine: &OnboardingEngine,
    socket: &mut WebSocket,
) {
    match serde_json::from_str::<ObserverAction>(text) {
        Ok(ObserverAction::Decide {
            step_id,
            approved,
            feedback,
        }) => {
            match engine.decide(client_id, step_id, approved, feedback).await {
                Ok(()) => {
                    info!(client_id = %client_id, step = %step_id, approved, "Decision via WS");
                }
                Err(e) => {
                    warn!(client_id = %client_id, step = %step_id, error = %e, "Decision failed via WS");
                    // Report only to this observer; the workflow state is unchanged.
                    let event = NotificationEvent::new(
                        client_id,
                        EventPayload::Error {
                            error_code: Some("INVALID_DECISION".to_string()),
                            error_details: None,
                            message: e.to_string(),
                        },
                    );
                    if let Ok(json) = serde_json::to_string(&event) {
                        let _ = socket.send(Message::Text(json.into())).await;
                    }
                }
            }
        }
        // Unrecognized frames are logged and ignored, never fatal.
        Err(e) => {
            debug!(client_id = %client_id, error = %e, text, "Unrecognized WS message from observer");
        }
    }
}
