//! WebSocket transport for realtime visual/audio events
//!
//! Each connection gets its own [`SessionController`] with a private
//! component graph. Wire messages are a closed tagged union; the core
//! never sees an untyped payload.

use std::sync::Arc;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiState;
use crate::session::{SessionController, SessionEvent};
use crate::vision::pipeline::{FrameSource, ProcessedFrame};

/// Incoming WebSocket event from the client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// A captured frame
    Frame { payload: FramePayload },
    /// An opaque audio event, ledgered but not processed here
    Audio { payload: serde_json::Value },
    /// User interrupt: flush audio, pause visual admission
    Interrupt,
    /// Re-enable visual admission after an interrupt
    ResumeVisual,
}

/// Frame payload carried by a `frame` event
#[derive(Debug, Deserialize)]
pub struct FramePayload {
    /// Encoded image bytes, base64
    pub base64: String,
    /// Capture source
    pub source: FrameSource,
    /// Whether a quick caption suffices
    #[serde(default = "default_quick")]
    pub quick: bool,
}

const fn default_quick() -> bool {
    true
}

/// Outgoing WebSocket event to the client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A frame was described and entered the session context
    VisualContext {
        description: String,
        frame: FrameMeta,
    },
    /// Interrupt acknowledged
    Interrupted,
    /// A single frame failed; the session stays up
    FrameError { message: String },
}

/// Frame metadata sent alongside a visual context update
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMeta {
    pub captured_at: i64,
    pub source: FrameSource,
    pub width: u32,
    pub height: u32,
}

impl From<&ProcessedFrame> for FrameMeta {
    fn from(frame: &ProcessedFrame) -> Self {
        Self {
            captured_at: frame.captured_at,
            source: frame.source,
            width: frame.width,
            height: frame.height,
        }
    }
}

/// Handle WebSocket upgrade request
pub async fn ws_upgrade(
    State(state): State<Arc<ApiState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle one WebSocket connection for its whole lifetime
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();

    let session_id = format!("visual-{}", Uuid::new_v4());
    let (controller, mut events) = SessionController::new(
        session_id.clone(),
        &state.config,
        Arc::clone(&state.captioner),
    );

    tracing::info!(session = %session_id, "visual WebSocket client connected");

    // Forward session events to the socket in order
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let outgoing = match event {
                SessionEvent::VisualContext(ready) => ServerEvent::VisualContext {
                    frame: FrameMeta::from(&ready.frame),
                    description: ready.description,
                },
                SessionEvent::Interrupted => ServerEvent::Interrupted,
                SessionEvent::FrameFailed { reason } => {
                    ServerEvent::FrameError { message: reason }
                }
            };
            if let Ok(text) = serde_json::to_string(&outgoing) {
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Dispatch incoming events to the session controller
    let recv_session_id = session_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => handle_event(&text, &controller).await,
                Message::Close(_) => {
                    tracing::info!(session = %recv_session_id, "WebSocket closed by client");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::info!(session = %session_id, "visual WebSocket client disconnected");
}

/// Parse and dispatch a single incoming event.
///
/// Malformed or unknown messages are logged and ignored; the session
/// survives them.
async fn handle_event(text: &str, controller: &SessionController) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, "failed to parse WebSocket message");
            return;
        }
    };

    match event {
        ClientEvent::Frame { payload } => {
            match base64::engine::general_purpose::STANDARD.decode(&payload.base64) {
                Ok(bytes) => controller.submit_frame(bytes, payload.source, payload.quick),
                Err(e) => {
                    tracing::warn!(error = %e, "frame payload is not valid base64");
                }
            }
        }
        ClientEvent::Audio { payload } => controller.submit_audio(payload),
        ClientEvent::Interrupt => controller.interrupt().await,
        ClientEvent::ResumeVisual => controller.resume_visual(),
    }
}
