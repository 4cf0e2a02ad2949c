//! WebSocket connection endpoint.
//!
//! One handler task per client connection. Frames whose first token is the
//! install keyword are dispatched to the install controller; everything
//! else is ignored. One request is processed fully before the next frame
//! is read, so no two installs on the same connection ever interleave.
//! A client disconnect is caught at the send call site and never crashes
//! the process.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;

use crate::install::{self, SshConnector};
use crate::protocol::{EventSink, INSTALL_KEYWORD, ProgressEvent};

/// Shared server dependencies handed to every connection task.
pub struct ServerState {
    pub connector: SshConnector,
    pub artifact_dir: PathBuf,
}

/// Upgrades `/ws` requests and spawns the per-connection loop.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> Response {
    ws.on_upgrade(move |socket| client_loop(socket, state))
}

async fn client_loop(socket: WebSocket, state: Arc<ServerState>) {
    tracing::info!("client connected");
    let mut channel = ClientChannel::new(socket);

    while let Some(frame) = channel.next_text().await {
        let Some(rest) = frame.strip_prefix(INSTALL_KEYWORD) else {
            tracing::debug!(frame = %frame, "ignoring frame without install keyword");
            continue;
        };
        let args: Vec<&str> = rest.split_whitespace().collect();
        install::handle_install(&state.connector, &state.artifact_dir, &args, &mut channel).await;
    }

    tracing::info!("client connection closed");
}

/// One client connection: receives request frames and delivers progress
/// events, absorbing client-initiated disconnects.
struct ClientChannel {
    socket: WebSocket,
    disconnected: bool,
}

impl ClientChannel {
    fn new(socket: WebSocket) -> Self {
        Self {
            socket,
            disconnected: false,
        }
    }

    /// Next text frame, or `None` once the connection is gone.
    async fn next_text(&mut self) -> Option<String> {
        while let Some(message) = self.socket.recv().await {
            match message {
                Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
                Ok(Message::Close(_)) => return None,
                // Binary/ping/pong frames are not part of the contract.
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(%error, "websocket receive failed");
                    return None;
                }
            }
        }
        None
    }
}

impl EventSink for ClientChannel {
    async fn emit(&mut self, event: ProgressEvent) {
        if let ProgressEvent::Log(line) = &event {
            let line = line.trim_end();
            if !line.is_empty() {
                tracing::info!(output = %line, "remote command output");
            }
            return;
        }

        let Some(frame) = event.client_frame() else {
            return;
        };
        if self.disconnected {
            tracing::debug!(frame, "client gone, event dropped");
            return;
        }
        if let Err(error) = self.socket.send(Message::Text(frame.to_owned().into())).await {
            tracing::warn!(%error, "client disconnected while sending progress");
            self.disconnected = true;
        }
    }

    fn closed(&self) -> bool {
        self.disconnected
    }
}
