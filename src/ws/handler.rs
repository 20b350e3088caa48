//! WebSocket chat feed handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::ws::protocol::ServerMsg;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Forward relayed chat lines until the client goes away
async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("Chat feed subscriber connected");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let mut feed_rx = state.relay.subscribe();

    // Writer task: chat feed -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = match feed_rx.recv().await {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_count = n, "Chat feed subscriber lagged");
                    ServerMsg::Lagged { skipped: n }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Chat feed closed");
                    break;
                }
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(error = %e, "Failed to send to feed subscriber");
                break;
            }
        }
    });

    // Reader loop: only watch for close
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
    info!("Chat feed subscriber disconnected");
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
