//! Event Stream Routes
//!
//! Long-lived push streams, one per viewer:
//!
//! - GET /event - Server-Sent Events stream
//! - GET /ws - WebSocket stream; viewers may also send actions over it
//!
//! Both register the caller and hand the connection to a stream pump. A
//! request without an identity gets `204 No Content` and registers nothing.
//! A `/ws` request that is not a WebSocket upgrade gets `426 Upgrade Required`.

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::identity::MaybeIdentity;
use crate::api::state::AppState;
use crate::sync::{BodySink, ClientIdentity, ConnectionHandle, PlaybackAction, PumpExit, WsSink};

/// Frames buffered in the response body before a write waits
const EVENT_BODY_BUFFER: usize = 16;

/// GET /event
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    MaybeIdentity(identity): MaybeIdentity,
) -> Response {
    let Some(id) = identity else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let handle = state.registry.register(&id).into_handle();
    let pump = state.stream_pump(handle);
    let (sink, body) = BodySink::channel(EVENT_BODY_BUFFER);

    tokio::spawn(async move {
        let exit = pump.run(sink).await;
        tracing::debug!(client = %id, reason = ?exit, "event stream closed");
    });

    event_stream_response(body)
}

fn event_stream_response(body: Body) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// GET /ws
pub async fn websocket(
    ws: Option<WebSocketUpgrade>,
    State(state): State<Arc<AppState>>,
    MaybeIdentity(identity): MaybeIdentity,
) -> Response {
    let Some(id) = identity else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let Some(ws) = ws else {
        return StatusCode::UPGRADE_REQUIRED.into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, id))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, id: ClientIdentity) {
    let (sender, mut receiver) = socket.split();

    let handle = state.registry.register(&id).into_handle();
    let cancel = CancellationToken::new();
    let pump = state.stream_pump(handle.clone());
    let mut pump_task = tokio::spawn(pump.run_until(WsSink::new(sender), cancel.clone()));

    let state_for_recv = Arc::clone(&state);
    let id_for_recv = id.clone();

    // Actions sent by this viewer
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => handle_text(&state_for_recv, &id_for_recv, &text),
                Ok(Message::Close(_)) => {
                    tracing::debug!(client = %id_for_recv, "client requested close");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(client = %id_for_recv, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut pump_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            close_connection(&state, &handle, &cancel, pump_task).await;
        }
    }
}

/// Tear down after the viewer left: stop the pump, then drop the connection
/// unless a newer subscription has claimed it. Returns whether it was removed.
async fn close_connection(
    state: &AppState,
    handle: &ConnectionHandle,
    cancel: &CancellationToken,
    pump_task: JoinHandle<PumpExit>,
) -> bool {
    cancel.cancel();
    match pump_task.await {
        Ok(PumpExit::Cancelled) => state.registry.unregister_connection(handle),
        Ok(exit) => {
            tracing::debug!(client = %handle.id(), reason = ?exit, "connection already released");
            false
        }
        Err(e) => {
            tracing::warn!(client = %handle.id(), error = %e, "stream pump task failed");
            false
        }
    }
}

fn handle_text(state: &AppState, id: &str, text: &str) {
    match PlaybackAction::parse(text.trim()) {
        Ok(action) => {
            state.dispatcher.dispatch(id, &action);
        }
        Err(e) => {
            tracing::debug!(client = %id, error = %e, "ignoring invalid WebSocket message");
        }
    }
}
