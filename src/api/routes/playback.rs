//! Playback Routes
//!
//! Control actions broadcast to every other viewer:
//!
//! - GET /resume - Resume playback
//! - GET /hold - Pause playback
//! - GET /sync/:time - Seek to a position
//! - POST /action - Any action in wire form, e.g. `{"action": "seek:12.5"}`
//!
//! Requests without an identity are accepted and ignored.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::identity::MaybeIdentity;
use crate::api::state::AppState;
use crate::sync::PlaybackAction;

/// Body of POST /action
#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: String,
}

/// GET /resume
pub async fn resume(
    State(state): State<Arc<AppState>>,
    MaybeIdentity(identity): MaybeIdentity,
) -> StatusCode {
    broadcast(&state, identity, &PlaybackAction::Resume)
}

/// GET /hold
pub async fn hold(
    State(state): State<Arc<AppState>>,
    MaybeIdentity(identity): MaybeIdentity,
) -> StatusCode {
    broadcast(&state, identity, &PlaybackAction::Hold)
}

/// GET /sync/:time
pub async fn seek(
    State(state): State<Arc<AppState>>,
    MaybeIdentity(identity): MaybeIdentity,
    Path(time): Path<String>,
) -> ApiResult<StatusCode> {
    let action = PlaybackAction::seek(time)?;
    Ok(broadcast(&state, identity, &action))
}

/// POST /action
pub async fn action(
    State(state): State<Arc<AppState>>,
    MaybeIdentity(identity): MaybeIdentity,
    Json(request): Json<ActionRequest>,
) -> ApiResult<StatusCode> {
    let action = PlaybackAction::parse(&request.action)?;
    Ok(broadcast(&state, identity, &action))
}

fn broadcast(state: &AppState, identity: Option<String>, action: &PlaybackAction) -> StatusCode {
    match identity {
        Some(id) => {
            state.dispatcher.dispatch(&id, action);
        }
        None => {
            tracing::debug!(action = action.kind(), "ignoring action without identity");
        }
    }
    StatusCode::OK
}
