//! Page Route
//!
//! - GET / - Player page; issues the viewer's identity cookie on first visit

use axum::{extract::State, response::Html};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::identity::{identity_from_jar, issue_identity};
use crate::api::state::AppState;

/// GET /
///
/// Renders `index.html` from the template directory.
pub async fn index(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Html<String>)> {
    let jar = match identity_from_jar(&jar) {
        Some(_) => jar,
        None => {
            let (jar, id) = issue_identity(jar);
            tracing::info!(client = %id, "issued viewer identity");
            jar
        }
    };

    let path = state.config.content.index_template();
    let page = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to read template {:?}: {}", path, e)))?;

    Ok((jar, Html(page)))
}
