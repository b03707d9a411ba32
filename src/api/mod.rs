//! Syncwatch HTTP API
//!
//! HTTP layer for Syncwatch, built with Axum.
//!
//! # Endpoints
//!
//! ## Page and media
//! - `GET /` - Player page (issues the `ID` cookie)
//! - `GET /content/*` - Static media files
//!
//! ## Push streams
//! - `GET /event` - Server-Sent Events stream of playback actions
//! - `GET /ws` - WebSocket stream of playback actions
//!
//! ## Playback control
//! - `GET /resume` - Resume every other viewer
//! - `GET /hold` - Pause every other viewer
//! - `GET /sync/:time` - Seek every other viewer
//! - `POST /action` - Any action in wire form
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health` - Status and connection count
//!
//! # Example
//!
//! ```rust,ignore
//! use syncwatch::api::{serve, AppState};
//! use syncwatch::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env();
//!     let server = config.server.clone();
//!
//!     serve(AppState::new(config), &server).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use identity::{MaybeIdentity, IDENTITY_COOKIE};
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::ServerConfig;

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let media = ServeDir::new(&state.config.content.content_dir);

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/", get(routes::health::full_health));

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .route("/", get(routes::page::index))
        // Push streams
        .route("/event", get(routes::events::subscribe))
        .route("/ws", get(routes::events::websocket))
        // Playback control
        .route("/resume", get(routes::playback::resume))
        .route("/hold", get(routes::playback::hold))
        .route("/sync/:time", get(routes::playback::seek))
        .route("/action", post(routes::playback::action))
        .nest_service("/content", media)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the server
///
/// On shutdown every stream pump is stopped so open event streams end and
/// the graceful shutdown can complete.
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<(), ApiError> {
    let registry = Arc::clone(&state.registry);
    tracing::info!(
        path = ?state.config.content.content_dir,
        "serving content"
    );
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Syncwatch listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            registry.shutdown();
        })
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Syncwatch shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::sync::{ConnectionHandle, ConnectionRegistry};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use futures_util::StreamExt;
    use std::time::Duration;
    use tempfile::tempdir;
    use tower::util::ServiceExt;

    struct TestApp {
        router: Router,
        registry: Arc<ConnectionRegistry>,
        dir: tempfile::TempDir,
    }

    fn create_test_app() -> TestApp {
        let dir = tempdir().unwrap();
        let templates = dir.path().join("templates");
        let content = dir.path().join("content");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::create_dir_all(&content).unwrap();
        std::fs::write(templates.join("index.html"), "<video></video>").unwrap();
        std::fs::write(content.join("movie.txt"), "frames").unwrap();

        let mut config = Config::default();
        config.content.template_dir = templates;
        config.content.content_dir = content;
        config.logging.log_dir = None;

        let state = AppState::new(config);
        let registry = Arc::clone(&state.registry);

        TestApp {
            router: build_router(state),
            registry,
            dir,
        }
    }

    fn get(uri: &str, identity: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(id) = identity {
            builder = builder.header(header::COOKIE, format!("{}={}", IDENTITY_COOKIE, id));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn drain(handle: &ConnectionHandle) -> Vec<String> {
        let mut receiver = handle.receiver.lock().await;
        let mut messages = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn test_index_issues_identity() {
        let app = create_test_app();

        let response = app.router.oneshot(get("/", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("ID="));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"<video></video>");
    }

    #[tokio::test]
    async fn test_index_keeps_existing_identity() {
        let app = create_test_app();

        let response = app.router.oneshot(get("/", Some("v1"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_index_without_template() {
        let app = create_test_app();
        std::fs::remove_file(app.dir.path().join("templates").join("index.html")).unwrap();

        let response = app.router.oneshot(get("/", Some("v1"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_content_served() {
        let app = create_test_app();

        let response = app
            .router
            .oneshot(get("/content/movie.txt", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"frames");
    }

    #[tokio::test]
    async fn test_hold_broadcasts_to_others() {
        let app = create_test_app();
        let v1 = app.registry.register("v1").into_handle();
        let v2 = app.registry.register("v2").into_handle();

        let response = app.router.oneshot(get("/hold", Some("v1"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(drain(&v1).await.is_empty());
        assert_eq!(drain(&v2).await, vec!["hold"]);
    }

    #[tokio::test]
    async fn test_action_without_identity_is_noop() {
        let app = create_test_app();
        let v2 = app.registry.register("v2").into_handle();

        let response = app.router.oneshot(get("/resume", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(drain(&v2).await.is_empty());
    }

    #[tokio::test]
    async fn test_seek_forwards_position() {
        let app = create_test_app();
        let v2 = app.registry.register("v2").into_handle();

        let response = app
            .router
            .oneshot(get("/sync/42.0", Some("v1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(drain(&v2).await, vec!["seek:42.0"]);
    }

    #[tokio::test]
    async fn test_seek_with_line_breaks_rejected() {
        let app = create_test_app();
        let v2 = app.registry.register("v2").into_handle();

        let response = app
            .router
            .clone()
            .oneshot(get("/sync/1%0A%0Aevent:%20evil%0Adata:%20hold", Some("v1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .router
            .oneshot(get("/sync/12.5%0D", Some("v1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert!(drain(&v2).await.is_empty());
    }

    #[tokio::test]
    async fn test_post_action() {
        let app = create_test_app();
        let v2 = app.registry.register("v2").into_handle();

        let request = |body: &'static str| {
            Request::builder()
                .method("POST")
                .uri("/action")
                .header(header::COOKIE, "ID=v1")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap()
        };

        let ok = app
            .router
            .clone()
            .oneshot(request(r#"{"action": "seek:12.5"}"#))
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let invalid = app
            .router
            .oneshot(request(r#"{"action": "rewind"}"#))
            .await
            .unwrap();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        assert_eq!(drain(&v2).await, vec!["seek:12.5"]);
    }

    #[tokio::test]
    async fn test_event_stream_without_identity() {
        let app = create_test_app();

        let response = app.router.oneshot(get("/event", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(app.registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_event_stream_receives_frames() {
        let app = create_test_app();
        let router = app.router.clone();

        let response = router.oneshot(get("/event", Some("v2"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );
        assert!(app.registry.contains("v2"));

        let hold = app.router.clone().oneshot(get("/hold", Some("v1"))).await.unwrap();
        assert_eq!(hold.status(), StatusCode::OK);

        let mut stream = response.into_body().into_data_stream();
        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(&chunk[..], b"data: hold\n\n");

        // Shutdown ends the stream
        app.registry.shutdown();
        let end = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_websocket_without_identity() {
        let app = create_test_app();

        let response = app.router.oneshot(get("/ws", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(app.registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_websocket_requires_upgrade() {
        let app = create_test_app();

        let response = app.router.oneshot(get("/ws", Some("v1"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
        assert!(!app.registry.contains("v1"));
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_test_app();
        app.registry.register("v1");

        let response = app.router.oneshot(get("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["connections"], 1);
    }

    #[tokio::test]
    async fn test_health_live() {
        let app = create_test_app();

        let response = app.router.oneshot(get("/health/live", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_path_not_found() {
        let app = create_test_app();

        let response = app.router.oneshot(get("/rewind", Some("v1"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(app.registry.connection_count(), 0);
    }
}
