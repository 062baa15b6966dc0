//! HTTP server for the chat relay.
//!
//! Provides:
//! - Health check
//! - Chat relay and conversation reset
//! - The static front-end

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Router with CORS and request tracing layered on.
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve the relay on `0.0.0.0:port` until `shutdown_signal` resolves.
///
/// In-flight requests finish before the listener closes.
///
/// # Errors
/// Returns an error if the server fails to start.
pub async fn serve<F>(
    state: Arc<AppState>,
    port: u16,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Chat relay listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use crate::conversation::{ConversationSeed, InMemoryConversationStore};
    use crate::relay::ChatRelay;
    use crate::relay::tests::ScriptedForwarder;

    #[tokio::test]
    async fn test_build_app_allows_any_origin() -> Result<(), Box<dyn std::error::Error>> {
        let store = Arc::new(InMemoryConversationStore::new(ConversationSeed::new("p", "g")));
        let relay = ChatRelay::new(store, Arc::new(ScriptedForwarder::replying(&[])));
        let app = build_app(AppState::new(relay, "static"));

        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())?;
        let response = app.oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&header::HeaderValue::from_static("*"))
        );
        Ok(())
    }
}
