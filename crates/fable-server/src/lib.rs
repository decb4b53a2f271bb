//! Inbound proxy for the Fable backend.
//!
//! Browser-facing admin routes are re-issued against the backend through
//! [`fable_client::Forwarder`], so every answer is classified the same way
//! the session broker sees it and every failure reaches the caller as
//! `(status, {"error": message})`.
//!
//! # Example
//!
//! ```no_run
//! use fable_client::Forwarder;
//! use fable_server::{Server, ServerConfig};
//!
//! # async fn example() -> fable_server::Result<()> {
//! let forwarder = Forwarder::new("http://localhost:8080");
//! let server = Server::new(forwarder, ServerConfig::default());
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod caller;
pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

pub use caller::{Caller, bearer_token, caller_context, client_ip};
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use logging::request_logging_middleware;
pub use state::AppState;

use std::net::SocketAddr;

use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use fable_client::Forwarder;
use fable_config::FableConfig;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// The Fable proxy server.
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(forwarder: Forwarder, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(forwarder, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Wire the forwarder and server settings from loaded configuration.
    pub fn from_config(config: &FableConfig) -> Result<Self> {
        let forwarder = Forwarder::new(config.backend_url()).with_timeout(config.request_timeout());
        Ok(Self::new(forwarder, ServerConfig::from_fable(config)?))
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let router = Router::new()
            .merge(routes::health_routes())
            .nest("/api/admin", self.admin_routes())
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                logging::request_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http());

        let router = match self.cors_layer() {
            Some(cors) => router.layer(cors),
            None => router,
        };
        router.with_state(self.state.clone())
    }

    fn admin_routes(&self) -> Router<AppState> {
        Router::new()
            .route("/auth/login", post(routes::login_handler))
            .route("/auth/register", post(routes::register_handler))
            .route("/auth/verify-admin", get(routes::verify_admin_handler))
            .route(
                "/auth/invitation/validate/{token}",
                get(routes::invitation_handler),
            )
            .route("/moderation/chapters", get(routes::chapters_handler))
    }

    fn cors_layer(&self) -> Option<CorsLayer> {
        let origins: Vec<HeaderValue> = self
            .state
            .config
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        if origins.is_empty() {
            return None;
        }
        Some(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    }

    /// Run on the configured bind address.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run on a specific address.
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind {}: {}", addr, e)))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        info!(
            addr = %local,
            backend = %self.state.forwarder.base_url(),
            "Fable proxy listening"
        );

        let app = self.router();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn server() -> Server {
        // Nothing listens here; routes under test never reach the backend.
        let config = ServerConfig::new().with_request_logging(false);
        Server::new(Forwarder::new("http://127.0.0.1:9"), config)
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_server_health_endpoint() {
        let response = server()
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_routes_require_bearer() {
        for uri in [
            "/api/admin/auth/verify-admin",
            "/api/admin/moderation/chapters?status=pending",
        ] {
            let response = server()
                .router()
                .oneshot(
                    Request::builder()
                        .uri(uri)
                        .header("authorization", "Basic abc")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(
                json_body(response).await,
                serde_json::json!({"error": "No valid authorization header"})
            );
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let response = server()
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/admin/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid JSON body");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = server()
            .router()
            .oneshot(Request::builder().uri("/api/admin/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_cors_only_when_configured() {
        assert!(server().cors_layer().is_none());

        let config = ServerConfig::new().with_cors_origins(vec!["https://admin.fable.example".into()]);
        let server = Server::new(Forwarder::new("http://127.0.0.1:9"), config);
        assert!(server.cors_layer().is_some());
    }
}
