pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod cors;
pub mod db;
pub mod jwt;
pub mod kv;
pub mod password;
pub mod rate_limit;
pub mod session;
pub mod subscription;

use api::create_api_router;
use auth::{Authorizer, RouteConfig, authorize_request};
use axum::{Router, middleware};
use db::Database;
use jwt::JwtConfig;
use kv::KeyValueStore;
use session::SessionStore;
use std::net::SocketAddr;
use std::sync::Arc;
use subscription::SubscriptionGate;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Shared secret for the X-Admin-Key header on admin routes
    pub admin_key: Vec<u8>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret));

    let kv: Arc<dyn KeyValueStore> = Arc::new(config.db.kv());
    let sessions = SessionStore::new(kv.clone());
    let subscriptions = SubscriptionGate::new(kv, config.db.accounts());

    let authorizer = Arc::new(Authorizer::new(
        jwt.clone(),
        sessions.clone(),
        subscriptions.clone(),
        RouteConfig::standard(),
        config.admin_key.clone(),
    ));

    // Layer order, outermost first: CORS (answers preflights before
    // anything else), then the authorizer, then the routes.
    create_api_router(config.db.clone(), jwt, sessions, subscriptions)
        .layer(middleware::from_fn_with_state(authorizer, authorize_request))
        .layer(middleware::from_fn(cors::cors))
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> (tokio::task::JoinHandle<()>, SocketAddr) {
    init_cleanup(&config.db).await;

    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    let local_addr = listener.local_addr().expect("Failed to get local address");

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    (handle, local_addr)
}
