//! StudyHub API Gateway
//!
//! The HTTP boundary for the note request workflow.
//! Handles:
//! - Bearer token authentication
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use studyhub_common::{
    auth::JwtManager,
    config::AppConfig,
    db::DbPool,
    files::{FileIntake, LocalFileStore},
    metrics,
    Repository, ReviewWorkflow,
};
use tokio::{signal, sync::Notify};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub workflow: ReviewWorkflow,
    pub files: Arc<dyn FileIntake>,
    pub jwt: Arc<JwtManager>,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    init_tracing(&config);

    info!("Starting StudyHub API Gateway v{}", studyhub_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                metrics::LATENCY_BUCKETS,
            )?
            .install()?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.migrate().await?;
    }

    let jwt_secret = config.auth.jwt_secret.clone().ok_or_else(|| {
        tracing::error!("APP__AUTH__JWT_SECRET is not set");
        "missing auth.jwt_secret"
    })?;

    let files = LocalFileStore::new(&config.storage).await?;

    // Create app state
    let state = AppState {
        config: config.clone(),
        workflow: ReviewWorkflow::new(Arc::new(Repository::new(db.clone()))),
        db,
        files: Arc::new(files),
        jwt: Arc::new(JwtManager::new(&jwt_secret, config.auth.jwt_expiration_secs)),
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::new(host, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let draining = Arc::new(Notify::new());
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let draining = draining.clone();
        async move {
            shutdown_signal().await;
            draining.notify_one();
        }
    });

    drain_with_deadline(server.into_future(), &draining, config.shutdown_timeout()).await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Install the tracing subscriber from observability config
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let storage = &state.config.storage;
    let uploads = ServeDir::new(&storage.upload_dir);
    let uploads_path = storage.public_prefix.clone();

    // Request workflow routes
    let request_routes = Router::new()
        .route("/", post(handlers::requests::submit))
        .route("/my", get(handlers::requests::list_mine))
        .route("/stats", get(handlers::requests::stats))
        .route("/history/{student_id}", get(handlers::requests::list_history))
        .route("/pending", get(handlers::requests::list_pending))
        .route("/reviewed", get(handlers::requests::list_reviewed))
        .route("/unpublished", get(handlers::requests::list_unpublished))
        .route("/{id}/approve", put(handlers::requests::approve))
        .route("/{id}/reject", put(handlers::requests::reject))
        .route("/{id}/republish", post(handlers::requests::republish));

    let rate_limit = &state.config.rate_limit;
    let mut api_routes = Router::new().nest("/requests", request_routes);
    if rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            rate_limit.requests_per_second,
            rate_limit.burst,
        );
        api_routes = api_routes.layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app
    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .nest_service(&uploads_path, uploads)
        .layer(axum::middleware::from_fn(middleware::metrics::track_metrics))
        .layer(DefaultBodyLimit::max(state.config.server.body_limit_bytes))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Run the server until it finishes draining, or until `grace` has passed
/// since `draining` was notified
async fn drain_with_deadline<F>(server: F, draining: &Notify, grace: Duration) -> std::io::Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    let deadline = async {
        draining.notified().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => result,
        _ = deadline => {
            warn!(grace_secs = grace.as_secs(), "Shutdown deadline reached, dropping open connections");
            Ok(())
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use studyhub_common::auth::{Principal, Role};
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "gateway-test-secret";

    /// State backed by a disconnected database; only paths that fail
    /// before touching storage are exercised here.
    async fn test_state(mut config: AppConfig) -> AppState {
        config.storage.upload_dir =
            std::env::temp_dir().join(format!("studyhub-gateway-{}", Uuid::new_v4()));
        let config = Arc::new(config);

        let db = DbPool::from_connection(Default::default());
        let files = LocalFileStore::new(&config.storage).await.unwrap();

        AppState {
            workflow: ReviewWorkflow::new(Arc::new(Repository::new(db.clone()))),
            db,
            files: Arc::new(files),
            jwt: Arc::new(JwtManager::new(SECRET, 3600)),
            config,
        }
    }

    fn config_without_rate_limit() -> AppConfig {
        let mut config = AppConfig::default();
        config.rate_limit.enabled = false;
        config
    }

    fn token(role: Role) -> String {
        let principal = Principal::new(Uuid::new_v4(), role, Uuid::new_v4());
        JwtManager::new(SECRET, 3600).generate_token(&principal).unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> Response {
        app.oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_drain_stops_at_deadline() {
        let draining = Notify::new();
        draining.notify_one();

        let stuck = std::future::pending::<std::io::Result<()>>();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            drain_with_deadline(stuck, &draining, Duration::from_millis(20)),
        )
        .await;

        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_drain_returns_server_result() {
        let draining = Notify::new();

        let finished = async { Err(std::io::Error::other("listener closed")) };
        let result = drain_with_deadline(finished, &draining, Duration::from_secs(60)).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(test_state(config_without_rate_limit()).await);

        let response = send(app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_reports_database_down() {
        let app = create_router(test_state(config_without_rate_limit()).await);

        let response = send(app, Request::get("/ready").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = json_body(response).await;
        assert_eq!(body["checks"]["database"]["status"], "down");
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let app = create_router(test_state(config_without_rate_limit()).await);

        let response = send(
            app,
            Request::get("/api/requests/pending").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_garbage_token_is_unauthorized() {
        let app = create_router(test_state(config_without_rate_limit()).await);

        let response = send(
            app,
            Request::get("/api/requests/my")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_student_cannot_list_pending() {
        let app = create_router(test_state(config_without_rate_limit()).await);

        let response = send(
            app,
            Request::get("/api/requests/pending")
                .header(header::AUTHORIZATION, format!("Bearer {}", token(Role::Student)))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_reject_requires_reason() {
        let app = create_router(test_state(config_without_rate_limit()).await);

        let response = send(
            app,
            Request::put(format!("/api/requests/{}/reject", Uuid::new_v4()))
                .header(header::AUTHORIZATION, format!("Bearer {}", token(Role::Teacher)))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"teacherMessage":"   "}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["error"]["field"], "teacher_message");
    }

    #[tokio::test]
    async fn test_reject_without_json_body_uses_error_envelope() {
        let state = test_state(config_without_rate_limit()).await;
        let uri = format!("/api/requests/{}/reject", Uuid::new_v4());
        let auth = format!("Bearer {}", token(Role::Teacher));

        let missing = send(
            create_router(state.clone()),
            Request::put(&uri)
                .header(header::AUTHORIZATION, &auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        let body = json_body(missing).await;
        assert_eq!(body["error"]["field"], "teacher_message");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Rejection reason is required"));

        let malformed = send(
            create_router(state),
            Request::put(&uri)
                .header(header::AUTHORIZATION, &auth)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("reason: blurry"))
                .unwrap(),
        )
        .await;
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
        let body = json_body(malformed).await;
        assert_eq!(body["error"]["field"], "teacher_message");
    }

    #[tokio::test]
    async fn test_rate_limit_applies_to_api_routes() {
        let mut config = AppConfig::default();
        config.rate_limit.enabled = true;
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst = 1;
        let app = create_router(test_state(config).await);

        let first = send(
            app.clone(),
            Request::get("/api/requests/my").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(first.status(), StatusCode::UNAUTHORIZED);

        let second = send(
            app.clone(),
            Request::get("/api/requests/my").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        // Health probes sit outside the limiter
        let health = send(app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(health.status(), StatusCode::OK);
    }
}
