use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use redis::Client as RedisClient;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sportclub_api::config::Config;
use sportclub_api::middleware::auth::JwtSecret;
use sportclub_api::{db, routes, services, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let config = Arc::new(config);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let redis_client = RedisClient::open(config.redis_url.as_str())?;

    services::invoice_scheduler::start(
        pool.clone(),
        config.media_dir.clone(),
        redis_client.clone(),
    );
    services::metrics::start(pool.clone());

    let state = AppState {
        db: pool,
        config: config.clone(),
    };

    // CORS: the configured frontend origin, plus localhost for development.
    let base_url = config.app_base_url.clone();
    let cors_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let o = match origin.to_str() {
            Ok(s) => s,
            Err(_) => return false,
        };
        o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") || o == base_url
    });

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_origin(cors_origin);

    let jwt_secret = JwtSecret(config.jwt_secret.clone());

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics))
        // Groups
        .route("/api/groups", get(routes::groups::list_groups).post(routes::groups::create_group))
        .route("/api/groups/{id}", put(routes::groups::update_group).delete(routes::groups::delete_group))
        .route("/api/groups/{id}/trainers", get(routes::groups::list_group_trainers).put(routes::groups::set_group_trainers))
        // Children
        .route("/api/children", get(routes::children::list_children).post(routes::children::create_child))
        .route("/api/children/{id}", put(routes::children::update_child))
        // Training schedule
        .route("/api/schedule", get(routes::schedule::list_schedule).post(routes::schedule::create_session))
        .route("/api/schedule/{id}", put(routes::schedule::update_session).delete(routes::schedule::delete_session))
        // Attendance
        .route("/api/attendance", post(routes::attendance::mark_attendance))
        .route("/api/attendance/group/{group_id}", get(routes::attendance::group_attendance))
        .route("/api/attendance/history/{group_id}", get(routes::attendance::attendance_history))
        // Medical certificates
        .route("/api/certificates", get(routes::certificates::list_certificates).post(routes::certificates::submit_certificate))
        .route("/api/certificates/review", post(routes::certificates::review_certificate))
        // Billing
        .route("/api/admin/generate-invoices", post(routes::payments::generate_invoices))
        .route("/api/admin/payment-settings", get(routes::payments::list_payment_settings))
        .route("/api/admin/payment-settings/{id}", put(routes::payments::update_payment_settings))
        .route("/api/parent/invoices", get(routes::payments::list_invoices))
        .route("/api/parent/receipts", post(routes::payments::upload_receipt))
        .route("/api/admin/receipts", get(routes::payments::list_receipts))
        .route("/api/admin/receipts/review", post(routes::payments::review_receipt))
        .route("/api/receipts/{id}/file", get(routes::payments::serve_receipt_file))
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Receipt and certificate scans stay well under 20 MB
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("sportclub API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
