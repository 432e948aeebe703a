pub mod auth;
pub mod error;
mod reports;
mod uploads;
mod validation;

#[cfg(test)]
mod tests;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.upload.max_body_mb * 1024 * 1024;

    // Account routes
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/profile", get(auth::profile))
        .route("/logout", post(auth::logout));

    // Photo uploads
    let upload_routes = Router::new()
        .route("/upload-by-link", post(uploads::upload_by_link))
        .route("/upload", post(uploads::upload_photos))
        .layer(DefaultBodyLimit::max(upload_limit));

    // Reports (session checked per handler)
    let report_routes = Router::new()
        .route(
            "/reports",
            get(reports::list_reports)
                .post(reports::create_report)
                .put(reports::update_report),
        )
        .route("/reports/:id", get(reports::get_report));

    Router::new()
        .route("/health", get(health_check))
        .route("/test", get(test_ok))
        .merge(auth_routes)
        .merge(upload_routes)
        .merge(report_routes)
        .nest_service("/uploads", ServeDir::new(&state.config.server.uploads_dir))
        .layer(cors_layer(&state.config.server.cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Credentialed CORS for the single configured front-end origin
fn cors_layer(origin: &str) -> CorsLayer {
    let origin = HeaderValue::from_str(origin).unwrap_or_else(|_| {
        tracing::warn!(origin = %origin, "Invalid CORS origin, falling back to localhost:5173");
        HeaderValue::from_static("http://localhost:5173")
    });

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE])
}

async fn health_check() -> &'static str {
    "OK"
}

async fn test_ok() -> Json<&'static str> {
    Json("test ok")
}
