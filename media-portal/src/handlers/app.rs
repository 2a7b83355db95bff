use crate::models::{Identity, SessionIdentity};
use crate::services::metrics::get_metrics;
use crate::AppState;
use askama::Template;
use axum::{extract::State, http::header, response::IntoResponse};
use service_core::error::AppError;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub identity: Identity,
}

pub async fn index(SessionIdentity(identity): SessionIdentity) -> impl IntoResponse {
    IndexTemplate { identity }
}

pub async fn health_check() -> &'static str {
    "OK"
}

/// Ready once MongoDB answers a ping. Connects on first call.
pub async fn readiness_check(State(state): State<AppState>) -> Result<&'static str, AppError> {
    let db = state.db.acquire().await.map_err(|e| {
        tracing::error!("Readiness check could not reach MongoDB: {}", e);
        AppError::ServiceUnavailable
    })?;
    db.health_check()
        .await
        .map_err(|_| AppError::ServiceUnavailable)?;
    Ok("OK")
}

pub async fn metrics() -> Result<impl IntoResponse, AppError> {
    let body = get_metrics()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    ))
}
