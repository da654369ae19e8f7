use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    models::{
        auth::AuthenticatedUser,
        certificate::{CertificateQuery, ReviewCertificateRequest},
        user::UserRole,
    },
    services::certificates::CertificateService,
    AppState,
};

pub async fn submit_certificate(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    CertificateService::submit(&state.db, &state.config.media_dir, &user, multipart)
        .await
        .map(|cert| (StatusCode::CREATED, Json(serde_json::to_value(cert).unwrap())))
        .map_err(Into::into)
}

pub async fn list_certificates(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<CertificateQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    CertificateService::list(&state.db, &user, &query)
        .await
        .map(|certs| Json(serde_json::to_value(certs).unwrap()))
        .map_err(Into::into)
}

pub async fn review_certificate(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ReviewCertificateRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if user.role != UserRole::Admin {
        return Err((StatusCode::FORBIDDEN, Json(json!({ "error": "Доступ запрещен" }))));
    }

    CertificateService::review(&state.db, user.user_id, &body)
        .await
        .map(|cert| Json(serde_json::to_value(cert).unwrap()))
        .map_err(Into::into)
}
