use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    models::{
        auth::AuthenticatedUser,
        schedule::{CreateSessionRequest, ScheduleQuery, UpdateSessionRequest},
        user::UserRole,
    },
    services::billing::parse_month,
    services::schedule::ScheduleService,
    AppState,
};

fn require_staff(user: &AuthenticatedUser) -> Option<(StatusCode, Json<Value>)> {
    match user.role {
        UserRole::Admin | UserRole::Trainer => None,
        UserRole::Parent => {
            Some((StatusCode::FORBIDDEN, Json(json!({ "error": "Доступ запрещен" }))))
        }
    }
}

pub async fn list_schedule(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = require_staff(&user) {
        return Err(err);
    }

    let month_anchor = match &query.month {
        Some(m) => parse_month(m).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Неверный формат месяца, ожидается YYYY-MM" })),
            )
        })?,
        None => Utc::now().date_naive(),
    };

    ScheduleService::list_for_month(&state.db, query.group_id, month_anchor)
        .await
        .map(|s| Json(serde_json::to_value(s).unwrap()))
        .map_err(Into::into)
}

pub async fn create_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if let Some(err) = require_staff(&user) {
        return Err(err);
    }

    ScheduleService::create(&state.db, &body)
        .await
        .map(|s| (StatusCode::CREATED, Json(serde_json::to_value(s).unwrap())))
        .map_err(Into::into)
}

pub async fn update_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateSessionRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = require_staff(&user) {
        return Err(err);
    }

    ScheduleService::update_status(&state.db, id, &body)
        .await
        .map(|s| Json(serde_json::to_value(s).unwrap()))
        .map_err(Into::into)
}

pub async fn delete_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = require_staff(&user) {
        return Err(err);
    }

    ScheduleService::delete(&state.db, id)
        .await
        .map(|_| Json(json!({ "message": "Тренировка удалена" })))
        .map_err(Into::into)
}
