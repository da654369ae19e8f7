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
        attendance::{AttendanceHistoryQuery, GroupAttendanceQuery, MarkAttendanceRequest},
        auth::AuthenticatedUser,
        user::UserRole,
    },
    services::attendance::AttendanceService,
    services::billing::parse_month,
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

pub async fn mark_attendance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<MarkAttendanceRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = require_staff(&user) {
        return Err(err);
    }

    AttendanceService::mark(&state.db, &body)
        .await
        .map(|r| Json(serde_json::to_value(r).unwrap()))
        .map_err(Into::into)
}

pub async fn group_attendance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(group_id): Path<Uuid>,
    Query(query): Query<GroupAttendanceQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = require_staff(&user) {
        return Err(err);
    }

    AttendanceService::for_group_on_date(&state.db, group_id, query.date)
        .await
        .map(|r| Json(serde_json::to_value(r).unwrap()))
        .map_err(Into::into)
}

pub async fn attendance_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(group_id): Path<Uuid>,
    Query(query): Query<AttendanceHistoryQuery>,
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

    AttendanceService::history(&state.db, group_id, month_anchor)
        .await
        .map(|r| Json(serde_json::to_value(r).unwrap()))
        .map_err(Into::into)
}
