use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    models::{
        auth::AuthenticatedUser,
        group::{CreateGroupRequest, SetTrainersRequest, UpdateGroupRequest},
        user::UserRole,
    },
    services::groups::GroupService,
    AppState,
};

fn require_admin(user: &AuthenticatedUser) -> Option<(StatusCode, Json<Value>)> {
    match user.role {
        UserRole::Admin => None,
        _ => Some((StatusCode::FORBIDDEN, Json(json!({ "error": "Доступ запрещен" })))),
    }
}

pub async fn list_groups(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let groups = match user.role {
        UserRole::Parent => {
            return Err((StatusCode::FORBIDDEN, Json(json!({ "error": "Доступ запрещен" }))))
        }
        UserRole::Trainer => GroupService::list_for_trainer(&state.db, user.user_id).await,
        UserRole::Admin => GroupService::list(&state.db).await,
    };

    groups
        .map(|g| Json(serde_json::to_value(g).unwrap()))
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })
}

pub async fn create_group(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if let Some(err) = require_admin(&user) {
        return Err(err);
    }

    GroupService::create(&state.db, &body)
        .await
        .map(|group| (StatusCode::CREATED, Json(serde_json::to_value(group).unwrap())))
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })
}

pub async fn update_group(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateGroupRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = require_admin(&user) {
        return Err(err);
    }

    GroupService::update(&state.db, id, &body)
        .await
        .map(|group| Json(serde_json::to_value(group).unwrap()))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

pub async fn delete_group(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = require_admin(&user) {
        return Err(err);
    }

    GroupService::delete(&state.db, id)
        .await
        .map(|_| Json(json!({ "message": "Группа удалена" })))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

pub async fn set_group_trainers(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<SetTrainersRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = require_admin(&user) {
        return Err(err);
    }

    GroupService::set_trainers(&state.db, id, &body)
        .await
        .map(|_| Json(json!({ "message": "Тренеры назначены" })))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

pub async fn list_group_trainers(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let UserRole::Parent = user.role {
        return Err((StatusCode::FORBIDDEN, Json(json!({ "error": "Доступ запрещен" }))));
    }

    GroupService::list_trainers(&state.db, id)
        .await
        .map(|t| Json(serde_json::to_value(t).unwrap()))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}
