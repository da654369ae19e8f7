use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    models::{
        auth::AuthenticatedUser,
        child::{CreateChildRequest, UpdateChildRequest},
        user::UserRole,
    },
    services::children::ChildService,
    AppState,
};

fn require_admin(user: &AuthenticatedUser) -> Option<(StatusCode, Json<Value>)> {
    match user.role {
        UserRole::Admin => None,
        _ => Some((StatusCode::FORBIDDEN, Json(json!({ "error": "Доступ запрещен" })))),
    }
}

#[derive(Debug, Deserialize)]
pub struct ChildrenQuery {
    pub group_id: Option<Uuid>,
}

pub async fn list_children(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ChildrenQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let children = match (user.role, query.group_id) {
        (UserRole::Parent, _) => ChildService::list_for_parent(&state.db, user.user_id).await,
        (_, Some(group_id)) => ChildService::list_for_group(&state.db, group_id).await,
        _ => ChildService::list(&state.db).await,
    };

    children
        .map(|c| Json(serde_json::to_value(c).unwrap()))
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })
}

pub async fn create_child(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateChildRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if let Some(err) = require_admin(&user) {
        return Err(err);
    }

    ChildService::create(&state.db, &body)
        .await
        .map(|child| (StatusCode::CREATED, Json(serde_json::to_value(child).unwrap())))
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })
}

pub async fn update_child(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateChildRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = require_admin(&user) {
        return Err(err);
    }

    ChildService::update(&state.db, id, &body)
        .await
        .map(|child| Json(serde_json::to_value(child).unwrap()))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}
