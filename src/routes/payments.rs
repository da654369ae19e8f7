use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    models::{
        auth::AuthenticatedUser,
        payment::{
            GenerateInvoicesRequest, InvoiceQuery, ReceiptQuery, ReviewReceiptRequest,
            UpdatePaymentSettingsRequest,
        },
        user::UserRole,
    },
    services::billing::{next_month, parse_month, BillingService},
    services::receipts::ReceiptService,
    AppState,
};

fn require_admin(user: &AuthenticatedUser) -> Option<(StatusCode, Json<Value>)> {
    match user.role {
        UserRole::Admin => None,
        _ => Some((StatusCode::FORBIDDEN, Json(json!({ "error": "Доступ запрещен" })))),
    }
}

/// Admin trigger: generate invoices for the coming month (or an explicit
/// "YYYY-MM" from the request body). The body is optional.
pub async fn generate_invoices(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = require_admin(&user) {
        return Err(err);
    }

    let requested: Option<String> = if body.is_empty() {
        None
    } else {
        let req: GenerateInvoicesRequest = serde_json::from_slice(&body).map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Некорректный JSON: {e}") })),
            )
        })?;
        req.target_month
    };

    let target_month = match requested.as_deref() {
        Some(m) => parse_month(m).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Неверный формат месяца, ожидается YYYY-MM" })),
            )
        })?,
        None => next_month(Utc::now().date_naive()),
    };

    let invoices =
        BillingService::generate_for_month(&state.db, &state.config.media_dir, target_month)
            .await
            .map_err(Into::<(StatusCode, Json<Value>)>::into)?;

    Ok(Json(json!({
        "count": invoices.len(),
        "target_month": target_month.format("%Y-%m").to_string(),
    })))
}

pub async fn list_payment_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = require_admin(&user) {
        return Err(err);
    }

    BillingService::list_settings(&state.db)
        .await
        .map(|s| Json(serde_json::to_value(s).unwrap()))
        .map_err(Into::into)
}

pub async fn update_payment_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdatePaymentSettingsRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = require_admin(&user) {
        return Err(err);
    }

    BillingService::update_settings(&state.db, id, &body)
        .await
        .map(|s| Json(serde_json::to_value(s).unwrap()))
        .map_err(Into::into)
}

/// Invoices for the caller's children (optionally one child), each with the
/// latest receipt summary.
pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    BillingService::list_invoices(&state.db, &user, query.child_id)
        .await
        .map(|i| Json(serde_json::to_value(i).unwrap()))
        .map_err(Into::into)
}

/// Parent uploads a payment receipt (multipart: invoice_id + receipt_file);
/// the file is parsed synchronously and the extracted fields returned.
pub async fn upload_receipt(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    ReceiptService::upload(&state.db, &state.config.media_dir, &user, multipart)
        .await
        .map(|receipt| {
            (
                StatusCode::CREATED,
                Json(serde_json::to_value(receipt).unwrap()),
            )
        })
        .map_err(Into::into)
}

pub async fn list_receipts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ReceiptQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = require_admin(&user) {
        return Err(err);
    }

    ReceiptService::list(&state.db, query.status.as_deref())
        .await
        .map(|r| Json(serde_json::to_value(r).unwrap()))
        .map_err(Into::into)
}

pub async fn review_receipt(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ReviewReceiptRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = require_admin(&user) {
        return Err(err);
    }

    ReceiptService::review(&state.db, user.user_id, &body)
        .await
        .map(|(receipt, invoice)| {
            Json(json!({
                "receipt": serde_json::to_value(receipt).unwrap(),
                "invoice": serde_json::to_value(invoice).unwrap(),
            }))
        })
        .map_err(Into::into)
}

/// Stream the stored receipt file back to an admin or its uploader.
pub async fn serve_receipt_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    let path = ReceiptService::file_path(&state.db, &state.config.media_dir, &user, id)
        .await
        .map_err(Into::<(StatusCode, Json<Value>)>::into)?;

    let bytes = tokio::fs::read(&path).await.map_err(|_| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Файл чека не найден" })),
        )
    })?;

    let content_type = mime_guess::from_path(&path).first_or_octet_stream();
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type.to_string())],
        bytes,
    )
        .into_response())
}
