//! Receipt upload, parsing and admin reconciliation against invoices.

use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::auth::AuthenticatedUser;
use crate::models::payment::{
    InvoiceStatus, PaymentInvoice, PaymentReceipt, ReceiptStatus, ReviewReceiptRequest,
};
use crate::models::user::UserRole;
use crate::services::error::ServiceError;
use crate::services::metrics;
use crate::services::receipt_extract::extract_text_from_receipt_file;
use crate::services::receipt_parser::parse_receipt;

const RECEIPT_COLS: &str =
    "id, invoice_id, uploaded_by, file_path, status::TEXT AS status, parsed_amount,
     parsed_date, parsed_bank, amount_match, raw_preview, admin_comment,
     reviewed_by, reviewed_at, created_at";

const INVOICE_COLS: &str =
    "id, child_id, invoice_month, total_trainings, confirmed_absences, billable_trainings,
     price_per_training, total_amount, status::TEXT AS status, due_date, qr_path,
     generated_at, paid_at";

pub struct ReceiptService;

impl ReceiptService {
    /// Store an uploaded receipt for an invoice, extract its text and parse
    /// amount/date/bank synchronously. A receipt against an already-paid
    /// invoice is rejected.
    pub async fn upload(
        pool: &PgPool,
        media_dir: &str,
        user: &AuthenticatedUser,
        mut multipart: Multipart,
    ) -> Result<PaymentReceipt, ServiceError> {
        let mut invoice_id: Option<Uuid> = None;
        let mut file_data: Option<(Vec<u8>, String)> = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServiceError::Validation(format!("Некорректная форма загрузки: {e}")))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "invoice_id" => {
                    let text = field.text().await.map_err(|e| {
                        ServiceError::Validation(format!("Некорректная форма загрузки: {e}"))
                    })?;
                    invoice_id = text.parse().ok();
                }
                "receipt_file" => {
                    let filename = field.file_name().unwrap_or("receipt").to_string();
                    let bytes = field.bytes().await.map_err(|e| {
                        ServiceError::Validation(format!("Ошибка чтения файла: {e}"))
                    })?;
                    file_data = Some((bytes.to_vec(), filename));
                }
                _ => {}
            }
        }

        let invoice_id = invoice_id
            .ok_or_else(|| ServiceError::Validation("Не указан счет (invoice_id)".into()))?;
        let (bytes, original_filename) =
            file_data.ok_or_else(|| ServiceError::Validation("Не приложен файл чека".into()))?;

        let invoice = fetch_invoice(pool, invoice_id).await?;

        if user.role == UserRole::Parent
            && !is_parent_of(pool, user.user_id, invoice.child_id).await?
        {
            return Err(ServiceError::Forbidden("Доступ запрещен".into()));
        }
        if invoice.status == InvoiceStatus::Paid.to_string() {
            return Err(ServiceError::Conflict("Счет уже оплачен".into()));
        }

        let receipt_dir = PathBuf::from(media_dir).join("payment_receipts");
        tokio::fs::create_dir_all(&receipt_dir)
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?;

        let ext = Path::new(&original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let storage_filename = format!("{}.{}", Uuid::new_v4(), ext);
        let storage_path_full = receipt_dir.join(&storage_filename);
        tokio::fs::write(&storage_path_full, &bytes)
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?;

        // PDF text extraction is CPU-bound and may be slow on scanned files.
        let extract_path = storage_path_full.clone();
        let text = tokio::task::spawn_blocking(move || {
            extract_text_from_receipt_file(&extract_path)
        })
        .await
        .map_err(|e| ServiceError::Internal(e.into()))?;

        let parsed = parse_receipt(&text, invoice.total_amount);

        let receipt = sqlx::query_as::<_, PaymentReceipt>(&format!(
            "INSERT INTO payment_receipts
                 (invoice_id, uploaded_by, file_path, parsed_amount, parsed_date,
                  parsed_bank, amount_match, raw_preview)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {RECEIPT_COLS}"
        ))
        .bind(invoice.id)
        .bind(user.user_id)
        .bind(format!("payment_receipts/{storage_filename}"))
        .bind(parsed.parsed_amount)
        .bind(parsed.parsed_date)
        .bind(&parsed.parsed_bank)
        .bind(parsed.amount_match)
        .bind(&parsed.raw_preview)
        .fetch_one(pool)
        .await?;

        metrics::RECEIPTS_UPLOADED.inc();
        if parsed.parsed_amount.is_some() {
            metrics::RECEIPTS_PARSED.inc();
        }
        Ok(receipt)
    }

    /// Admin decision on a pending receipt. Approval marks the invoice paid;
    /// rejection leaves the invoice unchanged so the parent can retry.
    pub async fn review(
        pool: &PgPool,
        reviewer_id: Uuid,
        req: &ReviewReceiptRequest,
    ) -> Result<(PaymentReceipt, PaymentInvoice), ServiceError> {
        let status = match req.action.as_str() {
            "approve" => ReceiptStatus::Approved,
            "reject" => ReceiptStatus::Rejected,
            other => {
                return Err(ServiceError::Validation(format!(
                    "Недопустимое действие: {other}"
                )))
            }
        };

        // The status predicate makes the pending → terminal transition
        // atomic per row; a second concurrent review hits zero rows.
        let receipt = sqlx::query_as::<_, PaymentReceipt>(&format!(
            "UPDATE payment_receipts
             SET status = $1::receipt_status,
                 admin_comment = COALESCE($2, admin_comment),
                 reviewed_by = $3,
                 reviewed_at = NOW()
             WHERE id = $4 AND status = 'pending'
             RETURNING {RECEIPT_COLS}"
        ))
        .bind(status.to_string())
        .bind(&req.admin_comment)
        .bind(reviewer_id)
        .bind(req.receipt_id)
        .fetch_optional(pool)
        .await?;

        let receipt = match receipt {
            Some(r) => r,
            None => {
                // Distinguish "gone" from "already decided".
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM payment_receipts WHERE id = $1)",
                )
                .bind(req.receipt_id)
                .fetch_one(pool)
                .await?;
                return Err(if exists {
                    ServiceError::Conflict("Чек уже проверен".into())
                } else {
                    ServiceError::NotFound("Чек не найден".into())
                });
            }
        };

        let invoice = if status == ReceiptStatus::Approved {
            sqlx::query_as::<_, PaymentInvoice>(&format!(
                "UPDATE payment_invoices
                 SET status = 'paid', paid_at = NOW()
                 WHERE id = $1
                 RETURNING {INVOICE_COLS}"
            ))
            .bind(receipt.invoice_id)
            .fetch_one(pool)
            .await?
        } else {
            fetch_invoice(pool, receipt.invoice_id).await?
        };

        Ok((receipt, invoice))
    }

    pub async fn list(
        pool: &PgPool,
        status: Option<&str>,
    ) -> Result<Vec<PaymentReceipt>, ServiceError> {
        let receipts = sqlx::query_as::<_, PaymentReceipt>(&format!(
            "SELECT {RECEIPT_COLS} FROM payment_receipts
             WHERE ($1::TEXT IS NULL OR status::TEXT = $1)
             ORDER BY created_at DESC"
        ))
        .bind(status)
        .fetch_all(pool)
        .await?;
        Ok(receipts)
    }

    /// Absolute path of a receipt file, access-checked: admins and the
    /// uploading parent only.
    pub async fn file_path(
        pool: &PgPool,
        media_dir: &str,
        user: &AuthenticatedUser,
        receipt_id: Uuid,
    ) -> Result<PathBuf, ServiceError> {
        let receipt = sqlx::query_as::<_, PaymentReceipt>(&format!(
            "SELECT {RECEIPT_COLS} FROM payment_receipts WHERE id = $1"
        ))
        .bind(receipt_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Чек не найден".into()))?;

        if user.role != UserRole::Admin && receipt.uploaded_by != user.user_id {
            return Err(ServiceError::Forbidden("Доступ запрещен".into()));
        }
        Ok(PathBuf::from(media_dir).join(&receipt.file_path))
    }
}

async fn fetch_invoice(pool: &PgPool, invoice_id: Uuid) -> Result<PaymentInvoice, ServiceError> {
    sqlx::query_as::<_, PaymentInvoice>(&format!(
        "SELECT {INVOICE_COLS} FROM payment_invoices WHERE id = $1"
    ))
    .bind(invoice_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::NotFound("Счет не найден".into()))
}

async fn is_parent_of(pool: &PgPool, user_id: Uuid, child_id: Uuid) -> Result<bool, ServiceError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM user_children WHERE user_id = $1 AND child_id = $2)",
    )
    .bind(user_id)
    .bind(child_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}
