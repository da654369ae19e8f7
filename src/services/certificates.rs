//! Medical certificates: parent submission and admin review. Only confirmed
//! certificates feed the billing proration.

use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::auth::AuthenticatedUser;
use crate::models::certificate::{
    CertificateQuery, CertificateStatus, MedicalCertificate, ReviewCertificateRequest,
};
use crate::models::user::UserRole;
use crate::services::children::ChildService;
use crate::services::error::ServiceError;

const CERT_COLS: &str =
    "id, child_id, submitted_by, date_from, date_to, status::TEXT AS status,
     cost_per_lesson, total_cost, file_path, admin_comment, reviewed_by,
     reviewed_at, created_at";

/// Certificate cost: per-lesson rate times the absence length in days,
/// capped at one year.
pub fn certificate_total_cost(
    cost_per_lesson: Decimal,
    date_from: NaiveDate,
    date_to: NaiveDate,
) -> Decimal {
    let days = (date_to - date_from).num_days() + 1;
    cost_per_lesson * Decimal::from(days.min(365))
}

pub struct CertificateService;

impl CertificateService {
    /// Parent submits a certificate: absence interval, per-lesson cost and
    /// an optional scan of the paper document.
    pub async fn submit(
        pool: &PgPool,
        media_dir: &str,
        user: &AuthenticatedUser,
        mut multipart: Multipart,
    ) -> Result<MedicalCertificate, ServiceError> {
        let mut child_id: Option<Uuid> = None;
        let mut date_from: Option<NaiveDate> = None;
        let mut date_to: Option<NaiveDate> = None;
        let mut cost_per_lesson = Decimal::ZERO;
        let mut file_data: Option<(Vec<u8>, String)> = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServiceError::Validation(format!("Некорректная форма загрузки: {e}")))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "child_id" => {
                    child_id = read_text(field).await?.parse().ok();
                }
                "date_from" => {
                    date_from = parse_date_field(&read_text(field).await?);
                }
                "date_to" => {
                    date_to = parse_date_field(&read_text(field).await?);
                }
                "cost_per_lesson" => {
                    cost_per_lesson = read_text(field).await?.parse().unwrap_or(Decimal::ZERO);
                }
                "file" => {
                    let filename = field.file_name().unwrap_or("certificate").to_string();
                    let bytes = field.bytes().await.map_err(|e| {
                        ServiceError::Validation(format!("Ошибка чтения файла: {e}"))
                    })?;
                    file_data = Some((bytes.to_vec(), filename));
                }
                _ => {}
            }
        }

        let child_id = child_id
            .ok_or_else(|| ServiceError::Validation("Не указан ребенок (child_id)".into()))?;
        let date_from = date_from
            .ok_or_else(|| ServiceError::Validation("Не указана дата начала (date_from)".into()))?;
        let date_to = date_to
            .ok_or_else(|| ServiceError::Validation("Не указана дата окончания (date_to)".into()))?;
        if date_from > date_to {
            return Err(ServiceError::Validation(
                "Дата начала не может быть позже даты окончания".into(),
            ));
        }

        if user.role == UserRole::Parent
            && !ChildService::is_parent_of(pool, child_id, user.user_id)
                .await
                .map_err(ServiceError::Internal)?
        {
            return Err(ServiceError::Forbidden("Доступ запрещен".into()));
        }

        let file_path = match file_data {
            Some((bytes, original_filename)) => {
                let cert_dir = PathBuf::from(media_dir).join("certificates");
                tokio::fs::create_dir_all(&cert_dir)
                    .await
                    .map_err(|e| ServiceError::Internal(e.into()))?;
                let ext = Path::new(&original_filename)
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("bin");
                let storage_filename = format!("{}.{}", Uuid::new_v4(), ext);
                tokio::fs::write(cert_dir.join(&storage_filename), &bytes)
                    .await
                    .map_err(|e| ServiceError::Internal(e.into()))?;
                Some(format!("certificates/{storage_filename}"))
            }
            None => None,
        };

        let total_cost = certificate_total_cost(cost_per_lesson, date_from, date_to);

        let certificate = sqlx::query_as::<_, MedicalCertificate>(&format!(
            "INSERT INTO medical_certificates
                 (child_id, submitted_by, date_from, date_to, cost_per_lesson,
                  total_cost, file_path)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {CERT_COLS}"
        ))
        .bind(child_id)
        .bind(user.user_id)
        .bind(date_from)
        .bind(date_to)
        .bind(cost_per_lesson)
        .bind(total_cost)
        .bind(&file_path)
        .fetch_one(pool)
        .await?;
        Ok(certificate)
    }

    pub async fn list(
        pool: &PgPool,
        user: &AuthenticatedUser,
        query: &CertificateQuery,
    ) -> Result<Vec<MedicalCertificate>, ServiceError> {
        let certificates = if user.role == UserRole::Parent {
            sqlx::query_as::<_, MedicalCertificate>(&format!(
                "SELECT m.id, m.child_id, m.submitted_by, m.date_from, m.date_to,
                        m.status::TEXT AS status, m.cost_per_lesson, m.total_cost,
                        m.file_path, m.admin_comment, m.reviewed_by, m.reviewed_at,
                        m.created_at
                 FROM medical_certificates m
                 JOIN user_children uc ON uc.child_id = m.child_id
                 WHERE uc.user_id = $1
                   AND ($2::TEXT IS NULL OR m.status::TEXT = $2)
                   AND ($3::UUID IS NULL OR m.child_id = $3)
                 ORDER BY m.created_at DESC"
            ))
            .bind(user.user_id)
            .bind(&query.status)
            .bind(query.child_id)
            .fetch_all(pool)
            .await?
        } else {
            sqlx::query_as::<_, MedicalCertificate>(&format!(
                "SELECT {CERT_COLS} FROM medical_certificates
                 WHERE ($1::TEXT IS NULL OR status::TEXT = $1)
                   AND ($2::UUID IS NULL OR child_id = $2)
                 ORDER BY created_at DESC"
            ))
            .bind(&query.status)
            .bind(query.child_id)
            .fetch_all(pool)
            .await?
        };
        Ok(certificates)
    }

    /// Admin decision: pending → confirmed | rejected, once.
    pub async fn review(
        pool: &PgPool,
        reviewer_id: Uuid,
        req: &ReviewCertificateRequest,
    ) -> Result<MedicalCertificate, ServiceError> {
        let status = match req.action.as_str() {
            "confirm" => CertificateStatus::Confirmed,
            "reject" => CertificateStatus::Rejected,
            other => {
                return Err(ServiceError::Validation(format!(
                    "Недопустимое действие: {other}"
                )))
            }
        };

        let certificate = sqlx::query_as::<_, MedicalCertificate>(&format!(
            "UPDATE medical_certificates
             SET status = $1::certificate_status,
                 admin_comment = COALESCE($2, admin_comment),
                 reviewed_by = $3,
                 reviewed_at = NOW()
             WHERE id = $4 AND status = 'pending'
             RETURNING {CERT_COLS}"
        ))
        .bind(status.to_string())
        .bind(&req.admin_comment)
        .bind(reviewer_id)
        .bind(req.certificate_id)
        .fetch_optional(pool)
        .await?;

        match certificate {
            Some(c) => Ok(c),
            None => {
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM medical_certificates WHERE id = $1)",
                )
                .bind(req.certificate_id)
                .fetch_one(pool)
                .await?;
                Err(if exists {
                    ServiceError::Conflict("Справка уже проверена".into())
                } else {
                    ServiceError::NotFound("Справка не найдена".into())
                })
            }
        }
    }
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ServiceError> {
    field
        .text()
        .await
        .map_err(|e| ServiceError::Validation(format!("Некорректная форма загрузки: {e}")))
}

fn parse_date_field(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn total_cost_counts_inclusive_days() {
        let cost = Decimal::from_str("500.00").unwrap();
        // 1st..10th inclusive is 10 days.
        assert_eq!(
            certificate_total_cost(cost, d(2024, 3, 1), d(2024, 3, 10)),
            Decimal::from_str("5000.00").unwrap()
        );
        // Single-day certificate.
        assert_eq!(
            certificate_total_cost(cost, d(2024, 3, 1), d(2024, 3, 1)),
            Decimal::from_str("500.00").unwrap()
        );
    }

    #[test]
    fn total_cost_capped_at_one_year() {
        let cost = Decimal::from_str("100.00").unwrap();
        assert_eq!(
            certificate_total_cost(cost, d(2023, 1, 1), d(2024, 12, 31)),
            Decimal::from_str("36500.00").unwrap()
        );
    }
}
