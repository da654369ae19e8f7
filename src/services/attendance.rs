use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::attendance::{AttendanceRecord, MarkAttendanceRequest};
use crate::services::billing::month_bounds;
use crate::services::error::ServiceError;

pub struct AttendanceService;

impl AttendanceService {
    /// Insert or update the mark for (child, date) — last write wins.
    pub async fn mark(
        pool: &PgPool,
        req: &MarkAttendanceRequest,
    ) -> Result<AttendanceRecord, ServiceError> {
        if req.attended && req.reason.is_some() {
            return Err(ServiceError::Validation(
                "Причина отсутствия указывается только для пропуска".into(),
            ));
        }
        let record = sqlx::query_as::<_, AttendanceRecord>(
            "INSERT INTO attendance (child_id, group_id, date, attended, reason)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (child_id, date) DO UPDATE SET
                 group_id   = EXCLUDED.group_id,
                 attended   = EXCLUDED.attended,
                 reason     = EXCLUDED.reason,
                 updated_at = NOW()
             RETURNING *",
        )
        .bind(req.child_id)
        .bind(req.group_id)
        .bind(req.date)
        .bind(req.attended)
        .bind(&req.reason)
        .fetch_one(pool)
        .await?;
        Ok(record)
    }

    pub async fn for_group_on_date(
        pool: &PgPool,
        group_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, ServiceError> {
        let records = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT a.* FROM attendance a
             JOIN children c ON c.id = a.child_id
             WHERE a.group_id = $1 AND a.date = $2
             ORDER BY c.full_name",
        )
        .bind(group_id)
        .bind(date)
        .fetch_all(pool)
        .await?;
        Ok(records)
    }

    /// Month history for a group, oldest date first.
    pub async fn history(
        pool: &PgPool,
        group_id: Uuid,
        month_anchor: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, ServiceError> {
        let (month_start, month_end) = month_bounds(month_anchor);
        let records = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT a.* FROM attendance a
             JOIN children c ON c.id = a.child_id
             WHERE a.group_id = $1 AND a.date BETWEEN $2 AND $3
             ORDER BY a.date, c.full_name",
        )
        .bind(group_id)
        .bind(month_start)
        .bind(month_end)
        .fetch_all(pool)
        .await?;
        Ok(records)
    }
}
