use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::schedule::{CreateSessionRequest, TrainingSession, UpdateSessionRequest};
use crate::services::billing::month_bounds;
use crate::services::error::ServiceError;

const SESSION_COLS: &str =
    "id, group_id, date, time, status::TEXT AS status, created_at, updated_at";

pub struct ScheduleService;

impl ScheduleService {
    /// Sessions of a group inside the month containing `month_anchor`.
    pub async fn list_for_month(
        pool: &PgPool,
        group_id: Uuid,
        month_anchor: NaiveDate,
    ) -> Result<Vec<TrainingSession>, ServiceError> {
        let (month_start, month_end) = month_bounds(month_anchor);
        let sessions = sqlx::query_as::<_, TrainingSession>(&format!(
            "SELECT {SESSION_COLS} FROM training_sessions
             WHERE group_id = $1 AND date BETWEEN $2 AND $3
             ORDER BY date, time"
        ))
        .bind(group_id)
        .bind(month_start)
        .bind(month_end)
        .fetch_all(pool)
        .await?;
        Ok(sessions)
    }

    pub async fn create(
        pool: &PgPool,
        req: &CreateSessionRequest,
    ) -> Result<TrainingSession, ServiceError> {
        let session = sqlx::query_as::<_, TrainingSession>(&format!(
            "INSERT INTO training_sessions (group_id, date, time)
             VALUES ($1, $2, $3)
             RETURNING {SESSION_COLS}"
        ))
        .bind(req.group_id)
        .bind(req.date)
        .bind(req.time)
        .fetch_one(pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ServiceError::Conflict("Тренировка на это время уже запланирована".into())
            }
            _ => ServiceError::Database(e),
        })?;
        Ok(session)
    }

    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        req: &UpdateSessionRequest,
    ) -> Result<TrainingSession, ServiceError> {
        let session = sqlx::query_as::<_, TrainingSession>(&format!(
            "UPDATE training_sessions
             SET status = $1::session_status, updated_at = NOW()
             WHERE id = $2
             RETURNING {SESSION_COLS}"
        ))
        .bind(req.status.to_string())
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Тренировка не найдена".into()))?;
        Ok(session)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM training_sessions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Тренировка не найдена".into()));
        }
        Ok(())
    }
}
