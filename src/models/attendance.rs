use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One attendance mark per (child, date), last write wins.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub child_id: Uuid,
    pub group_id: Uuid,
    pub date: NaiveDate,
    pub attended: bool,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct MarkAttendanceRequest {
    pub child_id: Uuid,
    pub group_id: Uuid,
    pub date: NaiveDate,
    pub attended: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupAttendanceQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceHistoryQuery {
    /// "YYYY-MM"; current month when omitted.
    pub month: Option<String>,
}
