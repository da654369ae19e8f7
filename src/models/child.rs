use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Child {
    pub id: Uuid,
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub group_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateChildRequest {
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateChildRequest {
    pub full_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub group_id: Option<Uuid>,
    pub is_active: Option<bool>,
}
