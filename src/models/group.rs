use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Valid age_level values ("Младшая" / "Средняя" / "Старшая").
pub const AGE_LEVELS: &[&str] = &["S", "M", "L"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub kindergarten_number: String,
    /// Fetched as TEXT (age_level::TEXT), one of AGE_LEVELS.
    pub age_level: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub kindergarten_number: String,
    pub age_level: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub kindergarten_number: Option<String>,
    pub age_level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetTrainersRequest {
    pub trainer_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupTrainer {
    pub trainer_id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
}
