use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl std::fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CertificateStatus::Pending => "pending",
            CertificateStatus::Confirmed => "confirmed",
            CertificateStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for CertificateStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CertificateStatus::Pending),
            "confirmed" => Ok(CertificateStatus::Confirmed),
            "rejected" => Ok(CertificateStatus::Rejected),
            _ => Err(anyhow::anyhow!("Unknown certificate status: {s}")),
        }
    }
}

/// Medically certified absence interval [date_from, date_to], inclusive.
/// Only confirmed certificates affect billing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MedicalCertificate {
    pub id: Uuid,
    pub child_id: Uuid,
    pub submitted_by: Uuid,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    /// Fetched as TEXT (status::TEXT).
    pub status: String,
    pub cost_per_lesson: Decimal,
    pub total_cost: Decimal,
    pub file_path: Option<String>,
    pub admin_comment: String,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CertificateQuery {
    pub status: Option<String>,
    pub child_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewCertificateRequest {
    pub certificate_id: Uuid,
    /// "confirm" | "reject"
    pub action: String,
    pub admin_comment: Option<String>,
}
