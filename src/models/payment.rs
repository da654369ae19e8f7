use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvoiceStatus::Pending),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Unknown invoice status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReceiptStatus::Pending => "pending",
            ReceiptStatus::Approved => "approved",
            ReceiptStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ReceiptStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReceiptStatus::Pending),
            "approved" => Ok(ReceiptStatus::Approved),
            "rejected" => Ok(ReceiptStatus::Rejected),
            _ => Err(anyhow::anyhow!("Unknown receipt status: {s}")),
        }
    }
}

/// Per-group billing configuration, created lazily with defaults.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentSettings {
    pub id: Uuid,
    pub group_id: Uuid,
    pub price_per_training: Decimal,
    pub default_trainings_per_month: i32,
    pub invoice_generation_day: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentSettingsRequest {
    pub price_per_training: Option<Decimal>,
    pub default_trainings_per_month: Option<i32>,
    pub invoice_generation_day: Option<i32>,
    pub is_active: Option<bool>,
}

/// Monthly invoice, unique per (child, invoice_month). invoice_month is
/// always the first day of the billed month.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentInvoice {
    pub id: Uuid,
    pub child_id: Uuid,
    pub invoice_month: NaiveDate,
    pub total_trainings: i32,
    pub confirmed_absences: i32,
    pub billable_trainings: i32,
    pub price_per_training: Decimal,
    pub total_amount: Decimal,
    /// Fetched as TEXT (status::TEXT).
    pub status: String,
    pub due_date: NaiveDate,
    pub qr_path: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentReceipt {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub uploaded_by: Uuid,
    pub file_path: String,
    /// Fetched as TEXT (status::TEXT).
    pub status: String,
    pub parsed_amount: Option<Decimal>,
    pub parsed_date: Option<NaiveDate>,
    pub parsed_bank: Option<String>,
    pub amount_match: Option<bool>,
    pub raw_preview: String,
    pub admin_comment: String,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Short receipt view embedded in the parent invoice listing.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptSummary {
    pub id: Uuid,
    pub status: String,
    pub parsed_amount: Option<Decimal>,
    pub amount_match: Option<bool>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceWithReceipt {
    #[serde(flatten)]
    pub invoice: PaymentInvoice,
    pub latest_receipt: Option<ReceiptSummary>,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceQuery {
    pub child_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiptQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewReceiptRequest {
    pub receipt_id: Uuid,
    /// "approve" | "reject"
    pub action: String,
    pub admin_comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateInvoicesRequest {
    /// "YYYY-MM"; next calendar month when omitted.
    pub target_month: Option<String>,
}
