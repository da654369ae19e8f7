//! Monthly billing: training counts, medical-certificate proration and
//! invoice generation.

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::models::auth::AuthenticatedUser;
use crate::models::child::Child;
use crate::models::payment::{
    InvoiceWithReceipt, PaymentInvoice, PaymentSettings, ReceiptSummary,
    UpdatePaymentSettingsRequest,
};
use crate::models::user::UserRole;
use crate::services::error::ServiceError;
use crate::services::metrics;
use crate::services::qr;

const INVOICE_COLS: &str =
    "id, child_id, invoice_month, total_trainings, confirmed_absences, billable_trainings,
     price_per_training, total_amount, status::TEXT AS status, due_date, qr_path,
     generated_at, paid_at";

/// First and last calendar day of the month containing `target`.
pub fn month_bounds(target: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(target.year(), target.month(), 1)
        .expect("first of month is always valid");
    let next_first = if target.month() == 12 {
        NaiveDate::from_ymd_opt(target.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(target.year(), target.month() + 1, 1)
    }
    .expect("first of next month is always valid");
    let end = next_first.pred_opt().expect("last day of month");
    (start, end)
}

/// First day of the month after `today`.
pub fn next_month(today: NaiveDate) -> NaiveDate {
    let (_, end) = month_bounds(today);
    end.succ_opt().expect("day after month end")
}

/// Parse "YYYY-MM" into the first day of that month.
pub fn parse_month(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok()
}

/// Total certified absence days inside [month_start, month_end].
/// Overlapping certificates are summed independently; double-covered days
/// count twice (known simplification, clamped downstream).
pub fn absence_days_in_month(
    ranges: &[(NaiveDate, NaiveDate)],
    month_start: NaiveDate,
    month_end: NaiveDate,
) -> i64 {
    ranges
        .iter()
        .map(|(from, to)| {
            let start = (*from).max(month_start);
            let end = (*to).min(month_end);
            if start > end {
                0
            } else {
                (end - start).num_days() + 1
            }
        })
        .sum()
}

/// Absence days prorated into a count of excused trainings:
/// floor(absence_days / days_in_month * total_trainings), clamped to the
/// total. Trainings are assumed evenly spread across the month since the
/// schedule is not guaranteed to align with certificate dates.
pub fn prorate_missed_trainings(
    total_absence_days: i64,
    days_in_month: i64,
    total_trainings: i32,
) -> i32 {
    if days_in_month <= 0 {
        return 0;
    }
    let missed = (total_absence_days * total_trainings as i64) / days_in_month;
    (missed as i32).min(total_trainings)
}

/// billable = total − absences, amount = billable × price.
pub fn invoice_totals(
    total_trainings: i32,
    confirmed_absences: i32,
    price_per_training: Decimal,
) -> (i32, Decimal) {
    let billable = total_trainings - confirmed_absences;
    (billable, Decimal::from(billable) * price_per_training)
}

pub struct BillingService;

impl BillingService {
    /// Settings for a group, created atomically with defaults on first
    /// access (500.00 ₽, 8 trainings, generation day 25).
    pub async fn get_settings(
        pool: &PgPool,
        group_id: Uuid,
    ) -> Result<PaymentSettings, ServiceError> {
        let settings = sqlx::query_as::<_, PaymentSettings>(
            "INSERT INTO payment_settings (group_id)
             VALUES ($1)
             ON CONFLICT (group_id) DO UPDATE SET group_id = EXCLUDED.group_id
             RETURNING *",
        )
        .bind(group_id)
        .fetch_one(pool)
        .await?;
        Ok(settings)
    }

    /// Scheduled-session count for the child's group in the target month.
    /// Falls back to the group default when no session is in "scheduled"
    /// status — a month whose schedule was fully cancelled also falls back
    /// (same as an empty calendar, preserved source behavior).
    pub async fn count_trainings(
        pool: &PgPool,
        child: &Child,
        target_month: NaiveDate,
    ) -> Result<i32, ServiceError> {
        let group_id = require_group(child)?;
        let (month_start, month_end) = month_bounds(target_month);

        let scheduled: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM training_sessions
             WHERE group_id = $1 AND date BETWEEN $2 AND $3 AND status = 'scheduled'",
        )
        .bind(group_id)
        .bind(month_start)
        .bind(month_end)
        .fetch_one(pool)
        .await?;

        if scheduled > 0 {
            return Ok(scheduled as i32);
        }
        let settings = Self::get_settings(pool, group_id).await?;
        Ok(settings.default_trainings_per_month)
    }

    /// Trainings excused by confirmed medical certificates overlapping the
    /// month, prorated by calendar days.
    pub async fn confirmed_absences(
        pool: &PgPool,
        child: &Child,
        target_month: NaiveDate,
    ) -> Result<i32, ServiceError> {
        let (month_start, month_end) = month_bounds(target_month);

        let ranges: Vec<(NaiveDate, NaiveDate)> = sqlx::query_as(
            "SELECT date_from, date_to FROM medical_certificates
             WHERE child_id = $1 AND status = 'confirmed'
               AND date_from <= $2 AND date_to >= $3",
        )
        .bind(child.id)
        .bind(month_end)
        .bind(month_start)
        .fetch_all(pool)
        .await?;

        let total_absence_days = absence_days_in_month(&ranges, month_start, month_end);
        let days_in_month = (month_end - month_start).num_days() + 1;
        let total_trainings = Self::count_trainings(pool, child, target_month).await?;

        Ok(prorate_missed_trainings(
            total_absence_days,
            days_in_month,
            total_trainings,
        ))
    }

    /// Create or refresh the invoice for (child, month). The upsert resets
    /// status to pending and leaves paid_at untouched, so regenerating an
    /// already-paid month puts it back to pending (source behavior kept;
    /// see DESIGN.md).
    pub async fn generate_for_child(
        pool: &PgPool,
        media_dir: &str,
        child: &Child,
        target_month: NaiveDate,
    ) -> Result<PaymentInvoice, ServiceError> {
        let group_id = require_group(child)?;
        let (invoice_month, _) = month_bounds(target_month);

        let settings = Self::get_settings(pool, group_id).await?;
        let total_trainings = Self::count_trainings(pool, child, target_month).await?;
        let confirmed_absences = Self::confirmed_absences(pool, child, target_month).await?;
        let (billable, total_amount) =
            invoice_totals(total_trainings, confirmed_absences, settings.price_per_training);

        let due_date = Utc::now().date_naive() + chrono::Duration::days(10);

        let invoice = sqlx::query_as::<_, PaymentInvoice>(&format!(
            "INSERT INTO payment_invoices
                 (child_id, invoice_month, total_trainings, confirmed_absences,
                  billable_trainings, price_per_training, total_amount, due_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (child_id, invoice_month) DO UPDATE SET
                 total_trainings    = EXCLUDED.total_trainings,
                 confirmed_absences = EXCLUDED.confirmed_absences,
                 billable_trainings = EXCLUDED.billable_trainings,
                 price_per_training = EXCLUDED.price_per_training,
                 total_amount       = EXCLUDED.total_amount,
                 due_date           = EXCLUDED.due_date,
                 status             = 'pending',
                 generated_at       = NOW()
             RETURNING {INVOICE_COLS}"
        ))
        .bind(child.id)
        .bind(invoice_month)
        .bind(total_trainings)
        .bind(confirmed_absences)
        .bind(billable)
        .bind(settings.price_per_training)
        .bind(total_amount)
        .bind(due_date)
        .fetch_one(pool)
        .await?;

        // Payment QR is best-effort; a failed render must not fail billing.
        let invoice = match qr::write_invoice_qr(media_dir, &child.full_name, &invoice).await {
            Ok(qr_path) => {
                sqlx::query_as::<_, PaymentInvoice>(&format!(
                    "UPDATE payment_invoices SET qr_path = $1 WHERE id = $2
                     RETURNING {INVOICE_COLS}"
                ))
                .bind(&qr_path)
                .bind(invoice.id)
                .fetch_one(pool)
                .await?
            }
            Err(e) => {
                warn!("QR generation failed for invoice {}: {e}", invoice.id);
                invoice
            }
        };

        metrics::INVOICES_GENERATED.inc();
        Ok(invoice)
    }

    /// Generate invoices for every active child. One child failing is
    /// logged and skipped; the returned list holds only successes.
    pub async fn generate_for_month(
        pool: &PgPool,
        media_dir: &str,
        target_month: NaiveDate,
    ) -> Result<Vec<PaymentInvoice>, ServiceError> {
        let children = sqlx::query_as::<_, Child>(
            "SELECT * FROM children WHERE is_active = TRUE ORDER BY full_name",
        )
        .fetch_all(pool)
        .await?;

        let mut invoices = Vec::with_capacity(children.len());
        for child in &children {
            match Self::generate_for_child(pool, media_dir, child, target_month).await {
                Ok(invoice) => invoices.push(invoice),
                Err(e) => {
                    warn!("Ошибка при создании счета для {}: {e}", child.full_name);
                }
            }
        }
        Ok(invoices)
    }

    /// True when today's day-of-month is a generation day in any active
    /// group settings; polled by the daily scheduler.
    pub async fn should_generate_today(
        pool: &PgPool,
        today: NaiveDate,
    ) -> Result<bool, ServiceError> {
        let due: bool = sqlx::query_scalar(
            "SELECT EXISTS(
               SELECT 1 FROM payment_settings
               WHERE is_active = TRUE AND invoice_generation_day = $1
             )",
        )
        .bind(today.day() as i32)
        .fetch_one(pool)
        .await?;
        Ok(due)
    }

    /// Invoices visible to the caller, newest month first, each with its
    /// latest receipt summary. Parents only see their own children.
    pub async fn list_invoices(
        pool: &PgPool,
        user: &AuthenticatedUser,
        child_id: Option<Uuid>,
    ) -> Result<Vec<InvoiceWithReceipt>, ServiceError> {
        if user.role == UserRole::Parent {
            if let Some(child_id) = child_id {
                let linked: bool = sqlx::query_scalar(
                    "SELECT EXISTS(
                       SELECT 1 FROM user_children WHERE user_id = $1 AND child_id = $2
                     )",
                )
                .bind(user.user_id)
                .bind(child_id)
                .fetch_one(pool)
                .await?;
                if !linked {
                    return Err(ServiceError::Forbidden("Доступ запрещен".into()));
                }
            }
        }

        let invoices = if user.role == UserRole::Parent {
            sqlx::query_as::<_, PaymentInvoice>(&format!(
                "SELECT i.id, i.child_id, i.invoice_month, i.total_trainings,
                        i.confirmed_absences, i.billable_trainings, i.price_per_training,
                        i.total_amount, i.status::TEXT AS status, i.due_date, i.qr_path,
                        i.generated_at, i.paid_at
                 FROM payment_invoices i
                 JOIN user_children uc ON uc.child_id = i.child_id
                 WHERE uc.user_id = $1 AND ($2::UUID IS NULL OR i.child_id = $2)
                 ORDER BY i.invoice_month DESC"
            ))
            .bind(user.user_id)
            .bind(child_id)
            .fetch_all(pool)
            .await?
        } else {
            sqlx::query_as::<_, PaymentInvoice>(&format!(
                "SELECT {INVOICE_COLS} FROM payment_invoices
                 WHERE ($1::UUID IS NULL OR child_id = $1)
                 ORDER BY invoice_month DESC"
            ))
            .bind(child_id)
            .fetch_all(pool)
            .await?
        };

        let mut result = Vec::with_capacity(invoices.len());
        for invoice in invoices {
            let latest_receipt: Option<ReceiptSummary> = sqlx::query_as::<
                _,
                (Uuid, String, Option<Decimal>, Option<bool>, chrono::DateTime<Utc>),
            >(
                "SELECT id, status::TEXT, parsed_amount, amount_match, created_at
                 FROM payment_receipts
                 WHERE invoice_id = $1
                 ORDER BY created_at DESC
                 LIMIT 1",
            )
            .bind(invoice.id)
            .fetch_optional(pool)
            .await?
            .map(|(id, status, parsed_amount, amount_match, created_at)| ReceiptSummary {
                id,
                status,
                parsed_amount,
                amount_match,
                created_at,
            });

            result.push(InvoiceWithReceipt {
                invoice,
                latest_receipt,
            });
        }
        Ok(result)
    }

    pub async fn list_settings(pool: &PgPool) -> Result<Vec<PaymentSettings>, ServiceError> {
        let settings = sqlx::query_as::<_, PaymentSettings>(
            "SELECT s.* FROM payment_settings s
             JOIN groups g ON g.id = s.group_id
             ORDER BY g.kindergarten_number, g.name",
        )
        .fetch_all(pool)
        .await?;
        Ok(settings)
    }

    pub async fn update_settings(
        pool: &PgPool,
        id: Uuid,
        req: &UpdatePaymentSettingsRequest,
    ) -> Result<PaymentSettings, ServiceError> {
        if let Some(day) = req.invoice_generation_day {
            if !(1..=31).contains(&day) {
                return Err(ServiceError::Validation(
                    "День генерации счетов должен быть от 1 до 31".into(),
                ));
            }
        }
        if let Some(price) = req.price_per_training {
            if price < Decimal::ZERO {
                return Err(ServiceError::Validation(
                    "Стоимость тренировки не может быть отрицательной".into(),
                ));
            }
        }
        if let Some(n) = req.default_trainings_per_month {
            if n < 0 {
                return Err(ServiceError::Validation(
                    "Количество тренировок не может быть отрицательным".into(),
                ));
            }
        }

        let settings = sqlx::query_as::<_, PaymentSettings>(
            "UPDATE payment_settings
             SET price_per_training          = COALESCE($1, price_per_training),
                 default_trainings_per_month = COALESCE($2, default_trainings_per_month),
                 invoice_generation_day      = COALESCE($3, invoice_generation_day),
                 is_active                   = COALESCE($4, is_active),
                 updated_at                  = NOW()
             WHERE id = $5
             RETURNING *",
        )
        .bind(req.price_per_training)
        .bind(req.default_trainings_per_month)
        .bind(req.invoice_generation_day)
        .bind(req.is_active)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Настройки оплаты не найдены".into()))?;
        Ok(settings)
    }
}

fn require_group(child: &Child) -> Result<Uuid, ServiceError> {
    child.group_id.ok_or_else(|| {
        ServiceError::Validation(format!("У ребенка {} не указана группа", child.full_name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_bounds_regular_and_leap() {
        assert_eq!(month_bounds(d(2024, 3, 15)), (d(2024, 3, 1), d(2024, 3, 31)));
        assert_eq!(month_bounds(d(2024, 2, 1)), (d(2024, 2, 1), d(2024, 2, 29)));
        assert_eq!(month_bounds(d(2023, 2, 28)), (d(2023, 2, 1), d(2023, 2, 28)));
        assert_eq!(month_bounds(d(2024, 12, 31)), (d(2024, 12, 1), d(2024, 12, 31)));
    }

    #[test]
    fn next_month_rolls_over_year() {
        assert_eq!(next_month(d(2024, 11, 25)), d(2024, 12, 1));
        assert_eq!(next_month(d(2024, 12, 25)), d(2025, 1, 1));
    }

    #[test]
    fn parse_month_formats() {
        assert_eq!(parse_month("2024-03"), Some(d(2024, 3, 1)));
        assert_eq!(parse_month("2024-13"), None);
        assert_eq!(parse_month("март"), None);
    }

    #[test]
    fn absence_days_clamped_to_month() {
        let (start, end) = month_bounds(d(2024, 3, 1));
        // Certificate spills into both neighbours; only March days count.
        let ranges = [(d(2024, 2, 20), d(2024, 4, 5))];
        assert_eq!(absence_days_in_month(&ranges, start, end), 31);
    }

    #[test]
    fn overlapping_certificates_sum_independently() {
        let (start, end) = month_bounds(d(2024, 3, 1));
        let ranges = [(d(2024, 3, 1), d(2024, 3, 10)), (d(2024, 3, 5), d(2024, 3, 10))];
        // 10 + 6 — double-covered days are not deduplicated.
        assert_eq!(absence_days_in_month(&ranges, start, end), 16);
    }

    #[test]
    fn disjoint_range_counts_zero() {
        let (start, end) = month_bounds(d(2024, 3, 1));
        let ranges = [(d(2024, 4, 1), d(2024, 4, 10))];
        assert_eq!(absence_days_in_month(&ranges, start, end), 0);
    }

    #[test]
    fn ten_sick_days_of_march_excuse_two_trainings() {
        // 10 certified days out of March's 31, 8 trainings → floor(10/31*8) = 2.
        assert_eq!(prorate_missed_trainings(10, 31, 8), 2);
    }

    #[test]
    fn proration_is_clamped_and_nonnegative() {
        assert_eq!(prorate_missed_trainings(0, 31, 8), 0);
        assert_eq!(prorate_missed_trainings(31, 31, 8), 8);
        // Double-counted overlaps can exceed the month; the clamp holds.
        assert_eq!(prorate_missed_trainings(62, 31, 8), 8);
        assert_eq!(prorate_missed_trainings(5, 0, 8), 0);
    }

    #[test]
    fn proration_truncates_toward_zero() {
        // 15/31 * 8 = 3.87… → 3, never rounded up.
        assert_eq!(prorate_missed_trainings(15, 31, 8), 3);
    }

    #[test]
    fn invoice_totals_billing_equation() {
        let price = Decimal::from_str("500.00").unwrap();
        let (billable, amount) = invoice_totals(8, 2, price);
        assert_eq!(billable, 6);
        assert_eq!(amount, Decimal::from_str("3000.00").unwrap());

        let (billable, amount) = invoice_totals(8, 0, price);
        assert_eq!(billable, 8);
        assert_eq!(amount, Decimal::from_str("4000.00").unwrap());

        // Fully excused month bills zero.
        let (billable, amount) = invoice_totals(8, 8, price);
        assert_eq!(billable, 0);
        assert_eq!(amount, Decimal::ZERO);
    }

    #[test]
    fn invoice_totals_keeps_two_decimal_places() {
        let price = Decimal::from_str("512.55").unwrap();
        let (_, amount) = invoice_totals(7, 0, price);
        assert_eq!(amount, Decimal::from_str("3587.85").unwrap());
    }
}
