use lazy_static::lazy_static;
use prometheus::{register_counter, register_int_gauge, Counter, IntGauge};
use sqlx::PgPool;
use tracing::warn;

lazy_static! {
    // ── Event counters ──────────────────────────────────────────────────────
    pub static ref INVOICES_GENERATED: Counter = register_counter!(
        "billing_invoices_generated_total",
        "Счета, созданные или обновленные генератором"
    )
    .unwrap();

    pub static ref RECEIPTS_UPLOADED: Counter = register_counter!(
        "billing_receipts_uploaded_total",
        "Загруженные чеки об оплате"
    )
    .unwrap();

    pub static ref RECEIPTS_PARSED: Counter = register_counter!(
        "billing_receipts_parsed_total",
        "Чеки, из которых удалось извлечь сумму"
    )
    .unwrap();

    // ── Business gauges ─────────────────────────────────────────────────────
    pub static ref ACTIVE_CHILDREN_GAUGE: IntGauge = register_int_gauge!(
        "club_children_active_total",
        "Активные дети"
    )
    .unwrap();

    pub static ref PENDING_INVOICES_GAUGE: IntGauge = register_int_gauge!(
        "billing_invoices_pending_total",
        "Неоплаченные счета"
    )
    .unwrap();

    pub static ref PENDING_RECEIPTS_GAUGE: IntGauge = register_int_gauge!(
        "billing_receipts_pending_total",
        "Чеки, ожидающие проверки"
    )
    .unwrap();
}

/// Spawn the background gauge collector (refreshes every 5 minutes).
pub fn start(pool: PgPool) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = refresh(&pool).await {
                warn!("Metrics collector: refresh failed: {e}");
            }
            tokio::time::sleep(tokio::time::Duration::from_secs(300)).await;
        }
    });
}

async fn refresh(pool: &PgPool) -> anyhow::Result<()> {
    let children: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM children WHERE is_active = TRUE")
            .fetch_one(pool)
            .await?;
    ACTIVE_CHILDREN_GAUGE.set(children);

    let invoices: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM payment_invoices WHERE status = 'pending'")
            .fetch_one(pool)
            .await?;
    PENDING_INVOICES_GAUGE.set(invoices);

    let receipts: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM payment_receipts WHERE status = 'pending'")
            .fetch_one(pool)
            .await?;
    PENDING_RECEIPTS_GAUGE.set(receipts);

    Ok(())
}
