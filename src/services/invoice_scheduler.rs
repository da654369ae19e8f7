use chrono::{Local, Timelike};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::services::billing::{next_month, BillingService};

/// Spawn a background task that wakes up daily at 9:00 AM and generates next
/// month's invoices when today is a configured generation day. Redis keys
/// (TTL 2 days) prevent a duplicate batch if the server restarts the same
/// day. The admin endpoint and the generate-invoices CLI remain available as
/// manual triggers.
pub fn start(pool: PgPool, media_dir: String, redis: redis::Client) {
    tokio::spawn(async move {
        loop {
            // Sleep until next 9:00 AM
            let now = Local::now();
            let target_hour = 9u32;
            let secs_until_9am = {
                let secs_today = now.hour() * 3600 + now.minute() * 60 + now.second();
                let target_secs = target_hour * 3600;
                if secs_today < target_secs {
                    (target_secs - secs_today) as u64
                } else {
                    // Already past 9 AM today → wait until tomorrow 9 AM
                    (86400 - secs_today + target_secs) as u64
                }
            };
            tokio::time::sleep(tokio::time::Duration::from_secs(secs_until_9am)).await;

            let today = Local::now().date_naive();
            match BillingService::should_generate_today(&pool, today).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!("Invoice scheduler: settings check failed: {e}");
                    continue;
                }
            }

            let mut redis_conn = match redis.get_multiplexed_async_connection().await {
                Ok(c) => c,
                Err(e) => {
                    warn!("Invoice scheduler: Redis unavailable: {e}");
                    continue;
                }
            };

            // Redis dedup: skip if this day's batch already ran
            let redis_key = format!("invoices:generated:{}", today.format("%Y-%m-%d"));
            let already: bool = redis::cmd("EXISTS")
                .arg(&redis_key)
                .query_async(&mut redis_conn)
                .await
                .unwrap_or(false);
            if already {
                continue;
            }

            // Mark as run (TTL 2 days — covers restarts within the same day)
            let _: Result<(), _> = redis::cmd("SETEX")
                .arg(&redis_key)
                .arg(172_800u64) // 2 days
                .arg(1)
                .query_async(&mut redis_conn)
                .await;

            let target = next_month(today);
            match BillingService::generate_for_month(&pool, &media_dir, target).await {
                Ok(invoices) => info!(
                    "Invoice scheduler: generated {} invoices for {}",
                    invoices.len(),
                    target.format("%Y-%m")
                ),
                Err(e) => warn!("Invoice scheduler: batch generation failed: {e}"),
            }
        }
    });
}
