/// Generate next month's payment invoices for all active children.
/// Run daily (e.g., via cron job: 0 9 * * * /app/generate-invoices)
///
/// Usage: generate-invoices [--force] [--target-month YYYY-MM]
///   --force        : Generate regardless of the configured generation day
///   --target-month : Month to bill (defaults to next calendar month)

use chrono::Utc;
use clap::Parser;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;

use sportclub_api::services::billing::{next_month, parse_month, BillingService};

#[derive(Parser)]
#[command(name = "generate-invoices", about = "Generate monthly payment invoices")]
struct Args {
    /// Generate even when today is not a configured generation day
    #[arg(long)]
    force: bool,

    /// Month to bill in YYYY-MM format (defaults to next calendar month)
    #[arg(long)]
    target_month: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL environment variable not set");
    let media_dir = std::env::var("MEDIA_DIR").unwrap_or_else(|_| "/data/media".into());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let today = Utc::now().date_naive();

    if !args.force && !BillingService::should_generate_today(&pool, today).await? {
        tracing::warn!(
            "Сегодня ({today}) не день генерации счетов. Используйте --force для принудительной генерации."
        );
        return Ok(());
    }

    let target_month = match args.target_month.as_deref() {
        Some(m) => parse_month(m)
            .ok_or("Неверный формат месяца. Используйте YYYY-MM (например, 2024-03)")?,
        None => next_month(today),
    };

    tracing::info!("Генерация счетов на {}...", target_month.format("%Y-%m"));

    let invoices = BillingService::generate_for_month(&pool, &media_dir, target_month).await?;

    if invoices.is_empty() {
        tracing::warn!("Не было создано ни одного счета");
        return Ok(());
    }

    let total_amount: Decimal = invoices.iter().map(|i| i.total_amount).sum();
    tracing::info!(
        "Успешно сгенерировано {} счетов на {}, общая сумма: {} ₽",
        invoices.len(),
        target_month.format("%Y-%m"),
        total_amount
    );

    Ok(())
}
