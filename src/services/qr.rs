use std::path::PathBuf;

use qrcode::render::svg;
use qrcode::QrCode;

use crate::models::payment::PaymentInvoice;

/// Render the payment QR for an invoice as SVG under MEDIA_DIR/payment_qr/.
/// Returns the path relative to MEDIA_DIR.
pub async fn write_invoice_qr(
    media_dir: &str,
    child_name: &str,
    invoice: &PaymentInvoice,
) -> anyhow::Result<String> {
    let dir = PathBuf::from(media_dir).join("payment_qr");
    tokio::fs::create_dir_all(&dir).await?;

    let payload = format!(
        "Оплата тренировок: {child_name}, {} — {} руб.",
        invoice.invoice_month.format("%Y-%m"),
        invoice.total_amount
    );
    let code = QrCode::new(payload.as_bytes())?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(240, 240)
        .build();

    let filename = format!("{}.svg", invoice.id);
    tokio::fs::write(dir.join(&filename), image).await?;
    Ok(format!("payment_qr/{filename}"))
}
