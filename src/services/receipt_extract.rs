//! Receipt file → raw text. PDFs go through pdf-extract; image formats have
//! no OCR backend in this deployment and yield empty text, leaving the
//! receipt pending for manual review.

use std::path::Path;

pub fn extract_text_from_receipt_file(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("pdf") => pdf_extract::extract_text(path).unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn image_files_yield_empty_text() {
        assert_eq!(
            extract_text_from_receipt_file(&PathBuf::from("/tmp/receipt.jpg")),
            ""
        );
        assert_eq!(
            extract_text_from_receipt_file(&PathBuf::from("/tmp/receipt.PNG")),
            ""
        );
    }

    #[test]
    fn unreadable_pdf_degrades_to_empty() {
        assert_eq!(
            extract_text_from_receipt_file(&PathBuf::from("/nonexistent/receipt.pdf")),
            ""
        );
    }

    #[test]
    fn unknown_extension_yields_empty_text() {
        assert_eq!(
            extract_text_from_receipt_file(&PathBuf::from("/tmp/receipt.docx")),
            ""
        );
    }
}
