//! PDF validation and text extraction.
//!
//! Upload bytes are checked before they reach the parser: the filename must
//! end in `.pdf`, the content must start with the `%PDF` magic, and the size
//! must stay under the configured limit. Extraction never panics; failures
//! come back as [`ExtractError`] and the upload is rejected.

pub const MIME_PDF: &str = "application/pdf";

const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("not a PDF file: {0}")]
    NotPdf(String),
    #[error("file too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("no extractable text in {0}")]
    NoText(String),
}

/// Reject anything that is not a plausibly valid PDF within `max_bytes`.
pub fn validate_pdf(filename: &str, bytes: &[u8], max_bytes: usize) -> Result<(), ExtractError> {
    if !filename.to_ascii_lowercase().ends_with(".pdf") {
        return Err(ExtractError::NotPdf(filename.to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(ExtractError::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(ExtractError::NotPdf(filename.to_string()));
    }
    Ok(())
}

/// Extract plain UTF-8 text from PDF bytes, pages in order.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_extension() {
        let err = validate_pdf("notes.txt", b"%PDF-1.4", 1024).unwrap_err();
        assert!(matches!(err, ExtractError::NotPdf(_)));
    }

    #[test]
    fn rejects_missing_magic() {
        let err = validate_pdf("fake.pdf", b"hello", 1024).unwrap_err();
        assert!(matches!(err, ExtractError::NotPdf(_)));
    }

    #[test]
    fn rejects_oversized_upload() {
        let bytes = vec![b'%'; 2048];
        let err = validate_pdf("big.PDF", &bytes, 1024).unwrap_err();
        assert!(matches!(err, ExtractError::TooLarge { size: 2048, limit: 1024 }));
    }

    #[test]
    fn accepts_uppercase_extension() {
        assert!(validate_pdf("REPORT.PDF", b"%PDF-1.7\n", 1024).is_ok());
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_pdf_text(b"%PDF-1.4 but nothing else").unwrap_err();
        assert!(err.to_string().contains("PDF"));
    }
}
