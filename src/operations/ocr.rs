use log::debug;

use super::error::{OpError, OpResult};
use crate::models::FileEntry;

/// Placeholder OCR pass.
///
/// Real text recognition is not wired up; the fixed string keeps the contract
/// stable for callers that already depend on it.
pub fn perform_ocr(file: &FileEntry) -> OpResult<&'static str> {
    if !file.is_image() && !file.is_pdf() {
        return Err(OpError::unsupported(format!(
            "OCR not supported for type {}",
            file.file_type()
        )));
    }
    debug!("Performing OCR on {}", file.name());
    Ok("OCR text would be returned here")
}
