use log::debug;

use super::error::{OpError, OpResult};
use crate::common::{is_supported_type, FILE_NAME_PATTERN};
use crate::models::FileEntry;

/// Check a file against the intake rules.
///
/// Succeeds silently; every rejection is an [`OpError::InvalidArgument`] with
/// a reason the client can act on. The declared size is checked as declared
/// (it is not cross-checked against the content length), while image content
/// is cross-checked by actually decoding it.
pub fn validate(file: &FileEntry, max_size_bytes: u64) -> OpResult<()> {
    if file.name().is_empty() {
        return Err(OpError::invalid("File name is missing"));
    }
    if file.file_type().is_empty() {
        return Err(OpError::invalid(format!(
            "File type is missing: {}",
            file.name()
        )));
    }
    if file.size() == 0 {
        return Err(OpError::invalid(format!("File is empty: {}", file.name())));
    }
    if file.size() > max_size_bytes {
        return Err(OpError::invalid(format!(
            "File exceeds the maximum size of {} bytes: {} ({} bytes)",
            max_size_bytes,
            file.name(),
            file.size()
        )));
    }
    if file.name().contains("..") || file.name().contains('/') {
        return Err(OpError::invalid(format!(
            "Invalid file name: {}",
            file.name()
        )));
    }
    if !FILE_NAME_PATTERN.is_match(file.name()) {
        return Err(OpError::invalid(format!(
            "Invalid file name: {}",
            file.name()
        )));
    }
    if !is_supported_type(file.file_type()) {
        return Err(OpError::invalid(format!(
            "Unsupported file type: {}",
            file.file_type()
        )));
    }
    if file.is_image() && image::load_from_memory(file.content()).is_err() {
        return Err(OpError::invalid(format!(
            "Content is not a decodable {} image: {}",
            file.file_type(),
            file.name()
        )));
    }

    debug!("Validated file {} ({} bytes)", file.name(), file.size());
    Ok(())
}
