use regex::Regex;
use std::sync::LazyLock;

/// File types the pipeline accepts, with their MIME names.
pub const SUPPORTED_FILE_TYPES: &'static [(&'static str, &'static str)] = &[
    ("pdf", "application/pdf"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
];

pub const VALID_IMAGE_TYPES: &'static [&'static str] = &["jpg", "jpeg", "png", "gif"];

pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 100 * 1024 * 1024;

/// `<base>.<ext>`, both sides restricted to filesystem-safe characters.
pub static FILE_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+\.[A-Za-z0-9]+$").expect("invalid file name pattern"));

/// Look up the MIME name for a (lower-cased) file type.
pub fn mime_type_for(file_type: &str) -> Option<&'static str> {
    SUPPORTED_FILE_TYPES
        .iter()
        .find(|(ext, _)| *ext == file_type)
        .map(|(_, mime)| *mime)
}

pub fn is_supported_type(file_type: &str) -> bool {
    mime_type_for(file_type).is_some()
}

pub fn is_image_type(file_type: &str) -> bool {
    VALID_IMAGE_TYPES.contains(&file_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_table_covers_supported_types() {
        assert_eq!(mime_type_for("pdf"), Some("application/pdf"));
        assert_eq!(mime_type_for("jpeg"), Some("image/jpeg"));
        assert_eq!(mime_type_for("xyz"), None);
    }

    #[test]
    fn file_name_pattern_accepts_simple_names() {
        assert!(FILE_NAME_PATTERN.is_match("report_v2.pdf"));
        assert!(FILE_NAME_PATTERN.is_match("a.b"));
        assert!(!FILE_NAME_PATTERN.is_match("noextension"));
        assert!(!FILE_NAME_PATTERN.is_match("bad name.png"));
        assert!(!FILE_NAME_PATTERN.is_match(""));
    }
}
