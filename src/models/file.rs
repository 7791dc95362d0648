use crate::common::{is_image_type, mime_type_for};

/// One file submitted for processing.
///
/// Immutable after construction; the content buffer is owned and only handed
/// out by reference, and the declared type is normalized to lower case. The
/// declared `size` comes from the client and is deliberately independent of
/// `content.len()` (the validator cross-checks presence, not exact length).
#[derive(Debug, Clone)]
pub struct FileEntry {
    id: String,
    name: String,
    content: Vec<u8>,
    file_type: String,
    size: u64,
}

impl FileEntry {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        content: Vec<u8>,
        file_type: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content,
            file_type: file_type.into().to_lowercase(),
            size,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Lower-cased declared type, e.g. `png` or `pdf`.
    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    /// Declared size in bytes, as reported by the client.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_image(&self) -> bool {
        is_image_type(&self.file_type)
    }

    pub fn is_pdf(&self) -> bool {
        self.file_type == "pdf"
    }

    pub fn mime_type(&self) -> Option<&'static str> {
        mime_type_for(&self.file_type)
    }
}
