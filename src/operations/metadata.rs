use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::models::FileEntry;

/// Extract basic metadata from a file.
///
/// Never fails: content problems only suppress the image-specific keys.
/// Always present: `fileId`, `fileName`, `fileType`, `sizeBytes`, `mimeType`,
/// `checksum` (SHA-256 hex over the content). `width`/`height` are added when
/// the content decodes as an image, regardless of the declared type.
pub fn extract_metadata(file: &FileEntry) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("fileId".into(), file.id().into());
    metadata.insert("fileName".into(), file.name().into());
    metadata.insert("fileType".into(), file.file_type().into());
    metadata.insert("sizeBytes".into(), file.size().into());
    metadata.insert(
        "mimeType".into(),
        file.mime_type().unwrap_or("application/octet-stream").into(),
    );

    let checksum = Sha256::digest(file.content())
        .iter()
        .fold(String::with_capacity(64), |mut hex, byte| {
            use std::fmt::Write;
            let _ = write!(hex, "{:02x}", byte);
            hex
        });
    metadata.insert("checksum".into(), checksum.into());

    if let Ok(image) = image::load_from_memory(file.content()) {
        metadata.insert("width".into(), image.width().into());
        metadata.insert("height".into(), image.height().into());
    }

    metadata
}
