//! Wire DTOs and their conversions into internal models.
//!
//! Binary content crosses the JSON boundary base64-encoded; operation kinds
//! use their SCREAMING_SNAKE_CASE wire names with unknown values collapsing
//! to `UNKNOWN` instead of failing the whole request.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use std::collections::HashMap;

use crate::models::{FileEntry, FileUpload, OperationKind, ProcessingRequest};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDto {
    pub file_id: String,
    pub file_name: String,
    /// Base64-encoded bytes; absent means an empty file.
    #[serde(default)]
    pub content: String,
    pub file_type: String,
    pub size_bytes: u64,
}

impl FileDto {
    pub fn into_model(self) -> Result<FileEntry> {
        let content = BASE64
            .decode(self.content.as_bytes())
            .context(format!("Invalid base64 content for file {}", self.file_id))?;
        Ok(FileEntry::new(
            self.file_id,
            self.file_name,
            content,
            self.file_type,
            self.size_bytes,
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingRequestDto {
    pub files: Vec<FileDto>,
    #[serde(default)]
    pub default_operations: Vec<OperationKind>,
    #[serde(default)]
    pub per_file_operations: HashMap<String, Vec<OperationKind>>,
}

impl ProcessingRequestDto {
    pub fn into_model(self) -> Result<ProcessingRequest> {
        let files = self
            .files
            .into_iter()
            .map(FileDto::into_model)
            .collect::<Result<Vec<_>>>()?;
        ProcessingRequest::new(files, self.default_operations, self.per_file_operations)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadDto {
    pub file: FileDto,
    #[serde(default)]
    pub operations: Vec<OperationKind>,
}

impl FileUploadDto {
    pub fn into_model(self) -> Result<FileUpload> {
        Ok(FileUpload {
            file: self.file.into_model()?,
            operations: self.operations,
        })
    }
}

/// Collect a finished upload stream into one request: every file keeps its
/// own operation list via the per-file map.
pub fn request_from_uploads(uploads: Vec<FileUpload>) -> Result<ProcessingRequest> {
    let mut per_file = HashMap::new();
    let mut files = Vec::with_capacity(uploads.len());
    for upload in uploads {
        per_file.insert(upload.file.id().to_string(), upload.operations);
        files.push(upload.file);
    }
    ProcessingRequest::new(files, Vec::new(), per_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_content_is_base64_decoded() {
        let dto: FileDto = serde_json::from_str(
            r#"{"fileId":"f1","fileName":"a.png","content":"aGVsbG8=","fileType":"PNG","sizeBytes":5}"#,
        )
        .unwrap();
        let file = dto.into_model().unwrap();
        assert_eq!(file.content(), b"hello");
        assert_eq!(file.file_type(), "png");
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let dto: FileDto = serde_json::from_str(
            r#"{"fileId":"f1","fileName":"a.png","content":"%%%","fileType":"png","sizeBytes":5}"#,
        )
        .unwrap();
        assert!(dto.into_model().is_err());
    }

    #[test]
    fn request_dto_defaults_optional_collections() {
        let dto: ProcessingRequestDto = serde_json::from_str(
            r#"{"files":[{"fileId":"f1","fileName":"a.png","fileType":"png","sizeBytes":1}]}"#,
        )
        .unwrap();
        let request = dto.into_model().unwrap();
        assert!(request.default_operations().is_empty());
        assert!(request.per_file_operations().is_empty());
    }

    #[test]
    fn uploads_collect_into_a_per_file_request() {
        let uploads = vec![
            FileUpload {
                file: FileEntry::new("a", "a.png", vec![1], "png", 1),
                operations: vec![OperationKind::Validate],
            },
            FileUpload {
                file: FileEntry::new("b", "b.pdf", vec![2], "pdf", 1),
                operations: vec![OperationKind::MetadataExtraction, OperationKind::Storage],
            },
        ];
        let request = request_from_uploads(uploads).unwrap();
        assert_eq!(request.files().len(), 2);
        assert_eq!(request.operations_for("a"), &[OperationKind::Validate]);
        assert_eq!(
            request.operations_for("b"),
            &[OperationKind::MetadataExtraction, OperationKind::Storage]
        );
    }
}
