use anyhow::{bail, Result};
use std::collections::HashMap;

use super::file::FileEntry;
use super::operation::OperationKind;

/// One processing request: the files plus the operations to run on them.
///
/// Read-only after construction. A file with an entry in
/// `per_file_operations` uses that list; everything else falls back to
/// `default_operations`. An empty effective list means the file contributes
/// no tasks at all.
#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    files: Vec<FileEntry>,
    default_operations: Vec<OperationKind>,
    per_file_operations: HashMap<String, Vec<OperationKind>>,
}

impl ProcessingRequest {
    pub fn new(
        files: Vec<FileEntry>,
        default_operations: Vec<OperationKind>,
        per_file_operations: HashMap<String, Vec<OperationKind>>,
    ) -> Result<Self> {
        if files.is_empty() {
            bail!("request must contain at least one file");
        }
        Ok(Self {
            files,
            default_operations,
            per_file_operations,
        })
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn default_operations(&self) -> &[OperationKind] {
        &self.default_operations
    }

    pub fn per_file_operations(&self) -> &HashMap<String, Vec<OperationKind>> {
        &self.per_file_operations
    }

    /// The operation list effective for `file_id`.
    pub fn operations_for(&self, file_id: &str) -> &[OperationKind] {
        self.per_file_operations
            .get(file_id)
            .map(Vec::as_slice)
            .unwrap_or(&self.default_operations)
    }
}

/// One element of a client-side upload stream: a file plus the operations
/// requested for it.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file: FileEntry,
    pub operations: Vec<OperationKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str) -> FileEntry {
        FileEntry::new(id, format!("{id}.png"), vec![0u8; 4], "png", 4)
    }

    #[test]
    fn rejects_empty_file_list() {
        assert!(ProcessingRequest::new(Vec::new(), Vec::new(), HashMap::new()).is_err());
    }

    #[test]
    fn per_file_operations_override_defaults() {
        let mut per_file = HashMap::new();
        per_file.insert("a".to_string(), vec![OperationKind::Storage]);
        let request = ProcessingRequest::new(
            vec![file("a"), file("b")],
            vec![OperationKind::Validate],
            per_file,
        )
        .unwrap();

        assert_eq!(request.operations_for("a"), &[OperationKind::Storage]);
        assert_eq!(request.operations_for("b"), &[OperationKind::Validate]);
    }
}
