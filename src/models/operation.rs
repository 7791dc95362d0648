use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_RESIZE_MAX_WIDTH: i64 = 800;
pub const DEFAULT_RESIZE_MAX_HEIGHT: i64 = 600;
pub const DEFAULT_CONVERSION_FORMAT: &str = "jpg";

/// The transformations the pipeline supports.
///
/// `Unknown` is the fallback for malformed wire values; the executor treats it
/// as log-and-skip rather than rejecting the whole request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Validate,
    MetadataExtraction,
    OcrTextExtraction,
    ImageResize,
    FileCompression,
    FormatConversion,
    Storage,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Validate => "VALIDATE",
            OperationKind::MetadataExtraction => "METADATA_EXTRACTION",
            OperationKind::OcrTextExtraction => "OCR_TEXT_EXTRACTION",
            OperationKind::ImageResize => "IMAGE_RESIZE",
            OperationKind::FileCompression => "FILE_COMPRESSION",
            OperationKind::FormatConversion => "FORMAT_CONVERSION",
            OperationKind::Storage => "STORAGE",
            OperationKind::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// An operation kind plus its (optional) parameters.
///
/// Parameters are an opaque JSON map; accessors fall back to the caller's
/// default so the dispatcher never has to care whether a value was supplied.
#[derive(Debug, Clone)]
pub struct OperationSpec {
    kind: OperationKind,
    parameters: Map<String, Value>,
}

impl OperationSpec {
    pub fn new(kind: OperationKind, parameters: Map<String, Value>) -> Self {
        Self { kind, parameters }
    }

    /// Build a spec carrying the executor's default parameters for `kind`.
    pub fn with_defaults(kind: OperationKind) -> Self {
        let mut parameters = Map::new();
        match kind {
            OperationKind::ImageResize => {
                parameters.insert("maxWidth".into(), DEFAULT_RESIZE_MAX_WIDTH.into());
                parameters.insert("maxHeight".into(), DEFAULT_RESIZE_MAX_HEIGHT.into());
            }
            OperationKind::FormatConversion => {
                parameters.insert("targetFormat".into(), DEFAULT_CONVERSION_FORMAT.into());
            }
            _ => {}
        }
        Self { kind, parameters }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn int_param(&self, key: &str, default: i64) -> i64 {
        self.parameters
            .get(key)
            .and_then(Value::as_i64)
            .unwrap_or(default)
    }

    pub fn str_param<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.parameters
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
    }
}
