pub mod file;
pub mod operation;
pub mod request;
pub mod result;
pub mod summary;

pub use file::FileEntry;
pub use operation::{OperationKind, OperationSpec};
pub use request::{FileUpload, ProcessingRequest};
pub use result::{OperationOutcome, OperationStatus};
pub use summary::ProcessingSummary;
