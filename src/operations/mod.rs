//! Pure file transforms and validators.
//!
//! Everything in here is byte-in/byte-out over a [`FileEntry`]: no scheduling
//! awareness, no shared state beyond the storage lock and the static MIME
//! table. That keeps the worker pool agnostic to what work is being done and
//! lets each contract be tested in isolation.
//!
//! [`FileEntry`]: crate::models::FileEntry

pub mod compress;
pub mod error;
pub mod metadata;
pub mod ocr;
pub mod store;
pub mod transform;
pub mod validate;

pub use compress::compress;
pub use error::{OpError, OpResult};
pub use metadata::extract_metadata;
pub use ocr::perform_ocr;
pub use store::store;
pub use transform::{convert_format, resize_image};
pub use validate::validate;
