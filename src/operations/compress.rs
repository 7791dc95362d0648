use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use super::error::{OpError, OpResult};
use crate::models::FileEntry;

/// GZIP the file content into a fresh temporary directory.
///
/// Output lands at `<tempdir>/<name>.gz`; the directory is kept so the caller
/// can hand the path on. Filesystem problems surface as [`OpError::Io`].
pub fn compress(file: &FileEntry) -> OpResult<PathBuf> {
    let temp_dir = tempfile::Builder::new()
        .prefix("compressed_files")
        .tempdir()
        .map_err(|err| {
            OpError::io(
                format!("Failed to create temp directory for {}", file.name()),
                err,
            )
        })?
        .into_path();

    let output_path = temp_dir.join(format!("{}.gz", file.name()));
    let output = File::create(&output_path).map_err(|err| {
        OpError::io(
            format!("Failed to create {}", output_path.display()),
            err,
        )
    })?;

    let mut encoder = GzEncoder::new(output, Compression::default());
    encoder.write_all(file.content()).map_err(|err| {
        OpError::io(format!("Failed to compress {}", file.name()), err)
    })?;
    encoder.finish().map_err(|err| {
        OpError::io(format!("Failed to finish compressing {}", file.name()), err)
    })?;

    debug!("Compressed {} to {}", file.name(), output_path.display());
    Ok(output_path)
}
