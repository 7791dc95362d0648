use image::{imageops::FilterType, DynamicImage, ImageFormat};
use log::debug;
use std::io::Cursor;
use uuid::Uuid;

use super::error::{OpError, OpResult};
use crate::models::FileEntry;

/// Scale an image down to fit inside `max_width` × `max_height`, preserving
/// aspect ratio. The result is a fresh [`FileEntry`] with the same type, a
/// generated id and the name prefixed `resized_`. Images that already fit are
/// re-encoded unchanged in size: the output never exceeds the input
/// dimensions.
pub fn resize_image(file: &FileEntry, max_width: i64, max_height: i64) -> OpResult<FileEntry> {
    if !file.is_image() {
        return Err(OpError::unsupported(format!(
            "Resize only supported for images: {}",
            file.name()
        )));
    }
    if max_width <= 0 || max_height <= 0 {
        return Err(OpError::invalid(format!(
            "Resize bounds must be positive: {}x{}",
            max_width, max_height
        )));
    }
    if max_width >= i32::MAX as i64 || max_height >= i32::MAX as i64 {
        return Err(OpError::invalid(format!(
            "Resize bounds out of range: {}x{}",
            max_width, max_height
        )));
    }

    let image = image::load_from_memory(file.content()).map_err(|_| {
        OpError::invalid(format!(
            "Content is not a decodable image: {}",
            file.name()
        ))
    })?;

    let (width, height) = (image.width(), image.height());
    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    )
    .min(1.0);
    let new_width = ((width as f64 * scale).floor() as u32).max(1);
    let new_height = ((height as f64 * scale).floor() as u32).max(1);

    // CatmullRom is the bicubic filter; quality matters more than speed here.
    let resized = image.resize_exact(new_width, new_height, FilterType::CatmullRom);
    let content = encode_image(&resized, file.file_type())?;

    debug!(
        "Resized {} from {}x{} to {}x{}",
        file.name(),
        width,
        height,
        new_width,
        new_height
    );

    let size = content.len() as u64;
    Ok(FileEntry::new(
        Uuid::new_v4().to_string(),
        format!("resized_{}", file.name()),
        content,
        file.file_type(),
        size,
    ))
}

/// Re-encode an image into `target_format`.
///
/// The result is a fresh [`FileEntry`] whose name has its extension replaced,
/// whose type is the target format, and whose dimensions match the input.
pub fn convert_format(file: &FileEntry, target_format: &str) -> OpResult<FileEntry> {
    if target_format.is_empty() {
        return Err(OpError::unsupported(format!(
            "No target format given for {}",
            file.name()
        )));
    }
    if !file.is_image() {
        return Err(OpError::unsupported(format!(
            "Format conversion only supported for images: {}",
            file.name()
        )));
    }

    let target = target_format.to_lowercase();
    let image = image::load_from_memory(file.content()).map_err(|_| {
        OpError::invalid(format!(
            "Content is not a decodable image: {}",
            file.name()
        ))
    })?;

    let content = encode_image(&image, &target)?;
    let name = match file.name().rsplit_once('.') {
        Some((stem, _)) => format!("{stem}.{target}"),
        None => format!("{}.{}", file.name(), target),
    };

    debug!("Converted {} to {}", file.name(), target);

    let size = content.len() as u64;
    Ok(FileEntry::new(
        Uuid::new_v4().to_string(),
        name,
        content,
        target,
        size,
    ))
}

/// Encode into the format named by `file_type`, or fail `Unsupported` when the
/// encoder rejects it. JPEG has no alpha channel, so those targets are
/// flattened to RGB first.
fn encode_image(image: &DynamicImage, file_type: &str) -> OpResult<Vec<u8>> {
    let format = ImageFormat::from_extension(file_type).ok_or_else(|| {
        OpError::unsupported(format!("Unsupported image format: {}", file_type))
    })?;

    let mut buffer = Cursor::new(Vec::new());
    let encoded = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut buffer, format),
        _ => image.write_to(&mut buffer, format),
    };
    encoded.map_err(|err| {
        OpError::unsupported(format!("Encoder rejected format {}: {}", file_type, err))
    })?;

    Ok(buffer.into_inner())
}
