//! Validation of uploaded exercise images

use thiserror::Error;

use super::generation::InlineImage;

/// Largest accepted upload
pub const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("Image is empty")]
    Empty,

    #[error("Image is {size} bytes; the limit is {MAX_IMAGE_BYTES} bytes")]
    TooLarge { size: usize },

    #[error("Unsupported image format; use PNG or JPEG")]
    UnsupportedFormat,
}

/// Resolve the MIME type of an upload.
///
/// A declared PNG/JPEG type wins; otherwise the file extension decides.
fn resolve_mime(declared: Option<&str>, file_name: Option<&str>) -> Option<&'static str> {
    match declared.map(|m| m.trim().to_ascii_lowercase()).as_deref() {
        Some("image/png") => return Some("image/png"),
        Some("image/jpeg") | Some("image/jpg") => return Some("image/jpeg"),
        _ => {}
    }

    let name = file_name?.to_ascii_lowercase();
    if name.ends_with(".png") {
        Some("image/png")
    } else if name.ends_with(".jpg") || name.ends_with(".jpeg") {
        Some("image/jpeg")
    } else {
        None
    }
}

/// Check an upload and turn it into inline provider content
pub fn prepare_upload(
    bytes: Vec<u8>,
    declared_mime: Option<&str>,
    file_name: Option<&str>,
) -> Result<InlineImage, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageError::TooLarge { size: bytes.len() });
    }

    let mime_type = resolve_mime(declared_mime, file_name).ok_or(ImageError::UnsupportedFormat)?;

    Ok(InlineImage {
        mime_type: mime_type.to_string(),
        data: bytes,
    })
}
