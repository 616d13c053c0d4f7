//! Request image handling: base64 and URL sources, size limits, decoding.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unsupported or corrupt image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: usize },
    #[error("failed to fetch image_url: {0}")]
    Fetch(String),
    #[error("image decoder task failed")]
    Join,
}

/// Where a request's image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Inline(String),
    Url(String),
}

impl ImageSource {
    /// Exactly one of the two sources must be present; empty strings count
    /// as absent. Returns `None` for both-or-neither.
    pub fn exactly_one(image: Option<String>, image_url: Option<String>) -> Option<Self> {
        let image = image.filter(|s| !s.is_empty());
        let image_url = image_url.filter(|s| !s.is_empty());
        match (image, image_url) {
            (Some(data), None) => Some(Self::Inline(data)),
            (None, Some(url)) => Some(Self::Url(url)),
            _ => None,
        }
    }
}

/// Decode base64 payload bytes, rejecting oversize payloads before decoding.
///
/// The size check uses the 3/4 estimate of the encoded length.
pub fn decode_base64(data: &str, max_bytes: usize) -> Result<Vec<u8>, ImageError> {
    let data = data.trim();
    let estimated = data.len() * 3 / 4;
    if estimated > max_bytes {
        return Err(ImageError::TooLarge {
            size: estimated,
            max: max_bytes,
        });
    }
    Ok(BASE64.decode(data)?)
}

/// Decode an encoded image (JPEG, PNG, ...) into 8-bit RGB.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// [`decode_rgb`] on the blocking pool.
pub async fn decode_rgb_blocking(bytes: Vec<u8>) -> Result<RgbImage, ImageError> {
    tokio::task::spawn_blocking(move || decode_rgb(&bytes))
        .await
        .map_err(|_| ImageError::Join)?
}

/// Fetch an image over HTTP, following redirects, under `max_bytes`.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    max_bytes: usize,
) -> Result<Vec<u8>, ImageError> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| ImageError::Fetch(e.to_string()))?;

    if let Some(len) = response.content_length() {
        let len = len as usize;
        if len > max_bytes {
            return Err(ImageError::TooLarge { size: len, max: max_bytes });
        }
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ImageError::Fetch(e.to_string()))?;
    if body.len() > max_bytes {
        return Err(ImageError::TooLarge {
            size: body.len(),
            max: max_bytes,
        });
    }
    tracing::debug!(url, bytes = body.len(), "fetched image");
    Ok(body.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 20, 30]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_source_requires_exactly_one() {
        let some = |s: &str| Some(s.to_string());
        assert_eq!(
            ImageSource::exactly_one(some("aGk="), None),
            Some(ImageSource::Inline("aGk=".into()))
        );
        assert_eq!(
            ImageSource::exactly_one(None, some("http://x/y.jpg")),
            Some(ImageSource::Url("http://x/y.jpg".into()))
        );
        assert_eq!(ImageSource::exactly_one(some("aGk="), some("http://x")), None);
        assert_eq!(ImageSource::exactly_one(None, None), None);
        assert_eq!(ImageSource::exactly_one(some(""), some("")), None);
        assert_eq!(
            ImageSource::exactly_one(some(""), some("http://x")),
            Some(ImageSource::Url("http://x".into()))
        );
    }

    #[test]
    fn test_base64_size_estimate() {
        // 8 chars encode 6 bytes.
        assert!(decode_base64("aGVsbG8h", 6).is_ok());
        assert!(matches!(
            decode_base64("aGVsbG8h", 5),
            Err(ImageError::TooLarge { size: 6, max: 5 })
        ));
    }

    #[test]
    fn test_bad_base64_rejected() {
        assert!(matches!(decode_base64("not base64!!", 1024), Err(ImageError::Base64(_))));
    }

    #[test]
    fn test_decode_png() {
        let img = decode_rgb(&png(4, 3)).unwrap();
        assert_eq!(img.dimensions(), (4, 3));
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(matches!(decode_rgb(b"definitely not an image"), Err(ImageError::Decode(_))));
    }

    #[tokio::test]
    async fn test_decode_on_blocking_pool() {
        let img = decode_rgb_blocking(png(2, 2)).await.unwrap();
        assert_eq!(img.dimensions(), (2, 2));
    }
}
