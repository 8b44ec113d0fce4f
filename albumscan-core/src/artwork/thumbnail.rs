//! Square thumbnail rendering (center-crop, scale to fill)

use super::ArtworkError;
use image::{imageops::FilterType, ImageFormat};
use std::io::Cursor;

/// Decode `bytes`, center-crop to a square and scale to `edge_px`, encode as JPEG
///
/// CPU-bound: callers on the async runtime should go through `spawn_blocking`.
pub fn render_square_thumbnail(bytes: &[u8], edge_px: u32) -> Result<Vec<u8>, ArtworkError> {
    let edge_px = edge_px.max(1);
    let decoded = image::load_from_memory(bytes).map_err(|e| ArtworkError::Image(e.to_string()))?;

    // JPEG has no alpha channel
    let square = decoded.resize_to_fill(edge_px, edge_px, FilterType::Lanczos3).to_rgb8();

    let mut cursor = Cursor::new(Vec::new());
    square
        .write_to(&mut cursor, ImageFormat::Jpeg)
        .map_err(|e| ArtworkError::Image(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GenericImageView, ImageBuffer, Rgba};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let source = DynamicImage::ImageRgba8(ImageBuffer::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        }));
        let mut cursor = Cursor::new(Vec::<u8>::new());
        source
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("png encoding should succeed");
        cursor.into_inner()
    }

    #[test]
    fn test_landscape_source_becomes_square() {
        let thumbnail = render_square_thumbnail(&png_bytes(640, 360), 300).unwrap();

        assert_eq!(image::guess_format(&thumbnail).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&thumbnail).unwrap();
        assert_eq!(decoded.dimensions(), (300, 300));
    }

    #[test]
    fn test_small_source_is_scaled_up() {
        let thumbnail = render_square_thumbnail(&png_bytes(40, 90), 120).unwrap();
        let decoded = image::load_from_memory(&thumbnail).unwrap();
        assert_eq!(decoded.dimensions(), (120, 120));
    }

    #[test]
    fn test_non_image_bytes_rejected() {
        let result = render_square_thumbnail(b"definitely-not-an-image", 300);
        assert!(matches!(result, Err(ArtworkError::Image(_))));
    }
}
