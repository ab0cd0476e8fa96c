//! Image placements: encoded bitmaps positioned on a layer.

use super::{ImageId, LayerId};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Encoded format of an image payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Png,
    Jpeg,
    WebP,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
        }
    }

    /// Detect format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Some(ImageFormat::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(ImageFormat::WebP);
        }
        None
    }
}

/// A raster image placed on a layer.
///
/// Same per-page placement semantics as strokes but persisted through its own
/// endpoint. The payload stays encoded; decoding is the host's concern and a
/// not-yet-decoded image simply renders as empty space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageItem {
    pub id: ImageId,
    pub layer_id: LayerId,
    /// Encoded bitmap payload, base64 for JSON transport.
    pub data_base64: String,
    pub format: ImageFormat,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Rotation in degrees, applied around the image center.
    #[serde(default)]
    pub rotation_degrees: f64,
}

impl ImageItem {
    pub fn new(layer_id: LayerId, data: &[u8], format: ImageFormat, x: f64, y: f64, width: f64, height: f64) -> Self {
        use base64::{Engine, engine::general_purpose::STANDARD};
        Self {
            id: Uuid::new_v4(),
            layer_id,
            data_base64: STANDARD.encode(data),
            format,
            x,
            y,
            width,
            height,
            rotation_degrees: 0.0,
        }
    }

    /// Decode the payload back to raw bytes.
    pub fn data(&self) -> Option<Vec<u8>> {
        use base64::{Engine, engine::general_purpose::STANDARD};
        STANDARD.decode(&self.data_base64).ok()
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    pub fn center(&self) -> Point {
        self.rect().center()
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Give the image a fresh identity (for paste/duplicate).
    pub fn regenerate_id(&mut self) {
        self.id = Uuid::new_v4();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A]),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"RIFFxxxxWEBP"), Some(ImageFormat::WebP));
        assert_eq!(ImageFormat::from_magic_bytes(b"GIF8"), None);
    }

    #[test]
    fn test_data_roundtrip() {
        let payload = [1u8, 2, 3, 4, 5];
        let img = ImageItem::new(Uuid::new_v4(), &payload, ImageFormat::Png, 0.0, 0.0, 10.0, 10.0);
        assert_eq!(img.data().unwrap(), payload);
    }

    #[test]
    fn test_rect() {
        let img = ImageItem::new(Uuid::new_v4(), &[], ImageFormat::Png, 10.0, 20.0, 100.0, 50.0);
        assert_eq!(img.rect(), Rect::new(10.0, 20.0, 110.0, 70.0));
        assert_eq!(img.center(), Point::new(60.0, 45.0));
    }
}
