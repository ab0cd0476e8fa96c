//! Persisted data model: pages, layers, strokes, images.

mod image;
mod page;
mod stroke;

pub use image::{ImageFormat, ImageItem};
pub use page::{Layer, ModelError, Page, TemplateKind};
pub use stroke::{BlendMode, SamplePoint, Stroke, StrokeExtra, ToolKind};

use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for pages.
pub type PageId = Uuid;
/// Unique identifier for layers.
pub type LayerId = Uuid;
/// Unique identifier for strokes.
pub type StrokeId = Uuid;
/// Unique identifier for images.
pub type ImageId = Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    /// The color scaled to the given opacity (0–1).
    pub fn with_opacity(self, opacity: f64) -> Self {
        let a = (self.a as f64 * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }
}

impl From<Color> for Rgba8 {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<Rgba8> for Color {
    fn from(color: Rgba8) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_roundtrip() {
        let c = Rgba8::new(12, 34, 56, 200);
        let peniko: Color = c.into();
        let back: Rgba8 = peniko.into();
        assert_eq!(c, back);
    }

    #[test]
    fn test_with_opacity() {
        let c = Rgba8::black().with_opacity(0.5);
        assert_eq!(c.a, 128);
        let clamped = Rgba8::black().with_opacity(2.0);
        assert_eq!(clamped.a, 255);
    }
}
