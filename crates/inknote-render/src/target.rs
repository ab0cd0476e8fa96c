//! Render target abstraction.
//!
//! The engine never touches a real display; anything that can clear, stroke,
//! fill, blit and letter is a valid target. The CPU raster in this crate is
//! one implementation; hosts with a GPU scene graph provide their own.

use inknote_core::model::{BlendMode, ImageItem, Rgba8};
use kurbo::{BezPath, Point};
use thiserror::Error;

/// Render/export errors.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("surface size invalid: {0}x{1}")]
    BadSurfaceSize(u32, u32),
    #[error("png encoding failed: {0}")]
    PngEncode(#[from] png::EncodingError),
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Line cap applied to stroked paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Round,
    /// Squared ends, used by the highlighter.
    Square,
}

/// Full style for one stroked path.
#[derive(Debug, Clone, Copy)]
pub struct StrokeStyle {
    pub color: Rgba8,
    pub width: f64,
    pub opacity: f64,
    pub blend: BlendMode,
    pub cap: LineCap,
}

impl StrokeStyle {
    pub fn new(color: Rgba8, width: f64) -> Self {
        Self {
            color,
            width,
            opacity: 1.0,
            blend: BlendMode::Normal,
            cap: LineCap::Round,
        }
    }
}

/// Drawing surface interface consumed by the scene painter.
pub trait RenderTarget {
    /// Fill the whole surface with a color, erasing previous content.
    fn clear(&mut self, color: Rgba8);

    /// Stroke a path.
    fn stroke_path(&mut self, path: &BezPath, style: &StrokeStyle);

    /// Fill a closed path (even-odd rule).
    fn fill_path(&mut self, path: &BezPath, color: Rgba8, opacity: f64, blend: BlendMode);

    /// Draw a placed image. Targets that have not decoded the payload yet
    /// skip it; the layer is repainted once decoding completes.
    fn draw_image(&mut self, image: &ImageItem);

    /// Draw one line of left-aligned text with its baseline-origin at
    /// `origin`'s top-left.
    fn draw_text(&mut self, line: &str, origin: Point, font_size: f64, color: Rgba8);
}
