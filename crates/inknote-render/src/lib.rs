//! Inknote Render Library
//!
//! Layered painting of inknote pages onto an abstract render target, plus a
//! software rasterizer for thumbnails and PNG/PDF export. Interactive hosts
//! implement [`RenderTarget`] over their own scene graph and reuse the same
//! scene painter.

pub mod export;
pub mod raster;
pub mod scene;
pub mod target;
pub mod template;

pub use export::{encode_png, export_pdf, export_png, page_thumbnail_png, THUMBNAIL_MAX_EDGE};
pub use raster::{CpuRaster, Surface};
pub use scene::{paint_layer, paint_live_stroke, paint_overlay, paint_page, paint_stroke, Overlay};
pub use target::{LineCap, RenderError, RenderResult, RenderTarget, StrokeStyle};
pub use template::paint_template;
