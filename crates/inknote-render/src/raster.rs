//! CPU rasterizer.
//!
//! Software `RenderTarget` used for thumbnails and export. Strokes are
//! flattened to polylines and stamped segment by segment with analytic
//! coverage at the rim; fills use an even-odd scanline. Hosts register
//! decoded bitmaps by image id; unregistered images render as empty space.

use crate::target::{LineCap, RenderError, RenderResult, RenderTarget, StrokeStyle};
use inknote_core::model::{BlendMode, ImageId, ImageItem, Rgba8};
use kurbo::{BezPath, PathEl, Point, Vec2};
use std::collections::HashMap;

/// Curve flattening tolerance in page units.
const FLATTEN_TOLERANCE: f64 = 0.25;
/// Greeked text: advance per character as a fraction of font size.
const GREEK_ADVANCE: f64 = 0.6;

/// Owned RGBA8 pixel buffer.
#[derive(Debug, Clone)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::BadSurfaceSize(width, height));
        }
        Ok(Self {
            width,
            height,
            data: vec![0; (width * height * 4) as usize],
        })
    }

    /// Wrap an existing RGBA8 buffer. The length must match the dimensions.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> RenderResult<Self> {
        if width == 0 || height == 0 || data.len() != (width * height * 4) as usize {
            return Err(RenderError::BadSurfaceSize(width, height));
        }
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 pixels, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba8 {
        let i = ((y * self.width + x) * 4) as usize;
        Rgba8::new(self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3])
    }

    fn fill(&mut self, color: Rgba8) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
    }

    /// Composite one pixel. `alpha` is the final source alpha in [0, 1]
    /// with color alpha, opacity and coverage already folded in.
    fn blend_pixel(&mut self, x: u32, y: u32, color: Rgba8, alpha: f64, blend: BlendMode) {
        if alpha <= 0.0 || x >= self.width || y >= self.height {
            return;
        }
        let alpha = alpha.min(1.0);
        let i = ((y * self.width + x) * 4) as usize;
        let dst = [self.data[i], self.data[i + 1], self.data[i + 2]];
        let src = match blend {
            BlendMode::Normal => [color.r, color.g, color.b],
            BlendMode::Multiply => [
                ((color.r as u16 * dst[0] as u16) / 255) as u8,
                ((color.g as u16 * dst[1] as u16) / 255) as u8,
                ((color.b as u16 * dst[2] as u16) / 255) as u8,
            ],
        };
        for c in 0..3 {
            let out = src[c] as f64 * alpha + dst[c] as f64 * (1.0 - alpha);
            self.data[i + c] = out.round() as u8;
        }
        let da = self.data[i + 3] as f64 / 255.0;
        self.data[i + 3] = ((alpha + da * (1.0 - alpha)) * 255.0).round() as u8;
    }
}

/// A decoded bitmap registered by the host.
#[derive(Debug, Clone)]
struct Bitmap {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

/// Software render target drawing into a [`Surface`].
pub struct CpuRaster {
    surface: Surface,
    bitmaps: HashMap<ImageId, Bitmap>,
}

impl CpuRaster {
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        Ok(Self {
            surface: Surface::new(width, height)?,
            bitmaps: HashMap::new(),
        })
    }

    /// Register the decoded pixels for an image id. Payloads whose length
    /// does not match the dimensions are ignored.
    pub fn register_bitmap(&mut self, id: ImageId, width: u32, height: u32, rgba: Vec<u8>) {
        if rgba.len() != (width * height * 4) as usize {
            log::warn!("bitmap {id}: payload length does not match {width}x{height}, ignored");
            return;
        }
        self.bitmaps.insert(id, Bitmap { width, height, rgba });
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn into_surface(self) -> Surface {
        self.surface
    }

    /// Flatten a path into polylines, one per subpath.
    fn polylines(path: &BezPath) -> Vec<Vec<Point>> {
        let mut lines: Vec<Vec<Point>> = Vec::new();
        kurbo::flatten(path.iter(), FLATTEN_TOLERANCE, |el| match el {
            PathEl::MoveTo(p) => lines.push(vec![p]),
            PathEl::LineTo(p) => {
                if let Some(line) = lines.last_mut() {
                    line.push(p);
                }
            }
            PathEl::ClosePath => {
                if let Some(line) = lines.last_mut() {
                    if let Some(&first) = line.first() {
                        line.push(first);
                    }
                }
            }
            // flatten never emits curves
            _ => {}
        });
        lines
    }

    /// Stamp one thick segment with the requested cap.
    fn stamp_segment(
        &mut self,
        a: Point,
        b: Point,
        half_width: f64,
        cap: LineCap,
        color: Rgba8,
        opacity: f64,
        blend: BlendMode,
    ) {
        let seg = b - a;
        let len = seg.hypot();
        let dir = if len > f64::EPSILON {
            seg / len
        } else {
            Vec2::new(1.0, 0.0)
        };
        let normal = Vec2::new(-dir.y, dir.x);
        let reach = half_width + 1.0;
        let x0 = (a.x.min(b.x) - reach).floor().max(0.0) as u32;
        let y0 = (a.y.min(b.y) - reach).floor().max(0.0) as u32;
        let x1 = ((a.x.max(b.x) + reach).ceil() as i64).clamp(0, self.surface.width as i64) as u32;
        let y1 = ((a.y.max(b.y) + reach).ceil() as i64).clamp(0, self.surface.height as i64) as u32;
        let base_alpha = opacity * color.a as f64 / 255.0;

        for y in y0..y1 {
            for x in x0..x1 {
                let p = Point::new(x as f64 + 0.5, y as f64 + 0.5) - a;
                let along = p.dot(dir);
                let perp = p.dot(normal).abs();
                let coverage = match cap {
                    LineCap::Round => {
                        let t = along.clamp(0.0, len);
                        let d = (p - dir * t).hypot();
                        (half_width + 0.5 - d).clamp(0.0, 1.0)
                    }
                    LineCap::Square => {
                        let edge = (half_width + 0.5 - perp)
                            .min(along + half_width + 0.5)
                            .min(len + half_width - along + 0.5);
                        edge.clamp(0.0, 1.0)
                    }
                };
                self.surface.blend_pixel(x, y, color, base_alpha * coverage, blend);
            }
        }
    }

    /// Even-odd scanline fill of flattened polygons.
    fn fill_polylines(&mut self, lines: &[Vec<Point>], color: Rgba8, opacity: f64, blend: BlendMode) {
        let base_alpha = opacity * color.a as f64 / 255.0;
        let mut crossings: Vec<f64> = Vec::new();
        for y in 0..self.surface.height {
            let yc = y as f64 + 0.5;
            crossings.clear();
            for line in lines {
                // Subpaths are treated as closed for filling.
                let n = line.len();
                for i in 0..n {
                    let (p0, p1) = (line[i], line[(i + 1) % n]);
                    if (p0.y > yc) != (p1.y > yc) {
                        let t = (yc - p0.y) / (p1.y - p0.y);
                        crossings.push(p0.x + t * (p1.x - p0.x));
                    }
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));
            for pair in crossings.chunks_exact(2) {
                let (left, right) = (pair[0].max(0.0), pair[1].min(self.surface.width as f64));
                if right <= left {
                    continue;
                }
                let x0 = left.floor() as u32;
                let x1 = (right.ceil() as u32).min(self.surface.width);
                for x in x0..x1 {
                    let px0 = x as f64;
                    let covered = (right.min(px0 + 1.0) - left.max(px0)).clamp(0.0, 1.0);
                    self.surface.blend_pixel(x, y, color, base_alpha * covered, blend);
                }
            }
        }
    }
}

impl RenderTarget for CpuRaster {
    fn clear(&mut self, color: Rgba8) {
        self.surface.fill(color);
    }

    fn stroke_path(&mut self, path: &BezPath, style: &StrokeStyle) {
        let half_width = (style.width / 2.0).max(0.25);
        for line in Self::polylines(path) {
            if line.len() == 1 {
                self.stamp_segment(
                    line[0],
                    line[0],
                    half_width,
                    style.cap,
                    style.color,
                    style.opacity,
                    style.blend,
                );
            }
            for pair in line.windows(2) {
                self.stamp_segment(
                    pair[0],
                    pair[1],
                    half_width,
                    style.cap,
                    style.color,
                    style.opacity,
                    style.blend,
                );
            }
        }
    }

    fn fill_path(&mut self, path: &BezPath, color: Rgba8, opacity: f64, blend: BlendMode) {
        let lines = Self::polylines(path);
        self.fill_polylines(&lines, color, opacity, blend);
    }

    fn draw_image(&mut self, image: &ImageItem) {
        let Some(bitmap) = self.bitmaps.get(&image.id).cloned() else {
            return;
        };
        let rect = image.rect();
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            return;
        }
        let center = rect.center();
        let theta = image.rotation_degrees.to_radians();
        let (sin, cos) = theta.sin_cos();
        // Bounding box of the rotated rect.
        let radius = (rect.width().hypot(rect.height())) / 2.0;
        let x0 = ((center.x - radius).floor().max(0.0)) as u32;
        let y0 = ((center.y - radius).floor().max(0.0)) as u32;
        let x1 = (((center.x + radius).ceil() as i64).clamp(0, self.surface.width as i64)) as u32;
        let y1 = (((center.y + radius).ceil() as i64).clamp(0, self.surface.height as i64)) as u32;

        for y in y0..y1 {
            for x in x0..x1 {
                let px = x as f64 + 0.5 - center.x;
                let py = y as f64 + 0.5 - center.y;
                // Inverse-rotate the pixel into image space.
                let lx = px * cos + py * sin + center.x;
                let ly = -px * sin + py * cos + center.y;
                let u = (lx - rect.x0) / rect.width();
                let v = (ly - rect.y0) / rect.height();
                if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                    continue;
                }
                let sx = ((u * bitmap.width as f64) as u32).min(bitmap.width - 1);
                let sy = ((v * bitmap.height as f64) as u32).min(bitmap.height - 1);
                let i = ((sy * bitmap.width + sx) * 4) as usize;
                let color = Rgba8::new(
                    bitmap.rgba[i],
                    bitmap.rgba[i + 1],
                    bitmap.rgba[i + 2],
                    bitmap.rgba[i + 3],
                );
                self.surface
                    .blend_pixel(x, y, color, color.a as f64 / 255.0, BlendMode::Normal);
            }
        }
    }

    /// Greeked text: one box per glyph. Good enough for thumbnails where
    /// real shaping is the host's job.
    fn draw_text(&mut self, line: &str, origin: Point, font_size: f64, color: Rgba8) {
        let advance = font_size * GREEK_ADVANCE;
        let top = origin.y + font_size * 0.2;
        let bottom = origin.y + font_size * 0.8;
        let mut x = origin.x;
        for ch in line.chars() {
            if !ch.is_whitespace() {
                let mut glyph = BezPath::new();
                glyph.move_to(Point::new(x, top));
                glyph.line_to(Point::new(x + advance * 0.8, top));
                glyph.line_to(Point::new(x + advance * 0.8, bottom));
                glyph.line_to(Point::new(x, bottom));
                glyph.close_path();
                self.fill_path(&glyph, color, color.a as f64 / 255.0, BlendMode::Normal);
            }
            x += advance;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inknote_core::model::ImageFormat;
    use kurbo::Rect;
    use kurbo::Shape;
    use uuid::Uuid;

    #[test]
    fn test_zero_surface_rejected() {
        assert!(matches!(
            Surface::new(0, 10),
            Err(RenderError::BadSurfaceSize(0, 10))
        ));
    }

    #[test]
    fn test_clear_fills_every_pixel() {
        let mut raster = CpuRaster::new(4, 4).unwrap();
        raster.clear(Rgba8::new(10, 20, 30, 255));
        assert_eq!(raster.surface().pixel(0, 0), Rgba8::new(10, 20, 30, 255));
        assert_eq!(raster.surface().pixel(3, 3), Rgba8::new(10, 20, 30, 255));
    }

    #[test]
    fn test_stroke_marks_center_not_corner() {
        let mut raster = CpuRaster::new(32, 32).unwrap();
        raster.clear(Rgba8::white());
        let mut path = BezPath::new();
        path.move_to(Point::new(4.0, 16.0));
        path.line_to(Point::new(28.0, 16.0));
        raster.stroke_path(&path, &StrokeStyle::new(Rgba8::black(), 4.0));

        assert_eq!(raster.surface().pixel(16, 16), Rgba8::black());
        assert_eq!(raster.surface().pixel(0, 0), Rgba8::white());
    }

    #[test]
    fn test_even_odd_fill_leaves_hole() {
        let mut raster = CpuRaster::new(40, 40).unwrap();
        raster.clear(Rgba8::white());
        let mut path = Rect::new(4.0, 4.0, 36.0, 36.0).to_path(0.1);
        for el in Rect::new(14.0, 14.0, 26.0, 26.0).to_path(0.1).elements() {
            path.push(*el);
        }
        raster.fill_path(&path, Rgba8::black(), 1.0, BlendMode::Normal);

        assert_eq!(raster.surface().pixel(8, 8), Rgba8::black());
        assert_eq!(raster.surface().pixel(20, 20), Rgba8::white());
    }

    #[test]
    fn test_multiply_darkens() {
        let mut raster = CpuRaster::new(8, 8).unwrap();
        raster.clear(Rgba8::new(200, 200, 200, 255));
        let rect = Rect::new(0.0, 0.0, 8.0, 8.0).to_path(0.1);
        raster.fill_path(&rect, Rgba8::new(128, 128, 128, 255), 1.0, BlendMode::Multiply);

        let px = raster.surface().pixel(4, 4);
        assert!(px.r < 128, "multiply should darken below both inputs, got {}", px.r);
    }

    #[test]
    fn test_unregistered_image_skipped() {
        let mut raster = CpuRaster::new(16, 16).unwrap();
        raster.clear(Rgba8::white());
        let image = ImageItem::new(Uuid::new_v4(), &[1, 2, 3], ImageFormat::Png, 2.0, 2.0, 10.0, 10.0);
        raster.draw_image(&image);
        assert_eq!(raster.surface().pixel(6, 6), Rgba8::white());
    }

    #[test]
    fn test_registered_image_blits() {
        let mut raster = CpuRaster::new(16, 16).unwrap();
        raster.clear(Rgba8::white());
        let image = ImageItem::new(Uuid::new_v4(), &[1, 2, 3], ImageFormat::Png, 2.0, 2.0, 10.0, 10.0);
        raster.register_bitmap(image.id, 2, 2, vec![255, 0, 0, 255].repeat(4));
        raster.draw_image(&image);
        assert_eq!(raster.surface().pixel(6, 6), Rgba8::new(255, 0, 0, 255));
        assert_eq!(raster.surface().pixel(14, 14), Rgba8::white());
    }

    #[test]
    fn test_bad_bitmap_payload_ignored() {
        let mut raster = CpuRaster::new(16, 16).unwrap();
        let id = Uuid::new_v4();
        raster.register_bitmap(id, 2, 2, vec![0; 3]);
        assert!(raster.bitmaps.is_empty());
    }

    #[test]
    fn test_greeked_text_marks_pixels() {
        let mut raster = CpuRaster::new(64, 32).unwrap();
        raster.clear(Rgba8::white());
        raster.draw_text("hi", Point::new(4.0, 4.0), 16.0, Rgba8::black());
        let px = raster.surface().pixel(6, 12);
        assert!(px.r < 255);
    }
}
