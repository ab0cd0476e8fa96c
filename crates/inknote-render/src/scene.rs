//! Scene painting: projects the page model onto a render target.
//!
//! Per layer: clear, images in stored order, then strokes in stored order.
//! Painting is a pure projection; nothing here mutates the model.

use crate::target::{LineCap, RenderTarget, StrokeStyle};
use crate::template::paint_template;
use inknote_core::geometry::{segment_width, smoothed_path};
use inknote_core::model::{
    BlendMode, Layer, Page, SamplePoint, Stroke, StrokeExtra, ToolKind,
};
use kurbo::{BezPath, Circle, Ellipse, Point, Rect, Shape, Vec2};

/// Selection/overlay accent color.
pub const ACCENT_COLOR: inknote_core::model::Rgba8 =
    inknote_core::model::Rgba8::new(59, 130, 246, 255);

/// Highlighter width multiplier over the base width.
pub const HIGHLIGHTER_WIDTH_FACTOR: f64 = 8.0;
/// Highlighter opacity multiplier.
pub const HIGHLIGHTER_OPACITY: f64 = 0.35;
/// Text line height as a multiple of font size.
pub const TEXT_LINE_HEIGHT: f64 = 1.4;
/// Arrow head length as a multiple of stroke width (floored).
const ARROW_HEAD_LENGTH_FACTOR: f64 = 4.0;
const ARROW_HEAD_MIN_LENGTH: f64 = 10.0;
/// Arrow head half-width as a multiple of stroke width.
const ARROW_HEAD_HALF_WIDTH_FACTOR: f64 = 1.5;

/// Paint the full page: background color, template, then every visible
/// layer back to front.
pub fn paint_page(target: &mut dyn RenderTarget, page: &Page) {
    target.clear(page.background);
    paint_template(target, page.template, page.width, page.height);
    let mut layers: Vec<&Layer> = page.layers().iter().collect();
    layers.sort_by_key(|l| l.sort_order);
    for layer in layers {
        paint_layer(target, layer);
    }
}

/// Paint one layer: images first, then strokes, both in stored order.
pub fn paint_layer(target: &mut dyn RenderTarget, layer: &Layer) {
    if !layer.visible {
        return;
    }
    for image in &layer.images {
        target.draw_image(image);
    }
    for stroke in &layer.strokes {
        paint_stroke(target, stroke, layer.opacity);
    }
}

/// Paint one stroke with its tool's composition rules.
pub fn paint_stroke(target: &mut dyn RenderTarget, stroke: &Stroke, layer_opacity: f64) {
    if stroke.points.is_empty() {
        return;
    }
    let opacity = stroke.opacity * layer_opacity;
    match stroke.kind {
        ToolKind::Pen | ToolKind::Pencil => {
            paint_pressure_path(target, stroke, opacity);
        }
        ToolKind::Marker => {
            // Same pressure model, always fully opaque.
            paint_pressure_path(target, stroke, layer_opacity);
        }
        ToolKind::Highlighter => {
            let style = StrokeStyle {
                color: stroke.color,
                width: stroke.width * HIGHLIGHTER_WIDTH_FACTOR,
                opacity: opacity * HIGHLIGHTER_OPACITY,
                blend: BlendMode::Multiply,
                cap: LineCap::Square,
            };
            target.stroke_path(&smoothed_path(&stroke.points), &style);
        }
        ToolKind::Line => paint_two_point(target, stroke, opacity, |a, b| {
            let mut path = BezPath::new();
            path.move_to(a);
            path.line_to(b);
            path
        }),
        ToolKind::Rect => paint_two_point(target, stroke, opacity, |a, b| {
            Rect::from_points(a, b).to_path(0.1)
        }),
        ToolKind::Circle => paint_two_point(target, stroke, opacity, |a, b| {
            let rect = Rect::from_points(a, b);
            Ellipse::new(rect.center(), (rect.width() / 2.0, rect.height() / 2.0), 0.0)
                .to_path(0.1)
        }),
        ToolKind::Arrow => paint_arrow(target, stroke, opacity),
        ToolKind::Text => paint_text(target, stroke, opacity),
        // Erasure is destructive, never drawn. Transient kinds have no mark.
        ToolKind::Eraser | ToolKind::Select | ToolKind::Lasso | ToolKind::Pan => {}
    }
}

/// Freehand path with pressure-responsive per-segment widths, each segment
/// smoothed toward the next sample via a quadratic midpoint curve.
fn paint_pressure_path(target: &mut dyn RenderTarget, stroke: &Stroke, opacity: f64) {
    let points = &stroke.points;
    let style = |pressure: f64| StrokeStyle {
        color: stroke.color,
        width: segment_width(stroke.width, pressure),
        opacity,
        blend: stroke.blend,
        cap: LineCap::Round,
    };
    if points.len() == 1 {
        let radius = segment_width(stroke.width, points[0].pressure) / 2.0;
        let dot = Circle::new(points[0].pos(), radius).to_path(0.1);
        target.fill_path(&dot, stroke.color, opacity, stroke.blend);
        return;
    }
    if points.len() == 2 {
        let mut path = BezPath::new();
        path.move_to(points[0].pos());
        path.line_to(points[1].pos());
        let pressure = (points[0].pressure + points[1].pressure) / 2.0;
        target.stroke_path(&path, &style(pressure));
        return;
    }
    let mid = |a: &SamplePoint, b: &SamplePoint| {
        Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    };
    // Head: first sample to the first midpoint.
    let mut head = BezPath::new();
    head.move_to(points[0].pos());
    head.line_to(mid(&points[0], &points[1]));
    target.stroke_path(&head, &style(points[0].pressure));
    // Body: midpoint to midpoint with the sample as control point.
    for w in points.windows(3) {
        let mut seg = BezPath::new();
        seg.move_to(mid(&w[0], &w[1]));
        seg.quad_to(w[1].pos(), mid(&w[1], &w[2]));
        target.stroke_path(&seg, &style(w[1].pressure));
    }
    // Tail: last midpoint to the last sample.
    let last = points.len() - 1;
    let mut tail = BezPath::new();
    tail.move_to(mid(&points[last - 1], &points[last]));
    tail.line_to(points[last].pos());
    target.stroke_path(&tail, &style(points[last].pressure));
}

fn paint_two_point(
    target: &mut dyn RenderTarget,
    stroke: &Stroke,
    opacity: f64,
    shape: impl Fn(Point, Point) -> BezPath,
) {
    let a = stroke.points[0].pos();
    let b = stroke.points[stroke.points.len() - 1].pos();
    let path = shape(a, b);
    if let StrokeExtra::Shape { fill: Some(fill) } = &stroke.extra {
        target.fill_path(&path, *fill, opacity, stroke.blend);
    }
    let style = StrokeStyle {
        color: stroke.color,
        width: stroke.width,
        opacity,
        blend: stroke.blend,
        cap: LineCap::Round,
    };
    target.stroke_path(&path, &style);
}

fn paint_arrow(target: &mut dyn RenderTarget, stroke: &Stroke, opacity: f64) {
    let start = stroke.points[0].pos();
    let end = stroke.points[stroke.points.len() - 1].pos();
    let shaft = end - start;
    let len = shaft.hypot();
    if len < f64::EPSILON {
        return;
    }
    let dir = shaft / len;
    let head_len = (stroke.width * ARROW_HEAD_LENGTH_FACTOR)
        .max(ARROW_HEAD_MIN_LENGTH)
        .min(len);
    let half_width = stroke.width * ARROW_HEAD_HALF_WIDTH_FACTOR;
    let base = end - dir * head_len;
    let perp = Vec2::new(-dir.y, dir.x);

    let mut path = BezPath::new();
    path.move_to(start);
    path.line_to(base);
    let style = StrokeStyle {
        color: stroke.color,
        width: stroke.width,
        opacity,
        blend: stroke.blend,
        cap: LineCap::Round,
    };
    target.stroke_path(&path, &style);

    let mut head = BezPath::new();
    head.move_to(end);
    head.line_to(base + perp * half_width);
    head.line_to(base - perp * half_width);
    head.close_path();
    target.fill_path(&head, stroke.color, opacity, stroke.blend);
}

fn paint_text(target: &mut dyn RenderTarget, stroke: &Stroke, opacity: f64) {
    let StrokeExtra::Text { content, font_size } = &stroke.extra else {
        return;
    };
    let anchor = stroke.points[0].pos();
    let color = stroke.color.with_opacity(opacity);
    for (i, line) in content.lines().enumerate() {
        let origin = Point::new(anchor.x, anchor.y + i as f64 * font_size * TEXT_LINE_HEIGHT);
        target.draw_text(line, origin, *font_size, color);
    }
}

/// Paint the in-progress gesture onto the live preview surface.
pub fn paint_live_stroke(
    target: &mut dyn RenderTarget,
    tool: ToolKind,
    samples: &[SamplePoint],
    color: inknote_core::model::Rgba8,
    width: f64,
    opacity: f64,
) {
    if samples.is_empty() || !tool.is_drawing() {
        return;
    }
    let preview = Stroke::new(
        inknote_core::model::LayerId::nil(),
        tool,
        color,
        width,
        opacity,
        samples.to_vec(),
    );
    paint_stroke(target, &preview, 1.0);
}

/// UI chrome painted on the overlay surface above all layers.
#[derive(Debug, Default)]
pub struct Overlay<'a> {
    /// Selection bounding box; handles are derived from it.
    pub selection_bounds: Option<Rect>,
    /// Live rubber-band rectangle.
    pub band: Option<Rect>,
    /// Live lasso polygon.
    pub lasso: Option<&'a [Point]>,
    /// Eraser ring: cursor position and radius.
    pub eraser: Option<(Point, f64)>,
    /// Camera zoom; handle sizes scale inversely so they stay constant
    /// on screen.
    pub zoom: f64,
}

/// Side of a selection handle square in screen pixels.
const HANDLE_SIZE: f64 = 10.0;

pub fn paint_overlay(target: &mut dyn RenderTarget, overlay: &Overlay) {
    let zoom = if overlay.zoom > 0.0 { overlay.zoom } else { 1.0 };
    let thin = StrokeStyle::new(ACCENT_COLOR, 1.0 / zoom);

    if let Some(bounds) = overlay.selection_bounds {
        target.stroke_path(&bounds.to_path(0.1), &thin);
        let half = HANDLE_SIZE / zoom / 2.0;
        for corner in inknote_core::selection::Corner::ALL {
            let c = corner.position(bounds);
            let handle = Rect::new(c.x - half, c.y - half, c.x + half, c.y + half);
            target.fill_path(
                &handle.to_path(0.1),
                inknote_core::model::Rgba8::white(),
                1.0,
                BlendMode::Normal,
            );
            target.stroke_path(&handle.to_path(0.1), &thin);
        }
    }
    if let Some(band) = overlay.band {
        target.fill_path(
            &band.to_path(0.1),
            ACCENT_COLOR,
            0.1,
            BlendMode::Normal,
        );
        target.stroke_path(&band.to_path(0.1), &thin);
    }
    if let Some(lasso) = overlay.lasso {
        if lasso.len() >= 2 {
            let mut path = BezPath::new();
            path.move_to(lasso[0]);
            for p in &lasso[1..] {
                path.line_to(*p);
            }
            target.stroke_path(&path, &thin);
        }
    }
    if let Some((center, radius)) = overlay.eraser {
        let ring = Circle::new(center, radius).to_path(0.1);
        target.stroke_path(&ring, &thin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inknote_core::model::{ImageItem, Rgba8};
    use uuid::Uuid;

    /// Records every paint call for assertions.
    #[derive(Default)]
    struct Recorder {
        strokes: Vec<StrokeStyle>,
        fills: usize,
        images: usize,
        text_lines: Vec<(String, Point)>,
        cleared: Option<Rgba8>,
    }

    impl RenderTarget for Recorder {
        fn clear(&mut self, color: Rgba8) {
            self.cleared = Some(color);
        }
        fn stroke_path(&mut self, _path: &BezPath, style: &StrokeStyle) {
            self.strokes.push(*style);
        }
        fn fill_path(&mut self, _path: &BezPath, _color: Rgba8, _opacity: f64, _blend: BlendMode) {
            self.fills += 1;
        }
        fn draw_image(&mut self, _image: &ImageItem) {
            self.images += 1;
        }
        fn draw_text(&mut self, line: &str, origin: Point, _font_size: f64, _color: Rgba8) {
            self.text_lines.push((line.to_string(), origin));
        }
    }

    fn stroke_of(kind: ToolKind, points: &[(f64, f64, f64)]) -> Stroke {
        Stroke::new(
            Uuid::new_v4(),
            kind,
            Rgba8::black(),
            3.0,
            1.0,
            points
                .iter()
                .enumerate()
                .map(|(i, &(x, y, p))| SamplePoint::new(x, y, p, i as u64 * 16))
                .collect(),
        )
    }

    #[test]
    fn test_highlighter_composition() {
        let mut recorder = Recorder::default();
        let stroke = stroke_of(
            ToolKind::Highlighter,
            &[(0.0, 0.0, 0.5), (50.0, 0.0, 0.5), (100.0, 0.0, 0.5)],
        );
        paint_stroke(&mut recorder, &stroke, 1.0);

        assert_eq!(recorder.strokes.len(), 1);
        let style = recorder.strokes[0];
        assert_eq!(style.width, 3.0 * HIGHLIGHTER_WIDTH_FACTOR);
        assert_eq!(style.blend, BlendMode::Multiply);
        assert_eq!(style.cap, LineCap::Square);
        assert!((style.opacity - HIGHLIGHTER_OPACITY).abs() < 1e-12);
    }

    #[test]
    fn test_pen_segment_widths_follow_pressure() {
        let mut recorder = Recorder::default();
        let stroke = stroke_of(
            ToolKind::Pen,
            &[(0.0, 0.0, 0.2), (10.0, 0.0, 0.5), (20.0, 0.0, 1.0), (30.0, 0.0, 1.0)],
        );
        paint_stroke(&mut recorder, &stroke, 1.0);

        // Head + 2 body segments + tail.
        assert_eq!(recorder.strokes.len(), 4);
        let widths: Vec<f64> = recorder.strokes.iter().map(|s| s.width).collect();
        assert!(widths[0] < widths[1]);
        assert!(widths[1] < widths[2]);
        assert_eq!(widths[2], segment_width(3.0, 1.0));
    }

    #[test]
    fn test_eraser_paints_nothing() {
        let mut recorder = Recorder::default();
        let mut stroke = stroke_of(ToolKind::Pen, &[(0.0, 0.0, 0.5), (10.0, 0.0, 0.5)]);
        stroke.kind = ToolKind::Eraser;
        paint_stroke(&mut recorder, &stroke, 1.0);
        assert!(recorder.strokes.is_empty());
        assert_eq!(recorder.fills, 0);
    }

    #[test]
    fn test_arrow_draws_shaft_and_head() {
        let mut recorder = Recorder::default();
        let stroke = stroke_of(ToolKind::Arrow, &[(0.0, 0.0, 0.5), (100.0, 0.0, 0.5)]);
        paint_stroke(&mut recorder, &stroke, 1.0);
        assert_eq!(recorder.strokes.len(), 1);
        assert_eq!(recorder.fills, 1);
    }

    #[test]
    fn test_text_lines_at_line_height() {
        let mut recorder = Recorder::default();
        let stroke = stroke_of(ToolKind::Text, &[(10.0, 20.0, 1.0)]).with_extra(
            StrokeExtra::Text {
                content: "first\nsecond".to_string(),
                font_size: 10.0,
            },
        );
        paint_stroke(&mut recorder, &stroke, 1.0);

        assert_eq!(recorder.text_lines.len(), 2);
        assert_eq!(recorder.text_lines[0].1, Point::new(10.0, 20.0));
        assert_eq!(recorder.text_lines[1].1, Point::new(10.0, 34.0));
    }

    #[test]
    fn test_layer_order_images_before_strokes() {
        let mut page = Page::new(400.0, 300.0);
        let layer_id = page.layers()[0].id;
        page.insert_image(ImageItem::new(
            layer_id,
            &[0u8; 2],
            inknote_core::model::ImageFormat::Png,
            0.0,
            0.0,
            50.0,
            50.0,
        ))
        .unwrap();
        page.insert_stroke(Stroke::new(
            layer_id,
            ToolKind::Pen,
            Rgba8::black(),
            2.0,
            1.0,
            vec![
                SamplePoint::new(0.0, 0.0, 0.5, 0),
                SamplePoint::new(10.0, 10.0, 0.5, 16),
            ],
        ))
        .unwrap();

        let mut recorder = Recorder::default();
        paint_page(&mut recorder, &page);
        assert_eq!(recorder.cleared, Some(Rgba8::white()));
        assert_eq!(recorder.images, 1);
        assert!(!recorder.strokes.is_empty());
    }

    #[test]
    fn test_hidden_layer_skipped() {
        let mut page = Page::new(400.0, 300.0);
        let layer_id = page.layers()[0].id;
        page.insert_stroke(Stroke::new(
            layer_id,
            ToolKind::Pen,
            Rgba8::black(),
            2.0,
            1.0,
            vec![
                SamplePoint::new(0.0, 0.0, 0.5, 0),
                SamplePoint::new(10.0, 10.0, 0.5, 16),
            ],
        ))
        .unwrap();
        page.layer_mut(layer_id).unwrap().visible = false;

        let mut recorder = Recorder::default();
        paint_page(&mut recorder, &page);
        assert!(recorder.strokes.is_empty());
    }

    #[test]
    fn test_overlay_selection_handles() {
        let mut recorder = Recorder::default();
        let overlay = Overlay {
            selection_bounds: Some(Rect::new(10.0, 10.0, 50.0, 50.0)),
            zoom: 1.0,
            ..Overlay::default()
        };
        paint_overlay(&mut recorder, &overlay);
        // Bounds outline + 4 handle outlines; 4 handle fills.
        assert_eq!(recorder.strokes.len(), 5);
        assert_eq!(recorder.fills, 4);
    }
}
