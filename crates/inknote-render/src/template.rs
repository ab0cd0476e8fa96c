//! Background template painting.
//!
//! Templates are regenerated from the page size on every paint and never
//! persisted; they live on their own surface below all layers.

use crate::target::{RenderTarget, StrokeStyle};
use inknote_core::model::{BlendMode, Rgba8, TemplateKind};
use kurbo::{BezPath, Circle, Point, Shape};

/// Light guide-line color shared by most templates.
pub const GUIDE_COLOR: Rgba8 = Rgba8::new(203, 213, 225, 255);
/// Stronger color for the cornell dividers.
pub const DIVIDER_COLOR: Rgba8 = Rgba8::new(148, 163, 184, 255);

const RULED_SPACING: f64 = 40.0;
const RULED_TOP_MARGIN: f64 = 80.0;
const GRID_SPACING: f64 = 32.0;
const DOT_SPACING: f64 = 32.0;
const DOT_RADIUS: f64 = 1.5;
const HEX_RADIUS: f64 = 24.0;
const STAFF_LINE_SPACING: f64 = 10.0;
const STAFF_GAP: f64 = 48.0;
const STAFF_TOP_MARGIN: f64 = 60.0;
const CORNELL_CUE_RATIO: f64 = 0.3;
const CORNELL_SUMMARY_RATIO: f64 = 0.22;
const ISO_SPACING: f64 = 28.0;

fn line(path: &mut BezPath, from: Point, to: Point) {
    path.move_to(from);
    path.line_to(to);
}

fn horizontal_lines(width: f64, top: f64, bottom: f64, spacing: f64) -> BezPath {
    let mut path = BezPath::new();
    let mut y = top;
    while y <= bottom {
        line(&mut path, Point::new(0.0, y), Point::new(width, y));
        y += spacing;
    }
    path
}

fn grid(width: f64, height: f64, spacing: f64) -> BezPath {
    let mut path = horizontal_lines(width, spacing, height, spacing);
    let mut x = spacing;
    while x <= width {
        line(&mut path, Point::new(x, 0.0), Point::new(x, height));
        x += spacing;
    }
    path
}

/// Honeycomb of flat-top hexagons covering the page.
fn hex_grid(width: f64, height: f64, radius: f64) -> BezPath {
    let mut path = BezPath::new();
    let hex_w = radius * 1.5;
    let hex_h = radius * 3.0_f64.sqrt();
    let mut row = 0;
    let mut cy = 0.0;
    while cy <= height + hex_h {
        let offset = if row % 2 == 0 { 0.0 } else { hex_w };
        let mut cx = offset;
        while cx <= width + hex_w * 2.0 {
            for i in 0..6 {
                let a0 = std::f64::consts::FRAC_PI_3 * i as f64;
                let a1 = std::f64::consts::FRAC_PI_3 * (i + 1) as f64;
                line(
                    &mut path,
                    Point::new(cx + radius * a0.cos(), cy + radius * a0.sin()),
                    Point::new(cx + radius * a1.cos(), cy + radius * a1.sin()),
                );
            }
            cx += hex_w * 2.0;
        }
        cy += hex_h / 2.0;
        row += 1;
    }
    path
}

/// Slanted guide lines at ±30° plus verticals.
fn isometric(width: f64, height: f64, spacing: f64) -> BezPath {
    let mut path = BezPath::new();
    let slope = (30.0_f64).to_radians().tan();
    let reach = width * slope;
    // Rising lines.
    let mut y = 0.0;
    while y <= height + reach {
        line(&mut path, Point::new(0.0, y), Point::new(width, y - reach));
        y += spacing;
    }
    // Falling lines.
    let mut y = -reach;
    while y <= height {
        line(&mut path, Point::new(0.0, y), Point::new(width, y + reach));
        y += spacing;
    }
    // Verticals.
    let mut x = 0.0;
    while x <= width {
        line(&mut path, Point::new(x, 0.0), Point::new(x, height));
        x += spacing;
    }
    path
}

fn staves(width: f64, height: f64) -> BezPath {
    let mut path = BezPath::new();
    let staff_height = STAFF_LINE_SPACING * 4.0;
    let mut top = STAFF_TOP_MARGIN;
    while top + staff_height <= height {
        for i in 0..5 {
            let y = top + i as f64 * STAFF_LINE_SPACING;
            line(&mut path, Point::new(0.0, y), Point::new(width, y));
        }
        top += staff_height + STAFF_GAP;
    }
    path
}

fn dots(target: &mut dyn RenderTarget, width: f64, height: f64) {
    let mut y = DOT_SPACING;
    while y <= height {
        let mut x = DOT_SPACING;
        while x <= width {
            let dot = Circle::new(Point::new(x, y), DOT_RADIUS).to_path(0.1);
            target.fill_path(&dot, GUIDE_COLOR, 1.0, BlendMode::Normal);
            x += DOT_SPACING;
        }
        y += DOT_SPACING;
    }
}

fn guide_style() -> StrokeStyle {
    StrokeStyle::new(GUIDE_COLOR, 1.0)
}

/// Paint the page's background template onto a target. Blank pages get
/// nothing beyond the background color the caller already cleared to.
pub fn paint_template(target: &mut dyn RenderTarget, kind: TemplateKind, width: f64, height: f64) {
    match kind {
        TemplateKind::Blank => {}
        TemplateKind::Ruled => {
            let path = horizontal_lines(width, RULED_TOP_MARGIN, height, RULED_SPACING);
            target.stroke_path(&path, &guide_style());
        }
        TemplateKind::Grid => {
            target.stroke_path(&grid(width, height, GRID_SPACING), &guide_style());
        }
        TemplateKind::Dotted => dots(target, width, height),
        TemplateKind::Hex => {
            target.stroke_path(&hex_grid(width, height, HEX_RADIUS), &guide_style());
        }
        TemplateKind::Music => {
            target.stroke_path(&staves(width, height), &StrokeStyle::new(DIVIDER_COLOR, 1.0));
        }
        TemplateKind::Cornell => {
            let path = horizontal_lines(width, RULED_TOP_MARGIN, height, RULED_SPACING);
            target.stroke_path(&path, &guide_style());
            let mut dividers = BezPath::new();
            let cue_x = width * CORNELL_CUE_RATIO;
            let summary_y = height * (1.0 - CORNELL_SUMMARY_RATIO);
            line(&mut dividers, Point::new(cue_x, 0.0), Point::new(cue_x, summary_y));
            line(
                &mut dividers,
                Point::new(0.0, summary_y),
                Point::new(width, summary_y),
            );
            target.stroke_path(&dividers, &StrokeStyle::new(DIVIDER_COLOR, 2.0));
        }
        TemplateKind::Isometric => {
            target.stroke_path(&isometric(width, height, ISO_SPACING), &guide_style());
        }
    }
}
