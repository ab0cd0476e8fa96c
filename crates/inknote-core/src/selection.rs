//! Selection: hit-testing, lasso/rubber-band collection and group transform.

use crate::geometry::{point_in_polygon, point_to_segment_dist};
use crate::model::{ImageId, ImageItem, Page, Stroke, StrokeId};
use kurbo::{Point, Rect, Vec2};

/// Corner handle hit radius in screen pixels; divide by zoom for page units.
pub const HANDLE_HIT_RADIUS: f64 = 12.0;
/// Click-on-stroke slop in page units, added to the stroke's own width.
pub const STROKE_HIT_TOLERANCE: f64 = 6.0;
/// A drag under this (per axis, page units) is a deselect click, not a move.
pub const NEGLIGIBLE_MOVE: f64 = 2.0;
/// Offset applied to pasted/duplicated items so copies never overlap exactly.
pub const PASTE_OFFSET: Vec2 = Vec2::new(14.0, 14.0);

/// Corner handles of the selection bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    pub fn position(self, bounds: Rect) -> Point {
        match self {
            Corner::TopLeft => Point::new(bounds.x0, bounds.y0),
            Corner::TopRight => Point::new(bounds.x1, bounds.y0),
            Corner::BottomLeft => Point::new(bounds.x0, bounds.y1),
            Corner::BottomRight => Point::new(bounds.x1, bounds.y1),
        }
    }

    /// The fixed anchor during a resize from this corner.
    pub fn opposite(self) -> Corner {
        match self {
            Corner::TopLeft => Corner::BottomRight,
            Corner::TopRight => Corner::BottomLeft,
            Corner::BottomLeft => Corner::TopRight,
            Corner::BottomRight => Corner::TopLeft,
        }
    }
}

/// Transient set of selected stroke/image ids. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub stroke_ids: Vec<StrokeId>,
    pub image_ids: Vec<ImageId>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.stroke_ids.is_empty() && self.image_ids.is_empty()
    }

    pub fn single_stroke(id: StrokeId) -> Self {
        Self {
            stroke_ids: vec![id],
            image_ids: Vec::new(),
        }
    }

    pub fn single_image(id: ImageId) -> Self {
        Self {
            stroke_ids: Vec::new(),
            image_ids: vec![id],
        }
    }

    /// Union bounding box of all selected items, or `None` when nothing
    /// selected or every id has since vanished from the page.
    pub fn bounds(&self, page: &Page) -> Option<Rect> {
        let mut rect: Option<Rect> = None;
        let mut extend = |r: Rect| {
            rect = Some(match rect {
                Some(acc) => acc.union(r),
                None => r,
            });
        };
        for id in &self.stroke_ids {
            if let Some(s) = page.stroke(*id) {
                extend(s.bbox);
            }
        }
        for id in &self.image_ids {
            if let Some(i) = page.image(*id) {
                extend(i.rect());
            }
        }
        rect
    }

    /// Which corner handle (if any) is under `point`. The hit radius shrinks
    /// as the camera zooms in so handles stay finger-sized on screen.
    pub fn hit_handle(&self, page: &Page, point: Point, zoom: f64) -> Option<Corner> {
        let bounds = self.bounds(page)?;
        let radius = HANDLE_HIT_RADIUS / zoom.max(f64::EPSILON);
        Corner::ALL.into_iter().find(|c| {
            let pos = c.position(bounds);
            (point - pos).hypot() <= radius
        })
    }

    pub fn contains_point(&self, page: &Page, point: Point) -> bool {
        self.bounds(page).is_some_and(|b| b.contains(point))
    }
}

/// Free-form lasso membership: a stroke is in if any sample point falls
/// inside the polygon; an image is in if its center is inside, or any lasso
/// vertex lands inside the image rectangle (a large image can swallow a
/// small lasso entirely).
pub fn lasso_select(page: &Page, polygon: &[Point]) -> Selection {
    let mut selection = Selection::default();
    if polygon.len() < 3 {
        return selection;
    }
    for stroke in page.strokes() {
        if stroke.points.iter().any(|p| point_in_polygon(p.pos(), polygon)) {
            selection.stroke_ids.push(stroke.id);
        }
    }
    for image in page.images() {
        let rect = image.rect();
        if point_in_polygon(image.center(), polygon)
            || polygon.iter().any(|v| rect.contains(*v))
        {
            selection.image_ids.push(image.id);
        }
    }
    selection
}

/// Rubber-band membership: fully-contained bounding box only.
pub fn rect_select(page: &Page, band: Rect) -> Selection {
    let band = band.abs();
    let mut selection = Selection::default();
    for stroke in page.strokes() {
        if band.contains_rect(stroke.bbox) {
            selection.stroke_ids.push(stroke.id);
        }
    }
    for image in page.images() {
        if band.contains_rect(image.rect()) {
            selection.image_ids.push(image.id);
        }
    }
    selection
}

/// Click-without-drag pick: the topmost image wins over any stroke; failing
/// that, the topmost stroke whose path passes near the point.
pub fn click_select(page: &Page, point: Point) -> Selection {
    if let Some(image) = page.images().filter(|i| i.rect().contains(point)).last() {
        return Selection::single_image(image.id);
    }
    for stroke in page.strokes().collect::<Vec<_>>().into_iter().rev() {
        if stroke_hit(stroke, point) {
            return Selection::single_stroke(stroke.id);
        }
    }
    Selection::default()
}

fn stroke_hit(stroke: &Stroke, point: Point) -> bool {
    let tolerance = stroke.width.max(STROKE_HIT_TOLERANCE);
    if !stroke.bbox.inflate(tolerance, tolerance).contains(point) {
        return false;
    }
    if stroke.points.len() == 1 {
        return (point - stroke.points[0].pos()).hypot() <= tolerance;
    }
    stroke
        .points
        .windows(2)
        .any(|w| point_to_segment_dist(point, w[0].pos(), w[1].pos()) <= tolerance)
}

/// Whether the selection is dragged as a whole or resized from a corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    Move,
    Resize(Corner),
}

/// Frozen originals captured at gesture start. Every frame recomputes the
/// transformed items from these, never from the previous frame, so rounding
/// cannot compound.
#[derive(Debug, Clone)]
pub struct TransformSnapshot {
    pub mode: TransformMode,
    pub start: Point,
    pub bounds: Rect,
    strokes: Vec<Stroke>,
    images: Vec<ImageItem>,
}

impl TransformSnapshot {
    pub fn capture(
        page: &Page,
        selection: &Selection,
        mode: TransformMode,
        start: Point,
    ) -> Option<Self> {
        let bounds = selection.bounds(page)?;
        let strokes = selection
            .stroke_ids
            .iter()
            .filter_map(|id| page.stroke(*id).cloned())
            .collect();
        let images = selection
            .image_ids
            .iter()
            .filter_map(|id| page.image(*id).cloned())
            .collect();
        Some(Self {
            mode,
            start,
            bounds,
            strokes,
            images,
        })
    }

    /// The transformed items for the current pointer position, computed from
    /// the snapshot basis.
    pub fn apply(&self, current: Point) -> (Vec<Stroke>, Vec<ImageItem>) {
        match self.mode {
            TransformMode::Move => self.apply_move(current - self.start),
            TransformMode::Resize(corner) => self.apply_resize(corner, current),
        }
    }

    fn apply_move(&self, delta: Vec2) -> (Vec<Stroke>, Vec<ImageItem>) {
        let strokes = self
            .strokes
            .iter()
            .map(|s| {
                let mut s = s.clone();
                s.translate(delta.x, delta.y);
                s
            })
            .collect();
        let images = self
            .images
            .iter()
            .map(|i| {
                let mut i = i.clone();
                i.translate(delta.x, delta.y);
                i
            })
            .collect();
        (strokes, images)
    }

    fn apply_resize(&self, corner: Corner, current: Point) -> (Vec<Stroke>, Vec<ImageItem>) {
        let anchor = corner.opposite().position(self.bounds);
        let grabbed = corner.position(self.bounds);
        let orig = grabbed - anchor;
        let now = current - anchor;
        // Degenerate extents (a perfectly horizontal group) keep scale 1.
        let scale_x = if orig.x.abs() < f64::EPSILON { 1.0 } else { now.x / orig.x };
        let scale_y = if orig.y.abs() < f64::EPSILON { 1.0 } else { now.y / orig.y };

        let map = |p: Point| {
            Point::new(
                anchor.x + (p.x - anchor.x) * scale_x,
                anchor.y + (p.y - anchor.y) * scale_y,
            )
        };

        let strokes = self
            .strokes
            .iter()
            .map(|s| {
                let mut s = s.clone();
                for sample in &mut s.points {
                    let p = map(sample.pos());
                    sample.x = p.x;
                    sample.y = p.y;
                }
                s.update_bbox();
                s
            })
            .collect();
        let images = self
            .images
            .iter()
            .map(|i| {
                let mut i = i.clone();
                let r = i.rect();
                let a = map(Point::new(r.x0, r.y0));
                let b = map(Point::new(r.x1, r.y1));
                let r = Rect::from_points(a, b);
                i.x = r.x0;
                i.y = r.y0;
                i.width = r.width();
                i.height = r.height();
                i
            })
            .collect();
        (strokes, images)
    }

    /// True when the drag never left the click slop; treated as a deselect
    /// click with no persistence.
    pub fn is_negligible(&self, current: Point) -> bool {
        matches!(self.mode, TransformMode::Move)
            && (current.x - self.start.x).abs() < NEGLIGIBLE_MOVE
            && (current.y - self.start.y).abs() < NEGLIGIBLE_MOVE
    }
}

/// Clipboard payload: detached copies of the selected items.
#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    pub strokes: Vec<Stroke>,
    pub images: Vec<ImageItem>,
}

impl Clipboard {
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.images.is_empty()
    }

    pub fn copy_from(page: &Page, selection: &Selection) -> Self {
        Self {
            strokes: selection
                .stroke_ids
                .iter()
                .filter_map(|id| page.stroke(*id).cloned())
                .collect(),
            images: selection
                .image_ids
                .iter()
                .filter_map(|id| page.image(*id).cloned())
                .collect(),
        }
    }

    /// Materialize the clipboard as fresh items: new ids, offset position.
    pub fn paste_items(&self) -> (Vec<Stroke>, Vec<ImageItem>) {
        let strokes = self
            .strokes
            .iter()
            .map(|s| {
                let mut s = s.clone();
                s.regenerate_id();
                s.translate(PASTE_OFFSET.x, PASTE_OFFSET.y);
                s
            })
            .collect();
        let images = self
            .images
            .iter()
            .map(|i| {
                let mut i = i.clone();
                i.regenerate_id();
                i.translate(PASTE_OFFSET.x, PASTE_OFFSET.y);
                i
            })
            .collect();
        (strokes, images)
    }
}
