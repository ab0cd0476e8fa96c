//! Stroke model: sampled pen paths and two-point shape primitives.

use super::{LayerId, Rgba8, StrokeId};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tools selectable in the editor.
///
/// The drawing subset doubles as the persisted stroke kind. `Eraser`,
/// `Select`, `Lasso` and `Pan` never appear on a committed stroke: erasure
/// removes strokes outright and selection is transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Pen,
    Pencil,
    Marker,
    Highlighter,
    Eraser,
    Text,
    Line,
    Rect,
    Circle,
    Arrow,
    Select,
    Lasso,
    Pan,
}

impl ToolKind {
    /// Tools whose gesture produces a committed stroke.
    pub fn is_drawing(self) -> bool {
        matches!(
            self,
            ToolKind::Pen
                | ToolKind::Pencil
                | ToolKind::Marker
                | ToolKind::Highlighter
                | ToolKind::Line
                | ToolKind::Rect
                | ToolKind::Circle
                | ToolKind::Arrow
        )
    }

    /// Freehand tools that capture every pointer sample.
    pub fn is_freehand(self) -> bool {
        matches!(
            self,
            ToolKind::Pen | ToolKind::Pencil | ToolKind::Marker | ToolKind::Highlighter
        )
    }

    /// Two-point primitives whose commit keeps only start and end.
    pub fn is_shape(self) -> bool {
        matches!(
            self,
            ToolKind::Line | ToolKind::Rect | ToolKind::Circle | ToolKind::Arrow
        )
    }

    /// Kinds that may be persisted on a stroke.
    pub fn is_persistable(self) -> bool {
        self.is_drawing() || self == ToolKind::Text
    }
}

/// Compositing mode for a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Normal,
    /// Used by the highlighter so overlapping marks darken instead of stack.
    Multiply,
}

/// One pointer sample on a stroke path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    /// Stylus pressure in [0, 1]; 0.5 when the device reports none.
    pub pressure: f64,
    pub timestamp_ms: u64,
}

impl SamplePoint {
    pub fn new(x: f64, y: f64, pressure: f64, timestamp_ms: u64) -> Self {
        Self {
            x,
            y,
            pressure: pressure.clamp(0.0, 1.0),
            timestamp_ms,
        }
    }

    pub fn pos(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Translate the sample by a delta.
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

/// Tool-specific payload, keyed by the stroke kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrokeExtra {
    #[default]
    None,
    /// Text tool: content anchored at the first sample point.
    Text { content: String, font_size: f64 },
    /// Shape tools: optional fill color.
    Shape { fill: Option<Rgba8> },
}

/// A single persisted mark: a sampled path plus style.
///
/// Strokes are immutable once committed except for position (move/resize)
/// and are replaced wholesale on every edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: StrokeId,
    pub layer_id: LayerId,
    pub kind: ToolKind,
    pub color: Rgba8,
    /// Base width in page units; per-segment width is pressure-scaled.
    pub width: f64,
    pub opacity: f64,
    pub blend: BlendMode,
    pub points: Vec<SamplePoint>,
    /// Axis-aligned bounding box; always exactly bounds `points`.
    pub bbox: Rect,
    #[serde(default)]
    pub extra: StrokeExtra,
}

impl Stroke {
    /// Build a stroke from captured samples. The bounding box is computed
    /// from the points; an empty sample list yields a zero rect.
    pub fn new(
        layer_id: LayerId,
        kind: ToolKind,
        color: Rgba8,
        width: f64,
        opacity: f64,
        points: Vec<SamplePoint>,
    ) -> Self {
        debug_assert!(kind.is_persistable(), "non-persistable stroke kind");
        let blend = if kind == ToolKind::Highlighter {
            BlendMode::Multiply
        } else {
            BlendMode::Normal
        };
        let bbox = crate::geometry::bbox(&points);
        Self {
            id: Uuid::new_v4(),
            layer_id,
            kind,
            color,
            width,
            opacity,
            blend,
            points,
            bbox,
            extra: StrokeExtra::None,
        }
    }

    pub fn with_extra(mut self, extra: StrokeExtra) -> Self {
        self.extra = extra;
        self
    }

    /// Recompute the bounding box after the points changed.
    pub fn update_bbox(&mut self) {
        self.bbox = crate::geometry::bbox(&self.points);
    }

    /// Translate every sample and the bounding box.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        for p in &mut self.points {
            p.x += dx;
            p.y += dy;
        }
        self.bbox = self.bbox + kurbo::Vec2::new(dx, dy);
    }

    /// Give the stroke a fresh identity (for paste/duplicate).
    pub fn regenerate_id(&mut self) {
        self.id = Uuid::new_v4();
    }

    /// True if any sample lies within `radius` of `point` (eraser test).
    pub fn hit_by_circle(&self, point: Point, radius: f64) -> bool {
        let r2 = radius * radius;
        self.points.iter().any(|p| {
            let dx = p.x - point.x;
            let dy = p.y - point.y;
            dx * dx + dy * dy <= r2
        })
    }

    /// Validation applied to persisted data on load: at least one sample,
    /// all coordinates finite.
    pub fn is_well_formed(&self) -> bool {
        !self.points.is_empty()
            && self
                .points
                .iter()
                .all(|p| p.x.is_finite() && p.y.is_finite() && p.pressure.is_finite())
    }
}
