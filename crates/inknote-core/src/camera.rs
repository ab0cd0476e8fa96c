//! Viewport controller: zoom/pan/pinch transform math and pan inertia.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Minimum allowed zoom level.
pub const MIN_ZOOM: f64 = 0.05;
/// Maximum allowed zoom level.
pub const MAX_ZOOM: f64 = 10.0;

/// Per-frame friction applied to inertial pan velocity.
pub const INERTIA_FRICTION: f64 = 0.96;
/// Inertia stops once both axis velocities fall under this (px/frame).
pub const INERTIA_STOP_THRESHOLD: f64 = 0.1;
/// Minimum release speed (px/ms) that starts inertia.
pub const INERTIA_START_SPEED: f64 = 0.3;
/// A release older than this since the last move gets no inertia.
pub const INERTIA_MAX_AGE_MS: u64 = 100;

/// Frozen state captured when a two-finger gesture starts. Every subsequent
/// move recomputes scale and offset from this snapshot rather than
/// incrementally, so missed or reordered events cannot accumulate drift.
#[derive(Debug, Clone, Copy)]
pub struct PinchSnapshot {
    pub offset: Vec2,
    pub zoom: f64,
    pub midpoint: Point,
    pub finger_distance: f64,
}

/// The camera projects page coordinates to screen coordinates. It never
/// mutates the page model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    /// Screen-space translation.
    pub offset: Vec2,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a screen point to page coordinates.
    pub fn screen_to_page(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.offset.x) / self.zoom,
            (screen.y - self.offset.y) / self.zoom,
        )
    }

    /// Convert a page point to screen coordinates.
    pub fn page_to_screen(&self, page: Point) -> Point {
        Point::new(
            page.x * self.zoom + self.offset.x,
            page.y * self.zoom + self.offset.y,
        )
    }

    /// Pan by a screen-space delta.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Zoom by `factor`, keeping the page point under `focal` fixed on screen:
    /// `offset' = focal - (focal - offset) * zoom_new / zoom_old`.
    pub fn zoom_at(&mut self, focal: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        let ratio = new_zoom / self.zoom;
        self.offset = Vec2::new(
            focal.x - (focal.x - self.offset.x) * ratio,
            focal.y - (focal.y - self.offset.y) * ratio,
        );
        self.zoom = new_zoom;
    }

    /// Snapshot the current state for a two-finger gesture.
    pub fn pinch_snapshot(&self, midpoint: Point, finger_distance: f64) -> PinchSnapshot {
        PinchSnapshot {
            offset: self.offset,
            zoom: self.zoom,
            midpoint,
            finger_distance: finger_distance.max(f64::EPSILON),
        }
    }

    /// Recompute zoom and offset from the gesture-start snapshot:
    /// `offset' = mid_now - (mid_start - offset_start) * r` with
    /// `r = distance_now / distance_start`, clamped so zoom stays in range.
    pub fn apply_pinch(&mut self, snapshot: &PinchSnapshot, midpoint: Point, finger_distance: f64) {
        let raw = finger_distance.max(f64::EPSILON) / snapshot.finger_distance;
        let zoom = (snapshot.zoom * raw).clamp(MIN_ZOOM, MAX_ZOOM);
        let r = zoom / snapshot.zoom;
        self.zoom = zoom;
        self.offset = Vec2::new(
            midpoint.x - (snapshot.midpoint.x - snapshot.offset.x) * r,
            midpoint.y - (snapshot.midpoint.y - snapshot.offset.y) * r,
        );
    }

    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.zoom = 1.0;
    }
}

/// Rolling velocity estimate for a pan gesture (Δposition / Δtime).
#[derive(Debug, Clone, Default)]
pub struct VelocityTracker {
    last: Option<(u64, Point)>,
    /// Screen px per millisecond.
    velocity: Vec2,
    last_move_ms: u64,
}

impl VelocityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, now_ms: u64, pos: Point) {
        if let Some((t, p)) = self.last {
            let dt = now_ms.saturating_sub(t) as f64;
            if dt > 0.0 {
                // Light smoothing: average with the previous estimate.
                let v = Vec2::new((pos.x - p.x) / dt, (pos.y - p.y) / dt);
                self.velocity = Vec2::new(
                    (self.velocity.x + v.x) / 2.0,
                    (self.velocity.y + v.y) / 2.0,
                );
            }
        }
        self.last = Some((now_ms, pos));
        self.last_move_ms = now_ms;
    }

    /// Velocity in px/ms at release, or `None` when the gesture was stale
    /// or too slow to earn inertia.
    pub fn release(&self, now_ms: u64) -> Option<Vec2> {
        if now_ms.saturating_sub(self.last_move_ms) > INERTIA_MAX_AGE_MS {
            return None;
        }
        if self.velocity.hypot() < INERTIA_START_SPEED {
            return None;
        }
        Some(self.velocity)
    }
}

/// Friction-decayed pan animation after a gesture release.
#[derive(Debug, Clone, Copy)]
pub struct Inertia {
    /// Screen px per animation frame.
    velocity: Vec2,
}

impl Inertia {
    /// Start from a release velocity in px/ms, assuming ~60fps frames.
    pub fn from_release(velocity_px_per_ms: Vec2) -> Self {
        Self {
            velocity: velocity_px_per_ms * 16.0,
        }
    }

    /// Advance one animation frame. Returns the pan delta to apply, or
    /// `None` once both axis velocities fell under the stop threshold.
    pub fn step(&mut self) -> Option<Vec2> {
        if self.velocity.x.abs() < INERTIA_STOP_THRESHOLD
            && self.velocity.y.abs() < INERTIA_STOP_THRESHOLD
        {
            return None;
        }
        let delta = self.velocity;
        self.velocity *= INERTIA_FRICTION;
        Some(delta)
    }
}
