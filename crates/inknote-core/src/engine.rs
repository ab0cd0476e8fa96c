//! The drawing session: one open page, its tools, viewport, selection,
//! history and sync state, driven by host input events.
//!
//! Everything runs on the host's single event thread; the only suspension
//! points are the store round-trips. Nothing here is fatal: a failing store
//! keeps the session interactive and re-queues its work.

use crate::camera::{Camera, Inertia, PinchSnapshot};
use crate::clock::{Clock, SystemClock};
use crate::history::{Command, CommandKind, History};
use crate::input::{InputAction, InputMachine, PointerId, PointerInput};
use crate::model::{
    ImageFormat, ImageItem, ImageId, LayerId, ModelError, Page, Rgba8, SamplePoint, Stroke,
    StrokeExtra, ToolKind,
};
use crate::selection::{
    Clipboard, Selection, TransformMode, TransformSnapshot, click_select, lasso_select,
    rect_select,
};
use crate::store::{PageStore, StoreResult};
use crate::sync::{SyncQueue, SyncStatus};
use kurbo::{Point, Rect, Vec2};

/// Default eraser radius in page units.
pub const DEFAULT_ERASER_RADIUS: f64 = 12.0;

/// Queued image mutations; images persist through their own endpoints
/// rather than the stroke upsert batch.
#[derive(Debug, Clone)]
enum ImageOp {
    Create(ImageItem),
    UpdateRect(ImageId, Rect),
    Delete(ImageId),
}

/// Current brush settings applied to newly committed strokes.
#[derive(Debug, Clone)]
pub struct BrushStyle {
    pub color: Rgba8,
    pub width: f64,
    pub opacity: f64,
}

impl Default for BrushStyle {
    fn default() -> Self {
        Self {
            color: Rgba8::black(),
            width: 2.0,
            opacity: 1.0,
        }
    }
}

/// The session object. Owns the page graph exclusively for the lifetime of
/// one open page.
pub struct Engine {
    page: Page,
    active_layer: LayerId,
    tool: ToolKind,
    pub brush: BrushStyle,
    pub eraser_radius: f64,
    camera: Camera,
    input: InputMachine,
    history: History,
    selection: Selection,
    transform: Option<TransformSnapshot>,
    band: Option<(Point, Point)>,
    clipboard: Clipboard,
    sync: SyncQueue,
    image_ops: Vec<ImageOp>,
    inertia: Option<Inertia>,
    pinch: Option<PinchSnapshot>,
    /// Strokes destroyed by the current erase drag; becomes one delete
    /// command when the drag lifts.
    erased: Vec<Stroke>,
    text_anchor: Option<Point>,
    thumbnail_dirty: bool,
    clock: Box<dyn Clock>,
}

impl Engine {
    pub fn new(page: Page) -> Self {
        Self::with_clock(page, Box::new(SystemClock::new()))
    }

    pub fn with_clock(page: Page, clock: Box<dyn Clock>) -> Self {
        let active_layer = page.layers()[0].id;
        Self {
            page,
            active_layer,
            tool: ToolKind::Pen,
            brush: BrushStyle::default(),
            eraser_radius: DEFAULT_ERASER_RADIUS,
            camera: Camera::new(),
            input: InputMachine::new(),
            history: History::new(),
            selection: Selection::default(),
            transform: None,
            band: None,
            clipboard: Clipboard::default(),
            sync: SyncQueue::new(),
            image_ops: Vec::new(),
            inertia: None,
            pinch: None,
            erased: Vec::new(),
            text_anchor: None,
            thumbnail_dirty: false,
            clock,
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync.status()
    }

    pub fn active_layer(&self) -> LayerId {
        self.active_layer
    }

    /// Activate a layer for new strokes. Unknown ids are refused.
    pub fn set_active_layer(&mut self, id: LayerId) -> bool {
        if self.page.layer(id).is_some() {
            self.active_layer = id;
            true
        } else {
            false
        }
    }

    /// Switching tools aborts any gesture in progress (nothing persists)
    /// and drops the selection.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if tool == self.tool {
            return;
        }
        self.input.abort();
        self.erased.clear();
        self.clear_selection();
        self.text_anchor = None;
        self.tool = tool;
    }

    pub fn set_palm_rejection(&mut self, enabled: bool) {
        self.input.palm_rejection = enabled;
    }

    pub fn set_pressure_enabled(&mut self, enabled: bool) {
        self.input.pressure_enabled = enabled;
    }

    pub fn set_space_held(&mut self, held: bool) {
        self.input.set_space_held(held);
    }

    /// Escape key: drop the selection and any live transform.
    pub fn clear_selection(&mut self) {
        self.selection = Selection::default();
        self.transform = None;
        self.band = None;
    }

    // -- pointer events ----------------------------------------------------

    pub fn pointer_down(&mut self, input: &PointerInput) {
        // Touching the canvas kills any coasting pan.
        self.inertia = None;
        let action = self.input.on_pointer_down(input, self.tool, &self.camera);
        self.handle(action);
    }

    pub fn pointer_move(&mut self, input: &PointerInput) {
        let action = self.input.on_pointer_move(input, &self.camera);
        self.handle(action);
    }

    pub fn pointer_up(&mut self, input: &PointerInput) {
        let action = self.input.on_pointer_up(input, &self.camera);
        self.handle(action);
    }

    pub fn pointer_cancel(&mut self, id: PointerId) {
        let action = self.input.on_pointer_cancel(id);
        self.handle(action);
    }

    fn handle(&mut self, action: InputAction) {
        match action {
            InputAction::None
            | InputAction::StrokeStarted
            | InputAction::StrokeUpdated
            | InputAction::StrokeCancelled
            | InputAction::PanStarted
            | InputAction::LassoUpdated => {}
            InputAction::StrokeCommitted { tool, points } => self.commit_stroke(tool, points),
            InputAction::EraseAt(point) => self.erase_at(point),
            InputAction::EraseEnded => self.finish_erase(),
            InputAction::TextAt(point) => self.text_anchor = Some(point),
            InputAction::PanBy(delta) => self.camera.pan(delta),
            InputAction::PanEnded { velocity } => {
                self.inertia = velocity.map(Inertia::from_release);
            }
            InputAction::PinchStarted { midpoint, distance } => {
                self.pinch = Some(self.camera.pinch_snapshot(midpoint, distance));
            }
            InputAction::PinchUpdated { midpoint, distance } => {
                if let Some(snapshot) = self.pinch {
                    self.camera.apply_pinch(&snapshot, midpoint, distance);
                }
            }
            InputAction::PinchEnded => self.pinch = None,
            InputAction::SelectPressed(point) => self.select_pressed(point),
            InputAction::SelectDragged(point) => self.select_dragged(point),
            InputAction::SelectReleased(point) => self.select_released(point),
            InputAction::LassoReleased(polygon) => {
                self.selection = lasso_select(&self.page, &polygon);
            }
        }
    }

    // -- stroke commit -----------------------------------------------------

    fn commit_stroke(&mut self, tool: ToolKind, points: Vec<SamplePoint>) {
        let stroke = Stroke::new(
            self.active_layer,
            tool,
            self.brush.color,
            self.brush.width,
            self.brush.opacity,
            points,
        );
        let stroke = if tool.is_shape() {
            stroke.with_extra(StrokeExtra::Shape { fill: None })
        } else {
            stroke
        };
        self.insert_committed(vec![stroke]);
    }

    /// Open a text block at the anchor set by the last text-tool tap.
    pub fn commit_text(&mut self, content: &str, font_size: f64) {
        let Some(anchor) = self.text_anchor.take() else {
            return;
        };
        if content.trim().is_empty() {
            return;
        }
        let (w, h) = crate::geometry::text_block_size(content, font_size);
        let points = vec![
            SamplePoint::new(anchor.x, anchor.y, 1.0, self.clock.now_ms()),
            SamplePoint::new(anchor.x + w, anchor.y + h, 1.0, self.clock.now_ms()),
        ];
        let stroke = Stroke::new(
            self.active_layer,
            ToolKind::Text,
            self.brush.color,
            self.brush.width,
            self.brush.opacity,
            points,
        )
        .with_extra(StrokeExtra::Text {
            content: content.to_string(),
            font_size,
        });
        self.insert_committed(vec![stroke]);
    }

    fn insert_committed(&mut self, strokes: Vec<Stroke>) {
        let now = self.clock.now_ms();
        let mut inserted = Vec::with_capacity(strokes.len());
        for stroke in strokes {
            match self.page.insert_stroke(stroke.clone()) {
                Ok(()) => {
                    self.sync.schedule_upsert(stroke.clone(), now);
                    inserted.push(stroke);
                }
                Err(err) => log::warn!("dropping stroke {}: {err}", stroke.id),
            }
        }
        if !inserted.is_empty() {
            self.history.record(Command::add(inserted));
        }
    }

    // -- eraser ------------------------------------------------------------

    fn erase_at(&mut self, point: Point) {
        let hits: Vec<_> = self
            .page
            .layers()
            .iter()
            .filter(|l| l.visible && !l.locked)
            .flat_map(|l| l.strokes.iter())
            .filter(|s| s.hit_by_circle(point, self.eraser_radius))
            .map(|s| s.id)
            .collect();
        let now = self.clock.now_ms();
        for id in hits {
            if let Some(stroke) = self.page.remove_stroke(id) {
                self.sync.schedule_delete(id, now);
                self.erased.push(stroke);
            }
        }
    }

    fn finish_erase(&mut self) {
        let erased = std::mem::take(&mut self.erased);
        if !erased.is_empty() {
            self.history.record(Command::delete(erased));
        }
    }

    // -- selection ---------------------------------------------------------

    fn select_pressed(&mut self, point: Point) {
        if let Some(corner) = self.selection.hit_handle(&self.page, point, self.camera.zoom) {
            self.transform = TransformSnapshot::capture(
                &self.page,
                &self.selection,
                TransformMode::Resize(corner),
                point,
            );
        } else if self.selection.contains_point(&self.page, point) {
            self.transform = TransformSnapshot::capture(
                &self.page,
                &self.selection,
                TransformMode::Move,
                point,
            );
        } else {
            // Outside the selection: clear it and start a rubber band.
            self.selection = Selection::default();
            self.band = Some((point, point));
        }
    }

    fn select_dragged(&mut self, point: Point) {
        if let Some(snapshot) = &self.transform {
            let (strokes, images) = snapshot.apply(point);
            self.apply_transformed(strokes, images);
        } else if let Some(band) = &mut self.band {
            band.1 = point;
        }
    }

    fn select_released(&mut self, point: Point) {
        if let Some(snapshot) = self.transform.take() {
            if snapshot.is_negligible(point) {
                // A click, not a move: restore originals and deselect.
                let (strokes, images) = snapshot.apply(snapshot.start);
                self.apply_transformed(strokes, images);
                self.selection = Selection::default();
                return;
            }
            let (strokes, images) = snapshot.apply(point);
            let now = self.clock.now_ms();
            for stroke in &strokes {
                self.sync.schedule_upsert(stroke.clone(), now);
            }
            for image in &images {
                self.queue_image_op(ImageOp::UpdateRect(image.id, image.rect()));
            }
            self.apply_transformed(strokes, images);
        } else if let Some((start, _)) = self.band.take() {
            let negligible = (point.x - start.x).abs() < crate::selection::NEGLIGIBLE_MOVE
                && (point.y - start.y).abs() < crate::selection::NEGLIGIBLE_MOVE;
            self.selection = if negligible {
                click_select(&self.page, point)
            } else {
                rect_select(&self.page, Rect::from_points(start, point))
            };
        }
    }

    fn apply_transformed(&mut self, strokes: Vec<Stroke>, images: Vec<ImageItem>) {
        for stroke in strokes {
            self.page.replace_stroke(stroke);
        }
        for image in images {
            if let Some(slot) = self.page.image_mut(image.id) {
                *slot = image;
            }
        }
    }

    /// Live rubber-band rectangle for the overlay surface.
    pub fn rubber_band(&self) -> Option<Rect> {
        self.band.map(|(a, b)| Rect::from_points(a, b))
    }

    /// In-progress stroke for the live preview surface.
    pub fn live_stroke(&self) -> Option<(ToolKind, &[SamplePoint])> {
        self.input.live_stroke()
    }

    /// In-progress lasso polygon for the overlay surface.
    pub fn live_lasso(&self) -> Option<&[Point]> {
        self.input.live_lasso()
    }

    // -- clipboard ---------------------------------------------------------

    pub fn copy_selection(&mut self) {
        if !self.selection.is_empty() {
            self.clipboard = Clipboard::copy_from(&self.page, &self.selection);
        }
    }

    /// Paste the clipboard as fresh items on the active layer, offset so
    /// they never land exactly on the originals. The pasted items become
    /// the new selection.
    pub fn paste(&mut self) {
        if self.clipboard.is_empty() {
            return;
        }
        let (mut strokes, mut images) = self.clipboard.paste_items();
        for stroke in &mut strokes {
            stroke.layer_id = self.active_layer;
        }
        for image in &mut images {
            image.layer_id = self.active_layer;
        }
        let mut selection = Selection {
            stroke_ids: strokes.iter().map(|s| s.id).collect(),
            image_ids: images.iter().map(|i| i.id).collect(),
        };
        self.insert_committed(strokes);
        for image in images {
            match self.page.insert_image(image.clone()) {
                Ok(()) => self.queue_image_op(ImageOp::Create(image)),
                Err(err) => {
                    log::warn!("dropping pasted image {}: {err}", image.id);
                    selection.image_ids.retain(|id| *id != image.id);
                }
            }
        }
        self.selection = selection;
    }

    pub fn duplicate_selection(&mut self) {
        self.copy_selection();
        self.paste();
    }

    /// Delete everything selected: one delete command for the strokes,
    /// independent ops for the images.
    pub fn delete_selection(&mut self) {
        let selection = std::mem::take(&mut self.selection);
        self.transform = None;
        let now = self.clock.now_ms();
        let mut removed = Vec::new();
        for id in selection.stroke_ids {
            if let Some(stroke) = self.page.remove_stroke(id) {
                self.sync.schedule_delete(id, now);
                removed.push(stroke);
            }
        }
        if !removed.is_empty() {
            self.history.record(Command::delete(removed));
        }
        for id in selection.image_ids {
            if self.page.remove_image(id).is_some() {
                self.queue_image_op(ImageOp::Delete(id));
            }
        }
    }

    // -- images ------------------------------------------------------------

    /// Place a new image on the active layer.
    pub fn insert_image(
        &mut self,
        data: &[u8],
        format: ImageFormat,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<ImageId, ModelError> {
        let image = ImageItem::new(self.active_layer, data, format, x, y, width, height);
        let id = image.id;
        self.page.insert_image(image.clone())?;
        self.queue_image_op(ImageOp::Create(image));
        Ok(id)
    }

    fn queue_image_op(&mut self, op: ImageOp) {
        self.image_ops.push(op);
        self.sync.restart_debounce(self.clock.now_ms());
    }

    // -- layers ------------------------------------------------------------

    pub fn add_layer(&mut self, name: impl Into<String>) -> LayerId {
        let id = self.page.add_layer(name);
        self.active_layer = id;
        id
    }

    /// Remove a layer and schedule the remote deletion of its contents.
    /// Not undoable.
    pub fn remove_layer(&mut self, id: LayerId) -> Result<(), ModelError> {
        let layer = self.page.remove_layer(id)?;
        let now = self.clock.now_ms();
        for stroke in layer.strokes {
            self.sync.schedule_delete(stroke.id, now);
        }
        for image in layer.images {
            self.queue_image_op(ImageOp::Delete(image.id));
        }
        if self.active_layer == id {
            self.active_layer = self.page.layers()[0].id;
        }
        self.clear_selection();
        Ok(())
    }

    // -- history -----------------------------------------------------------

    /// Undo the last edit. The structural inverse is applied locally and
    /// mirrored to the store through the sync queue.
    pub fn undo(&mut self) -> bool {
        let Some(command) = self.history.undo() else {
            return false;
        };
        self.apply_inverse(command);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(command) = self.history.redo() else {
            return false;
        };
        self.apply_inverse(command);
        true
    }

    /// Apply the inverse of a recorded command: undoing an add removes the
    /// strokes, undoing a delete re-inserts them.
    fn apply_inverse(&mut self, command: Command) {
        let now = self.clock.now_ms();
        match command.kind {
            CommandKind::Add => {
                for stroke in command.strokes {
                    if self.page.remove_stroke(stroke.id).is_some() {
                        self.sync.schedule_delete(stroke.id, now);
                    }
                }
            }
            CommandKind::Delete => {
                for stroke in command.strokes {
                    match self.page.insert_stroke(stroke.clone()) {
                        Ok(()) => self.sync.schedule_upsert(stroke, now),
                        Err(err) => log::warn!("cannot restore stroke {}: {err}", stroke.id),
                    }
                }
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // -- viewport ----------------------------------------------------------

    /// Wheel/keyboard zoom about a focal screen point.
    pub fn zoom_at(&mut self, focal: Point, factor: f64) {
        self.inertia = None;
        self.camera.zoom_at(focal, factor);
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.inertia = None;
        self.camera.pan(delta);
    }

    /// Advance one animation frame. Returns true while the inertial pan is
    /// still moving and another frame should be requested.
    pub fn step_animation(&mut self) -> bool {
        if let Some(inertia) = &mut self.inertia {
            match inertia.step() {
                Some(delta) => {
                    self.camera.pan(delta);
                    return true;
                }
                None => self.inertia = None,
            }
        }
        false
    }

    // -- persistence -------------------------------------------------------

    /// Timer tick: flush if the debounce interval elapsed.
    pub async fn flush_if_due(&mut self, store: &dyn PageStore) -> StoreResult<()> {
        if self.sync.due(self.clock.now_ms()) {
            self.force_flush(store).await
        } else {
            Ok(())
        }
    }

    /// Flush now, bypassing the debounce timer. A success marks the page
    /// thumbnail stale so the host can re-render and upload it.
    pub async fn force_flush(&mut self, store: &dyn PageStore) -> StoreResult<()> {
        let page_id = self.page.id;
        let result = self.sync.flush(store, page_id).await;
        if let Err(err) = result {
            self.sync.restart_debounce(self.clock.now_ms());
            return Err(err);
        }
        self.flush_image_ops(store).await?;
        self.thumbnail_dirty = true;
        Ok(())
    }

    async fn flush_image_ops(&mut self, store: &dyn PageStore) -> StoreResult<()> {
        let ops = std::mem::take(&mut self.image_ops);
        let page_id = self.page.id;
        let mut iter = ops.into_iter();
        while let Some(op) = iter.next() {
            let result = match op.clone() {
                ImageOp::Create(image) => store.create_image(page_id, image).await.map(|_| ()),
                ImageOp::UpdateRect(id, rect) => store.update_image_rect(id, rect).await,
                ImageOp::Delete(id) => store.delete_image(id).await,
            };
            if let Err(err) = result {
                // Re-queue this op and the rest for the next flush.
                self.image_ops.push(op);
                self.image_ops.extend(iter);
                self.sync.mark_failed(self.clock.now_ms());
                return Err(err);
            }
        }
        Ok(())
    }

    /// True after a successful flush until the host uploads a fresh
    /// thumbnail via [`PageStore::update_page_thumbnail`].
    pub fn thumbnail_dirty(&self) -> bool {
        self.thumbnail_dirty
    }

    pub fn thumbnail_saved(&mut self) {
        self.thumbnail_dirty = false;
    }

    /// Replace the open page wholesale: the previous graph, pending edits
    /// and any in-flight gesture are discarded (cancelled, not flushed),
    /// then the new page is seeded from the store. Malformed persisted
    /// strokes are logged and dropped rather than poisoning the page.
    pub async fn load_page(&mut self, store: &dyn PageStore, mut page: Page) -> StoreResult<()> {
        self.input.abort();
        self.sync.clear();
        self.image_ops.clear();
        self.history.clear();
        self.selection = Selection::default();
        self.transform = None;
        self.band = None;
        self.inertia = None;
        self.pinch = None;
        self.erased.clear();
        self.text_anchor = None;

        let strokes = store.list_strokes(page.id, None).await?;
        for stroke in strokes {
            if !stroke.is_well_formed() {
                log::warn!("dropping malformed persisted stroke {}", stroke.id);
                continue;
            }
            match page.layer_mut(stroke.layer_id) {
                // Bypass the lock check: loading is not an edit.
                Some(layer) => layer.strokes.push(stroke),
                None => log::warn!("dropping stroke {} on unknown layer", stroke.id),
            }
        }
        let images = store.list_images(page.id).await?;
        for image in images {
            match page.layer_mut(image.layer_id) {
                Some(layer) => layer.images.push(image),
                None => log::warn!("dropping image {} on unknown layer", image.id),
            }
        }

        self.active_layer = page.layers()[0].id;
        self.page = page;
        self.camera.reset();
        Ok(())
    }

    /// Close the page: any in-flight gesture is cancelled, then everything
    /// pending is force-flushed. The page is only safely closed once this
    /// returns Ok.
    pub async fn close_page(&mut self, store: &dyn PageStore) -> StoreResult<()> {
        self.input.abort();
        self.erased.clear();
        self.force_flush(store).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::input::PointerKind;
    use crate::store::{FlakyStore, MemoryStore, block_on};

    fn engine() -> (Engine, ManualClock) {
        let _ = env_logger::builder().is_test(true).try_init();
        let clock = ManualClock::new();
        let engine = Engine::with_clock(Page::new(800.0, 600.0), Box::new(clock.clone()));
        (engine, clock)
    }

    fn pen(id: u64, x: f64, y: f64, pressure: f64, ts: u64) -> PointerInput {
        PointerInput::new(id, PointerKind::Pen, Point::new(x, y), ts).with_pressure(pressure)
    }

    fn draw(engine: &mut Engine, from: (f64, f64, f64), to: (f64, f64, f64)) {
        engine.pointer_down(&pen(1, from.0, from.1, from.2, 0));
        engine.pointer_move(&pen(1, to.0, to.1, to.2, 16));
        engine.pointer_up(&pen(1, to.0, to.1, to.2, 32));
    }

    #[test]
    fn test_pen_stroke_commit_and_persist() {
        let (mut engine, _clock) = engine();
        draw(&mut engine, (10.0, 10.0, 0.5), (50.0, 50.0, 0.8));

        assert_eq!(engine.page().stroke_count(), 1);
        let stroke = engine.page().strokes().next().unwrap();
        assert_eq!(stroke.kind, ToolKind::Pen);
        assert_eq!(stroke.bbox, Rect::new(10.0, 10.0, 50.0, 50.0));

        let store = MemoryStore::new();
        block_on(engine.force_flush(&store)).unwrap();
        assert_eq!(store.stroke_count(engine.page().id), 1);
        assert!(engine.thumbnail_dirty());
        assert_eq!(engine.sync_status(), SyncStatus::Synced);
    }

    #[test]
    fn test_n_commits_n_undos_unwind() {
        let (mut engine, _clock) = engine();
        for i in 0..5 {
            let base = i as f64 * 30.0;
            draw(&mut engine, (base, base, 0.5), (base + 10.0, base + 10.0, 0.5));
        }
        assert_eq!(engine.page().stroke_count(), 5);

        for _ in 0..5 {
            assert!(engine.undo());
        }
        assert_eq!(engine.page().stroke_count(), 0);
        assert!(!engine.can_undo());
    }

    #[test]
    fn test_undo_redo_round_trip_identity() {
        let (mut engine, _clock) = engine();
        draw(&mut engine, (10.0, 10.0, 0.5), (40.0, 40.0, 0.7));
        let original = engine.page().strokes().next().unwrap().clone();

        engine.undo();
        assert_eq!(engine.page().stroke_count(), 0);
        engine.redo();
        let restored = engine.page().strokes().next().unwrap();
        assert_eq!(*restored, original);
    }

    #[test]
    fn test_eraser_drag_removes_and_undo_restores() {
        let (mut engine, _clock) = engine();
        draw(&mut engine, (10.0, 10.0, 0.5), (30.0, 30.0, 0.5));
        draw(&mut engine, (200.0, 200.0, 0.5), (230.0, 230.0, 0.5));

        engine.set_tool(ToolKind::Eraser);
        engine.pointer_down(&pen(1, 10.0, 10.0, 0.5, 100));
        engine.pointer_up(&pen(1, 10.0, 10.0, 0.5, 120));

        // Only the stroke within the radius is gone.
        assert_eq!(engine.page().stroke_count(), 1);
        assert!(engine.undo());
        assert_eq!(engine.page().stroke_count(), 2);
    }

    #[test]
    fn test_rubber_band_fully_contained_only() {
        let (mut engine, _clock) = engine();
        draw(&mut engine, (10.0, 10.0, 0.5), (30.0, 30.0, 0.5));
        draw(&mut engine, (90.0, 90.0, 0.5), (140.0, 140.0, 0.5));
        let inside_id = engine.page().strokes().next().unwrap().id;

        engine.set_tool(ToolKind::Select);
        engine.pointer_down(&pen(1, 0.0, 0.0, 0.5, 200));
        engine.pointer_move(&pen(1, 100.0, 100.0, 0.5, 216));
        engine.pointer_up(&pen(1, 100.0, 100.0, 0.5, 232));

        assert_eq!(engine.selection().stroke_ids, vec![inside_id]);
    }

    #[test]
    fn test_palm_touch_pans_instead_of_drawing() {
        let (mut engine, _clock) = engine();
        let touch = |x: f64, y: f64, ts: u64| {
            PointerInput::new(7, PointerKind::Touch, Point::new(x, y), ts)
        };
        engine.pointer_down(&touch(100.0, 100.0, 0));
        engine.pointer_move(&touch(130.0, 120.0, 16));
        engine.pointer_up(&touch(130.0, 120.0, 32));

        assert_eq!(engine.page().stroke_count(), 0);
        assert_eq!(engine.camera().offset, Vec2::new(30.0, 20.0));
    }

    #[test]
    fn test_selection_move_persists_and_negligible_deselects() {
        let (mut engine, _clock) = engine();
        draw(&mut engine, (10.0, 10.0, 0.5), (30.0, 30.0, 0.5));

        engine.set_tool(ToolKind::Select);
        // Band-select it.
        engine.pointer_down(&pen(1, 0.0, 0.0, 0.5, 100));
        engine.pointer_move(&pen(1, 40.0, 40.0, 0.5, 116));
        engine.pointer_up(&pen(1, 40.0, 40.0, 0.5, 132));
        assert_eq!(engine.selection().stroke_ids.len(), 1);

        // Drag the interior by (10, 10).
        engine.pointer_down(&pen(1, 20.0, 20.0, 0.5, 200));
        engine.pointer_move(&pen(1, 30.0, 30.0, 0.5, 216));
        engine.pointer_up(&pen(1, 30.0, 30.0, 0.5, 232));
        let stroke = engine.page().strokes().next().unwrap();
        assert_eq!(stroke.bbox, Rect::new(20.0, 20.0, 40.0, 40.0));
        assert!(!engine.selection().is_empty());

        // A sub-2px wiggle on the interior is a deselect click.
        engine.pointer_down(&pen(1, 30.0, 30.0, 0.5, 300));
        engine.pointer_move(&pen(1, 31.0, 30.5, 0.5, 316));
        engine.pointer_up(&pen(1, 31.0, 30.5, 0.5, 332));
        assert!(engine.selection().is_empty());
        // And the stroke did not move.
        let stroke = engine.page().strokes().next().unwrap();
        assert_eq!(stroke.bbox, Rect::new(20.0, 20.0, 40.0, 40.0));
    }

    #[test]
    fn test_paste_offsets_and_selects_copies() {
        let (mut engine, _clock) = engine();
        draw(&mut engine, (10.0, 10.0, 0.5), (30.0, 30.0, 0.5));
        let original_id = engine.page().strokes().next().unwrap().id;

        engine.set_tool(ToolKind::Select);
        engine.pointer_down(&pen(1, 0.0, 0.0, 0.5, 100));
        engine.pointer_move(&pen(1, 40.0, 40.0, 0.5, 116));
        engine.pointer_up(&pen(1, 40.0, 40.0, 0.5, 132));

        engine.copy_selection();
        engine.paste();

        assert_eq!(engine.page().stroke_count(), 2);
        let pasted_id = engine.selection().stroke_ids[0];
        assert_ne!(pasted_id, original_id);
        let pasted = engine.page().stroke(pasted_id).unwrap();
        assert_eq!(pasted.bbox, Rect::new(24.0, 24.0, 44.0, 44.0));
    }

    #[test]
    fn test_debounced_flush_waits_for_interval() {
        let (mut engine, clock) = engine();
        draw(&mut engine, (10.0, 10.0, 0.5), (30.0, 30.0, 0.5));

        let store = MemoryStore::new();
        clock.advance(500);
        block_on(engine.flush_if_due(&store)).unwrap();
        assert_eq!(store.stroke_count(engine.page().id), 0);

        clock.advance(600);
        block_on(engine.flush_if_due(&store)).unwrap();
        assert_eq!(store.stroke_count(engine.page().id), 1);
    }

    #[test]
    fn test_failed_flush_keeps_session_interactive() {
        let (mut engine, _clock) = engine();
        draw(&mut engine, (10.0, 10.0, 0.5), (30.0, 30.0, 0.5));

        let store = FlakyStore::new(MemoryStore::new(), 1);
        assert!(block_on(engine.force_flush(&store)).is_err());
        assert_eq!(engine.sync_status(), SyncStatus::Failed);

        // Still drawing happily while saves fail.
        draw(&mut engine, (50.0, 50.0, 0.5), (70.0, 70.0, 0.5));
        assert_eq!(engine.page().stroke_count(), 2);

        block_on(engine.close_page(&store)).unwrap();
        assert_eq!(store.inner().stroke_count(engine.page().id), 2);
    }

    #[test]
    fn test_image_save_failure_surfaces_failed_status() {
        let (mut engine, _clock) = engine();
        engine
            .insert_image(&[1, 2, 3], ImageFormat::Png, 10.0, 10.0, 50.0, 50.0)
            .unwrap();

        let store = FlakyStore::new(MemoryStore::new(), 1);
        assert!(block_on(engine.force_flush(&store)).is_err());
        assert_eq!(engine.sync_status(), SyncStatus::Failed);

        // The retry clears the failure.
        block_on(engine.force_flush(&store)).unwrap();
        assert_eq!(engine.sync_status(), SyncStatus::Synced);
    }

    #[test]
    fn test_load_page_drops_malformed_strokes() {
        let (mut engine, _clock) = engine();
        let store = MemoryStore::new();
        let page = Page::new(800.0, 600.0);
        let layer = page.layers()[0].id;

        let good = Stroke::new(
            layer,
            ToolKind::Pen,
            Rgba8::black(),
            2.0,
            1.0,
            vec![
                SamplePoint::new(1.0, 1.0, 0.5, 0),
                SamplePoint::new(5.0, 5.0, 0.5, 16),
            ],
        );
        let empty = Stroke::new(layer, ToolKind::Pen, Rgba8::black(), 2.0, 1.0, Vec::new());
        let mut nan = good.clone();
        nan.regenerate_id();
        nan.points[0].x = f64::NAN;
        store.seed_strokes(page.id, vec![good.clone(), empty, nan]);

        block_on(engine.load_page(&store, page)).unwrap();
        assert_eq!(engine.page().stroke_count(), 1);
        assert_eq!(engine.page().strokes().next().unwrap().id, good.id);
    }

    #[test]
    fn test_tool_switch_cancels_gesture_and_selection() {
        let (mut engine, _clock) = engine();
        engine.pointer_down(&pen(1, 10.0, 10.0, 0.5, 0));
        engine.pointer_move(&pen(1, 30.0, 30.0, 0.5, 16));
        engine.set_tool(ToolKind::Select);
        // The half-finished stroke is discarded, not committed.
        assert_eq!(engine.page().stroke_count(), 0);
        assert!(engine.live_stroke().is_none());
    }

    #[test]
    fn test_inertia_steps_then_stops() {
        let (mut engine, _clock) = engine();
        let touch = |x: f64, ts: u64| {
            PointerInput::new(7, PointerKind::Touch, Point::new(x, 100.0), ts)
        };
        engine.pointer_down(&touch(100.0, 0));
        engine.pointer_move(&touch(150.0, 16));
        engine.pointer_move(&touch(220.0, 32));
        engine.pointer_up(&touch(220.0, 40));

        let before = engine.camera().offset;
        let mut frames = 0;
        while engine.step_animation() {
            frames += 1;
            assert!(frames < 1000);
        }
        assert!(frames > 0);
        assert!(engine.camera().offset.x > before.x);
    }

    #[test]
    fn test_remove_layer_schedules_stroke_deletes() {
        let (mut engine, _clock) = engine();
        let second = engine.add_layer("Layer 2");
        assert_eq!(engine.active_layer(), second);
        draw(&mut engine, (10.0, 10.0, 0.5), (30.0, 30.0, 0.5));

        let store = MemoryStore::new();
        block_on(engine.force_flush(&store)).unwrap();
        assert_eq!(store.stroke_count(engine.page().id), 1);

        engine.remove_layer(second).unwrap();
        assert_eq!(engine.active_layer(), engine.page().layers()[0].id);
        block_on(engine.force_flush(&store)).unwrap();
        assert_eq!(store.stroke_count(engine.page().id), 0);
    }
}
