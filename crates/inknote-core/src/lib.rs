//! Inknote Core Library
//!
//! Host-agnostic drawing engine for the Inknote notebook: input gesture
//! resolution, the page/layer/stroke model, selection and transform,
//! undo/redo, viewport math and debounced persistence.

pub mod camera;
pub mod clock;
pub mod engine;
pub mod geometry;
pub mod history;
pub mod input;
pub mod model;
pub mod selection;
pub mod store;
pub mod sync;

pub use camera::Camera;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::Engine;
pub use history::{Command, CommandKind, History};
pub use input::{InputAction, InputMachine, PointerId, PointerInput, PointerKind};
pub use model::{
    ImageFormat, ImageItem, Layer, Page, Rgba8, SamplePoint, Stroke, StrokeExtra, ToolKind,
};
pub use selection::{Clipboard, Selection, TransformMode, TransformSnapshot};
pub use store::{MemoryStore, PageStore, StoreError, StoreResult};
pub use sync::{SyncQueue, SyncStatus};
