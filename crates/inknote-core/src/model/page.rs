//! Page and layer model.

use super::{ImageId, ImageItem, LayerId, PageId, Rgba8, Stroke, StrokeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Background pattern drawn behind all layers. Never persisted with strokes;
/// the renderer regenerates it from the page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    #[default]
    Blank,
    Ruled,
    Grid,
    Dotted,
    Hex,
    Music,
    Cornell,
    Isometric,
}

/// Structural model errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("a page must keep at least one layer")]
    LastLayer,
    #[error("unknown layer: {0}")]
    UnknownLayer(LayerId),
    #[error("layer is locked: {0}")]
    LayerLocked(LayerId),
}

/// An independently toggleable sub-surface of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    /// Stacking position, back to front.
    pub sort_order: u32,
    pub visible: bool,
    pub locked: bool,
    /// 0.0 = fully transparent, 1.0 = fully opaque.
    pub opacity: f64,
    pub strokes: Vec<Stroke>,
    pub images: Vec<ImageItem>,
}

impl Layer {
    pub fn new(name: impl Into<String>, sort_order: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            sort_order,
            visible: true,
            locked: false,
            opacity: 1.0,
            strokes: Vec::new(),
            images: Vec::new(),
        }
    }
}

/// One notebook page: fixed pixel size, a background template and an ordered
/// stack of layers. The engine owns exactly one full page at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub width: f64,
    pub height: f64,
    pub template: TemplateKind,
    pub background: Rgba8,
    layers: Vec<Layer>,
}

impl Page {
    /// Create a page with a single default layer.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            width,
            height,
            template: TemplateKind::default(),
            background: Rgba8::white(),
            layers: vec![Layer::new("Layer 1", 0)],
        }
    }

    /// Layers in stacking order, back to front.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    /// Add a new empty layer on top, returning its id.
    pub fn add_layer(&mut self, name: impl Into<String>) -> LayerId {
        let order = self.layers.iter().map(|l| l.sort_order + 1).max().unwrap_or(0);
        let layer = Layer::new(name, order);
        let id = layer.id;
        self.layers.push(layer);
        id
    }

    /// Remove a layer and everything on it. A page always keeps at least one
    /// layer; removing the last is rejected with no mutation.
    pub fn remove_layer(&mut self, id: LayerId) -> Result<Layer, ModelError> {
        if self.layers.len() <= 1 {
            return Err(ModelError::LastLayer);
        }
        let idx = self
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or(ModelError::UnknownLayer(id))?;
        Ok(self.layers.remove(idx))
    }

    /// Insert a stroke into its owning layer. Locked layers refuse edits.
    pub fn insert_stroke(&mut self, stroke: Stroke) -> Result<(), ModelError> {
        let layer = self
            .layer_mut(stroke.layer_id)
            .ok_or(ModelError::UnknownLayer(stroke.layer_id))?;
        if layer.locked {
            return Err(ModelError::LayerLocked(layer.id));
        }
        layer.strokes.push(stroke);
        Ok(())
    }

    /// Remove a stroke by id from whichever layer holds it.
    pub fn remove_stroke(&mut self, id: StrokeId) -> Option<Stroke> {
        for layer in &mut self.layers {
            if let Some(idx) = layer.strokes.iter().position(|s| s.id == id) {
                return Some(layer.strokes.remove(idx));
            }
        }
        None
    }

    pub fn stroke(&self, id: StrokeId) -> Option<&Stroke> {
        self.layers.iter().flat_map(|l| l.strokes.iter()).find(|s| s.id == id)
    }

    pub fn stroke_mut(&mut self, id: StrokeId) -> Option<&mut Stroke> {
        self.layers
            .iter_mut()
            .flat_map(|l| l.strokes.iter_mut())
            .find(|s| s.id == id)
    }

    /// Replace a stroke wholesale (edits never patch in place).
    pub fn replace_stroke(&mut self, stroke: Stroke) {
        if let Some(slot) = self.stroke_mut(stroke.id) {
            *slot = stroke;
        }
    }

    /// All strokes across layers, back-to-front.
    pub fn strokes(&self) -> impl Iterator<Item = &Stroke> {
        self.layers.iter().flat_map(|l| l.strokes.iter())
    }

    pub fn insert_image(&mut self, image: ImageItem) -> Result<(), ModelError> {
        let layer = self
            .layer_mut(image.layer_id)
            .ok_or(ModelError::UnknownLayer(image.layer_id))?;
        if layer.locked {
            return Err(ModelError::LayerLocked(layer.id));
        }
        layer.images.push(image);
        Ok(())
    }

    pub fn remove_image(&mut self, id: ImageId) -> Option<ImageItem> {
        for layer in &mut self.layers {
            if let Some(idx) = layer.images.iter().position(|i| i.id == id) {
                return Some(layer.images.remove(idx));
            }
        }
        None
    }

    pub fn image(&self, id: ImageId) -> Option<&ImageItem> {
        self.layers.iter().flat_map(|l| l.images.iter()).find(|i| i.id == id)
    }

    pub fn image_mut(&mut self, id: ImageId) -> Option<&mut ImageItem> {
        self.layers
            .iter_mut()
            .flat_map(|l| l.images.iter_mut())
            .find(|i| i.id == id)
    }

    /// All images across layers, back-to-front.
    pub fn images(&self) -> impl Iterator<Item = &ImageItem> {
        self.layers.iter().flat_map(|l| l.images.iter())
    }

    pub fn stroke_count(&self) -> usize {
        self.layers.iter().map(|l| l.strokes.len()).sum()
    }
}
