//! Drawing surface abstraction
//!
//! The render adapter never draws directly. It adds, updates and removes
//! retained primitives on a `Surface`, then asks it to present once per pass.
//! `Scene` is the in-memory surface; the browser canvas paints one.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use glam::Vec2;
use thiserror::Error;

use super::viewport::Viewport;

/// A host drawing resource could not be acquired
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("drawing surface unavailable: {0}")]
    Unavailable(String),
    #[error("failed to acquire drawing context: {0}")]
    Context(String),
}

/// Paint order, back to front
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Bucket,
    Fruits,
    Scorecard,
}

/// Shapes in logical coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Circle { center: Vec2, radius: f32, level: u8 },
    Rect { min: Vec2, size: Vec2, corner_radius: f32 },
    Text { anchor: Vec2, content: String },
}

impl Primitive {
    pub fn layer(&self) -> Layer {
        match self {
            Primitive::Circle { .. } => Layer::Fruits,
            Primitive::Rect { .. } => Layer::Bucket,
            Primitive::Text { .. } => Layer::Scorecard,
        }
    }
}

/// Handle to a primitive held by a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrimitiveId(u32);

/// Retained-mode drawing target
pub trait Surface {
    fn add(&mut self, primitive: Primitive) -> PrimitiveId;

    /// Replace a primitive; unknown ids are ignored
    fn update(&mut self, id: PrimitiveId, primitive: Primitive);

    fn remove(&mut self, id: PrimitiveId);

    /// Show the current primitives through `viewport`
    fn present(&mut self, viewport: &Viewport);
}

/// In-memory retained surface
#[derive(Debug, Clone, Default)]
pub struct Scene {
    primitives: BTreeMap<PrimitiveId, Primitive>,
    next_id: u32,
    updates: u64,
    presents: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PrimitiveId) -> Option<&Primitive> {
        self.primitives.get(&id)
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Primitives back to front; creation order within a layer
    pub fn painted(&self) -> Vec<&Primitive> {
        let mut items: Vec<(&PrimitiveId, &Primitive)> = self.primitives.iter().collect();
        items.sort_by_key(|(id, p)| (p.layer(), **id));
        items.into_iter().map(|(_, p)| p).collect()
    }

    /// Primitives on one layer, creation order
    pub fn layer(&self, layer: Layer) -> impl Iterator<Item = &Primitive> {
        self.primitives.values().filter(move |p| p.layer() == layer)
    }

    /// Content of the first text primitive
    pub fn text(&self) -> Option<&str> {
        self.primitives.values().find_map(|p| match p {
            Primitive::Text { content, .. } => Some(content.as_str()),
            _ => None,
        })
    }

    /// Number of `update` calls that changed something
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn presents(&self) -> u64 {
        self.presents
    }
}

impl Surface for Scene {
    fn add(&mut self, primitive: Primitive) -> PrimitiveId {
        let id = PrimitiveId(self.next_id);
        self.next_id += 1;
        self.primitives.insert(id, primitive);
        id
    }

    fn update(&mut self, id: PrimitiveId, primitive: Primitive) {
        if let Some(slot) = self.primitives.get_mut(&id) {
            if *slot != primitive {
                *slot = primitive;
                self.updates += 1;
            }
        }
    }

    fn remove(&mut self, id: PrimitiveId) {
        self.primitives.remove(&id);
    }

    fn present(&mut self, _viewport: &Viewport) {
        self.presents += 1;
    }
}

/// A scene the host keeps a handle to while the terminal draws into it
impl Surface for Rc<RefCell<Scene>> {
    fn add(&mut self, primitive: Primitive) -> PrimitiveId {
        self.borrow_mut().add(primitive)
    }

    fn update(&mut self, id: PrimitiveId, primitive: Primitive) {
        self.borrow_mut().update(id, primitive);
    }

    fn remove(&mut self, id: PrimitiveId) {
        self.borrow_mut().remove(id);
    }

    fn present(&mut self, viewport: &Viewport) {
        self.borrow_mut().present(viewport);
    }
}
