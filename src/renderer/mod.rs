//! Render and input adapter
//!
//! The `Terminal` node keeps retained primitives on a `Surface` in step with
//! the render snapshot, and turns host pointer input into gameplay requests
//! in logical coordinates. It only reads the game state.

#[cfg(target_arch = "wasm32")]
pub mod canvas;
pub mod surface;
pub mod viewport;

use std::collections::BTreeMap;

use glam::Vec2;

use crate::bus::{Context, Event, EventKind, Node};
use crate::consts::{BUCKET_OUTLINE_OUTSET, FRUIT_OUTLINE_INSET};
use crate::reconcile::{Dataset, Driver, Reconciler};
use crate::settings::Settings;
use crate::sim::{EntityKind, Fruit, GameState, Visual};

pub use crate::bus::{PointerInput, PointerPhase};
pub use surface::{Layer, Primitive, PrimitiveId, Scene, Surface, SurfaceError};
pub use viewport::Viewport;

/// Produces the drawing surface when the terminal activates
pub type SurfaceSource = Box<dyn FnMut() -> Result<Box<dyn Surface>, SurfaceError>>;

/// Snapshot family the render reconciler runs over
pub struct Visuals;

impl Dataset for Visuals {
    type Kind = EntityKind;
    type Item<'a> = Visual<'a>;
}

fn fruit_circle(fruit: &Fruit) -> Primitive {
    Primitive::Circle {
        center: fruit.position,
        radius: fruit.radius() - FRUIT_OUTLINE_INSET,
        level: fruit.level,
    }
}

struct FruitCircles;

impl Driver<Visuals, PrimitiveId, dyn Surface> for FruitCircles {
    fn matches(&self, kind: EntityKind) -> bool {
        kind == EntityKind::Fruit
    }

    fn attach(&mut self, item: &Visual<'_>, surface: &mut (dyn Surface + 'static)) -> Option<PrimitiveId> {
        let Visual::Fruit(fruit) = item else {
            return None;
        };
        Some(surface.add(fruit_circle(fruit)))
    }

    fn refresh(
        &mut self,
        item: &mut Visual<'_>,
        id: &mut PrimitiveId,
        surface: &mut (dyn Surface + 'static),
    ) {
        if let Visual::Fruit(fruit) = item {
            surface.update(*id, fruit_circle(fruit));
        }
    }

    fn detach(&mut self, id: PrimitiveId, surface: &mut (dyn Surface + 'static)) {
        surface.remove(id);
    }
}

/// Rounded frame slightly outside the walls; fixed once attached
struct BucketFrame;

impl Driver<Visuals, PrimitiveId, dyn Surface> for BucketFrame {
    fn matches(&self, kind: EntityKind) -> bool {
        kind == EntityKind::Bucket
    }

    fn attach(&mut self, item: &Visual<'_>, surface: &mut (dyn Surface + 'static)) -> Option<PrimitiveId> {
        let Visual::Bucket(bucket) = item else {
            return None;
        };
        let half = bucket.half_extents() + Vec2::splat(BUCKET_OUTLINE_OUTSET);
        Some(surface.add(Primitive::Rect {
            min: -half,
            size: half * 2.0,
            corner_radius: bucket.height / 50.0,
        }))
    }

    fn refresh(
        &mut self,
        _item: &mut Visual<'_>,
        _id: &mut PrimitiveId,
        _surface: &mut (dyn Surface + 'static),
    ) {
    }

    fn detach(&mut self, id: PrimitiveId, surface: &mut (dyn Surface + 'static)) {
        surface.remove(id);
    }
}

/// Score label above the bucket's top-left corner
struct ScoreText {
    anchor: Vec2,
    /// Score currently shown by each label
    shown: BTreeMap<PrimitiveId, u64>,
}

impl ScoreText {
    fn label(&self, score: u64) -> Primitive {
        Primitive::Text {
            anchor: self.anchor,
            content: score.to_string(),
        }
    }
}

impl Driver<Visuals, PrimitiveId, dyn Surface> for ScoreText {
    fn matches(&self, kind: EntityKind) -> bool {
        kind == EntityKind::Scorecard
    }

    fn attach(&mut self, item: &Visual<'_>, surface: &mut (dyn Surface + 'static)) -> Option<PrimitiveId> {
        let Visual::Scorecard(card) = item else {
            return None;
        };
        let id = surface.add(self.label(card.score));
        self.shown.insert(id, card.score);
        Some(id)
    }

    fn refresh(
        &mut self,
        item: &mut Visual<'_>,
        id: &mut PrimitiveId,
        surface: &mut (dyn Surface + 'static),
    ) {
        let Visual::Scorecard(card) = item else {
            return;
        };
        if self.shown.get(id) != Some(&card.score) {
            surface.update(*id, self.label(card.score));
            self.shown.insert(*id, card.score);
        }
    }

    fn detach(&mut self, id: PrimitiveId, surface: &mut (dyn Surface + 'static)) {
        self.shown.remove(&id);
        surface.remove(id);
    }
}

/// Render/input node
pub struct Terminal {
    source: SurfaceSource,
    /// None while inactive or when no surface could be acquired
    surface: Option<Box<dyn Surface>>,
    visuals: Reconciler<Visuals, PrimitiveId, dyn Surface>,
    viewport: Viewport,
    listening: bool,
    pointer_down: bool,
}

impl Terminal {
    pub fn new(settings: &Settings, source: SurfaceSource) -> Self {
        let anchor = Vec2::new(
            -settings.bucket_width / 2.0 + 0.5,
            -settings.bucket_height / 2.0 - 1.0,
        );
        let visuals = Reconciler::new()
            .with_driver(FruitCircles)
            .with_driver(BucketFrame)
            .with_driver(ScoreText {
                anchor,
                shown: BTreeMap::new(),
            });
        let viewport = Viewport::fit(
            settings.bucket_width,
            settings.bucket_height,
            settings.bucket_width,
            settings.bucket_height,
        );
        Self {
            source,
            surface: None,
            visuals,
            viewport,
            listening: false,
            pointer_down: false,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    fn activate(&mut self) {
        match (self.source)() {
            Ok(surface) => {
                log::debug!("Drawing surface ready");
                self.surface = Some(surface);
            }
            Err(e) => {
                log::error!("Rendering disabled: {}", e);
                self.surface = None;
            }
        }
        self.listening = true;
    }

    fn deactivate(&mut self) {
        if let Some(surface) = self.surface.as_deref_mut() {
            self.visuals.clear(surface);
            surface.present(&self.viewport);
        }
        self.surface = None;
        self.listening = false;
        self.pointer_down = false;
    }

    /// Reconcile primitives against the current state and present
    pub fn render(&mut self, state: &GameState) {
        let Some(surface) = self.surface.as_deref_mut() else {
            return;
        };
        self.visuals.reconcile(state.render_snapshot(), surface);
        surface.present(&self.viewport);
    }

    /// Translate pointer input into a gameplay request
    pub fn pointer(&mut self, input: PointerInput, state: &GameState) -> Option<Event> {
        if !self.listening {
            return None;
        }
        let point = self.viewport.to_logical(input.position);
        match input.phase {
            PointerPhase::Down => {
                self.pointer_down = true;
                Some(Event::RepositionPendingFruit(point))
            }
            PointerPhase::Move => {
                if !self.pointer_down || state.pending.is_none() {
                    return None;
                }
                Some(Event::RepositionPendingFruit(point))
            }
            PointerPhase::Up => {
                self.pointer_down = false;
                Some(Event::DropPendingFruit(point))
            }
        }
    }
}

impl Node<GameState> for Terminal {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[
            EventKind::Activate,
            EventKind::Deactivate,
            EventKind::FrameTick,
            EventKind::StateChanged,
            EventKind::Pointer,
            EventKind::HostResize,
        ]
    }

    fn handle(&mut self, event: &Event, cx: &mut Context<GameState>) {
        match event {
            Event::Activate => self.activate(),
            Event::Deactivate => self.deactivate(),
            Event::FrameTick { .. } | Event::StateChanged => self.render(&cx.state),
            Event::Pointer(input) => {
                if let Some(request) = self.pointer(*input, &cx.state) {
                    cx.emit(request);
                }
            }
            Event::HostResize { width, height } => self.viewport.resize(*width, *height),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::sim::{Bucket, Scorecard};

    fn shared_source() -> (Rc<RefCell<Scene>>, SurfaceSource) {
        let scene = Rc::new(RefCell::new(Scene::new()));
        let handle = scene.clone();
        let source: SurfaceSource = Box::new(move || Ok(Box::new(handle.clone()) as Box<dyn Surface>));
        (scene, source)
    }

    fn failing_source() -> SurfaceSource {
        Box::new(|| Err(SurfaceError::Unavailable("no canvas".into())))
    }

    fn state() -> GameState {
        let mut state = GameState::new(Bucket::new(12.0, 20.0));
        state.scorecard = Some(Scorecard::new());
        state.fruits.push(Fruit::new(1, Vec2::new(-2.0, 5.0)));
        state.fruits.push(Fruit::new(3, Vec2::new(2.0, 6.0)));
        state.pending = Some(Fruit::new(2, Vec2::new(0.0, -8.0)));
        state
    }

    fn active_terminal() -> (Rc<RefCell<Scene>>, Terminal, Context<GameState>) {
        let (scene, source) = shared_source();
        let mut terminal = Terminal::new(&Settings::default(), source);
        let mut cx = Context::new(state());
        terminal.handle(&Event::Activate, &mut cx);
        (scene, terminal, cx)
    }

    #[test]
    fn test_first_render_draws_everything() {
        let (scene, mut terminal, mut cx) = active_terminal();
        terminal.handle(&Event::FrameTick { dt_ms: 16.0 }, &mut cx);

        let scene = scene.borrow();
        assert_eq!(scene.layer(Layer::Fruits).count(), 3);
        assert_eq!(scene.layer(Layer::Bucket).count(), 1);
        assert_eq!(scene.text(), Some("0"));
        assert_eq!(scene.presents(), 1);

        match scene.layer(Layer::Bucket).next().unwrap() {
            Primitive::Rect {
                min,
                size,
                corner_radius,
            } => {
                assert!((*min - Vec2::new(-6.06, -10.06)).length() < 1e-4);
                assert!((*size - Vec2::new(12.12, 20.12)).length() < 1e-4);
                assert!((corner_radius - 0.4).abs() < 1e-6);
            }
            other => panic!("unexpected {:?}", other),
        }
        let first = scene.layer(Layer::Fruits).next().unwrap();
        match first {
            Primitive::Circle { center, radius, level } => {
                assert_eq!(*center, Vec2::new(-2.0, 5.0));
                assert_eq!(*level, 1);
                assert!((radius - (crate::fruit_radius(1) - 0.06)).abs() < 1e-6);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_drivers_run_on_boxed_surface() {
        let mut visuals: Reconciler<Visuals, PrimitiveId, dyn Surface> = Reconciler::new()
            .with_driver(FruitCircles)
            .with_driver(BucketFrame);
        let scene = Rc::new(RefCell::new(Scene::new()));
        let mut surface: Box<dyn Surface> = Box::new(scene.clone());
        let state = state();

        visuals.reconcile(state.render_snapshot(), surface.as_mut());
        // Scorecard has no driver here and stays unbound
        assert_eq!(visuals.len(), 4);
        assert_eq!(scene.borrow().layer(Layer::Fruits).count(), 3);
        assert_eq!(scene.borrow().layer(Layer::Bucket).count(), 1);

        visuals.clear(surface.as_mut());
        assert!(scene.borrow().is_empty());
    }

    #[test]
    fn test_removed_fruit_disappears() {
        let (scene, mut terminal, mut cx) = active_terminal();
        terminal.render(&cx.state);
        cx.state.fruits.remove(0);
        terminal.render(&cx.state);
        assert_eq!(scene.borrow().layer(Layer::Fruits).count(), 2);
    }

    #[test]
    fn test_score_text_changes_only_with_score() {
        let (scene, mut terminal, mut cx) = active_terminal();
        terminal.render(&cx.state);
        let before = scene.borrow().updates();

        // Nothing moved, nothing changed
        terminal.render(&cx.state);
        assert_eq!(scene.borrow().updates(), before);

        cx.state.scorecard.as_mut().unwrap().score = 7;
        terminal.render(&cx.state);
        assert_eq!(scene.borrow().text(), Some("7"));
        assert_eq!(scene.borrow().updates(), before + 1);
    }

    #[test]
    fn test_moved_fruit_updates_circle() {
        let (scene, mut terminal, mut cx) = active_terminal();
        terminal.render(&cx.state);
        cx.state.fruits[0].position = Vec2::new(-2.0, 7.0);
        terminal.render(&cx.state);
        let scene = scene.borrow();
        let moved = scene.layer(Layer::Fruits).next().unwrap();
        assert!(matches!(moved, Primitive::Circle { center, .. } if *center == Vec2::new(-2.0, 7.0)));
    }

    #[test]
    fn test_pointer_rules() {
        let (_, mut terminal, mut cx) = active_terminal();
        let vp = *terminal.viewport();
        let host = vp.to_host(Vec2::new(3.0, 0.0));

        // Move before any press
        let hover = PointerInput::new(PointerPhase::Move, host.x, host.y);
        assert_eq!(terminal.pointer(hover, &cx.state), None);

        let down = PointerInput::new(PointerPhase::Down, host.x, host.y);
        match terminal.pointer(down, &cx.state) {
            Some(Event::RepositionPendingFruit(p)) => assert!((p - Vec2::new(3.0, 0.0)).length() < 1e-4),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            terminal.pointer(hover, &cx.state),
            Some(Event::RepositionPendingFruit(_))
        ));

        // Dragging with nothing to place
        let pending = cx.state.pending.take();
        assert_eq!(terminal.pointer(hover, &cx.state), None);
        cx.state.pending = pending;

        let up = PointerInput::new(PointerPhase::Up, host.x, host.y);
        assert!(matches!(terminal.pointer(up, &cx.state), Some(Event::DropPendingFruit(_))));
        assert_eq!(terminal.pointer(hover, &cx.state), None);
    }

    #[test]
    fn test_pointer_handler_emits_request() {
        let (_, mut terminal, mut cx) = active_terminal();
        terminal.handle(&Event::Pointer(PointerInput::new(PointerPhase::Up, 10.0, 10.0)), &mut cx);
        let emitted = cx.drain();
        assert_eq!(emitted.len(), 1);
        assert!(matches!(emitted[0], Event::DropPendingFruit(_)));
    }

    #[test]
    fn test_deactivate_detaches_and_stops_listening() {
        let (scene, mut terminal, mut cx) = active_terminal();
        terminal.render(&cx.state);
        assert_eq!(scene.borrow().len(), 5);

        terminal.handle(&Event::Deactivate, &mut cx);
        assert!(scene.borrow().is_empty());
        assert!(!terminal.has_surface());
        let down = PointerInput::new(PointerPhase::Down, 1.0, 1.0);
        assert_eq!(terminal.pointer(down, &cx.state), None);

        // Reactivating draws from scratch
        terminal.handle(&Event::Activate, &mut cx);
        terminal.render(&cx.state);
        assert_eq!(scene.borrow().len(), 5);
    }

    #[test]
    fn test_missing_surface_runs_headless() {
        let mut terminal = Terminal::new(&Settings::default(), failing_source());
        let mut cx = Context::new(state());
        terminal.handle(&Event::Activate, &mut cx);
        assert!(!terminal.has_surface());

        terminal.handle(&Event::FrameTick { dt_ms: 16.0 }, &mut cx);
        terminal.handle(&Event::Pointer(PointerInput::new(PointerPhase::Up, 0.0, 0.0)), &mut cx);
        assert_eq!(cx.drain().len(), 1);
    }

    #[test]
    fn test_resize_changes_pointer_mapping() {
        let (_, mut terminal, mut cx) = active_terminal();
        terminal.handle(
            &Event::HostResize {
                width: 140.0,
                height: 240.0,
            },
            &mut cx,
        );
        let down = PointerInput::new(PointerPhase::Down, 70.0, 120.0);
        match terminal.pointer(down, &cx.state) {
            Some(Event::RepositionPendingFruit(p)) => assert!((p - Vec2::new(0.0, -1.0)).length() < 1e-4),
            other => panic!("unexpected {:?}", other),
        }
    }
}
