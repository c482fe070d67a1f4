//! Composition root
//!
//! `Main` is the root node: it owns nothing but the session start timer.
//! Its children (frame clock, gameplay, physics, terminal) share one bus and
//! one `GameState`. `App` is what a host holds: it forwards refresh
//! callbacks, pointer input and resizes onto the bus.

use std::cell::RefCell;
use std::rc::Rc;

use crate::bus::{Bus, Context, Event, EventKind, Node};
use crate::clock::FrameClock;
use crate::physics::Physics;
use crate::renderer::{PointerInput, Scene, Surface, SurfaceSource, Terminal};
use crate::settings::Settings;
use crate::sim::{Bucket, GameState, Gameplay};

/// Root node; starts the first session once the start delay has elapsed
pub struct Main {
    delay_ms: f64,
    waited_ms: f64,
    started: bool,
}

impl Main {
    pub fn new(delay_ms: f64) -> Self {
        Self {
            delay_ms,
            waited_ms: 0.0,
            started: false,
        }
    }
}

impl Node<GameState> for Main {
    fn name(&self) -> &'static str {
        "main"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::Activate, EventKind::Deactivate, EventKind::FrameTick]
    }

    fn handle(&mut self, event: &Event, cx: &mut Context<GameState>) {
        match event {
            Event::Activate => {
                self.waited_ms = 0.0;
                self.started = false;
                log::info!("Melon Merge active, first session in {}ms", self.delay_ms);
            }
            Event::Deactivate => {
                log::info!("Melon Merge stopped (score {})", cx.state.score());
            }
            Event::FrameTick { dt_ms } if !self.started => {
                self.waited_ms += dt_ms;
                if self.waited_ms >= self.delay_ms {
                    self.started = true;
                    cx.emit(Event::SessionStart);
                }
            }
            _ => {}
        }
    }
}

/// A running game wired onto one bus
pub struct App {
    bus: Bus<GameState>,
    seed: u64,
}

impl App {
    pub fn new(settings: &Settings, seed: u64, surfaces: SurfaceSource) -> Self {
        let state = GameState::new(Bucket::new(settings.bucket_width, settings.bucket_height));
        let mut bus = Bus::new(state);

        let main = bus.attach(None, Main::new(settings.start_delay_ms));
        bus.attach(Some(main), FrameClock::new());
        bus.attach(Some(main), Gameplay::new(seed));
        bus.attach(Some(main), Physics::new(settings));
        bus.attach(Some(main), Terminal::new(settings, surfaces));

        Self { bus, seed }
    }

    /// An app drawing into an in-memory scene the caller can inspect
    pub fn with_scene(settings: &Settings, seed: u64) -> (Self, Rc<RefCell<Scene>>) {
        let scene = Rc::new(RefCell::new(Scene::new()));
        let handle = scene.clone();
        let app = Self::new(
            settings,
            seed,
            Box::new(move || Ok(Box::new(handle.clone()) as Box<dyn Surface>)),
        );
        (app, scene)
    }

    pub fn activate(&mut self) {
        self.bus.activate();
    }

    /// Release every body and primitive
    pub fn deactivate(&mut self) {
        self.bus.deactivate();
    }

    pub fn is_active(&self) -> bool {
        self.bus.is_active()
    }

    /// Host refresh callback
    pub fn frame(&mut self, timestamp_ms: f64) {
        self.bus.emit(Event::HostFrame { timestamp_ms });
    }

    pub fn pointer(&mut self, input: PointerInput) {
        self.bus.emit(Event::Pointer(input));
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.bus.emit(Event::HostResize { width, height });
    }

    /// Start a fresh session; the only way out of game over
    pub fn restart(&mut self) {
        self.bus.emit(Event::SessionStart);
    }

    pub fn state(&self) -> &GameState {
        self.bus.state()
    }

    /// Direct access for scripted hosts and tests
    pub fn state_mut(&mut self) -> &mut GameState {
        self.bus.state_mut()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::renderer::{Layer, PointerPhase, SurfaceError};
    use crate::sim::{Fruit, GameStatus};

    const FRAME_MS: f64 = 20.0;

    /// App with a 140 x 240 host: 10 px per unit, view box at the origin
    fn app(seed: u64) -> (App, Rc<RefCell<Scene>>) {
        let (mut app, scene) = App::with_scene(&Settings::default(), seed);
        app.activate();
        app.resize(140.0, 240.0);
        (app, scene)
    }

    /// Host point for a logical point under the 140 x 240 fit
    fn host(x: f32, y: f32) -> (f32, f32) {
        ((x + 7.0) * 10.0, (y + 13.0) * 10.0)
    }

    struct Clock(f64);

    impl Clock {
        fn run(&mut self, app: &mut App, frames: usize) {
            for _ in 0..frames {
                app.frame(self.0);
                self.0 += FRAME_MS;
            }
        }
    }

    fn started(seed: u64) -> (App, Rc<RefCell<Scene>>, Clock) {
        let (mut app, scene) = app(seed);
        let mut clock = Clock(1000.0);
        clock.run(&mut app, 10);
        (app, scene, clock)
    }

    #[test]
    fn test_session_starts_after_delay() {
        let (mut app, scene) = app(1);
        let mut clock = Clock(5000.0);

        // First frame has no elapsed time, then 20ms per frame
        clock.run(&mut app, 5);
        assert!(app.state().scorecard.is_none());
        clock.run(&mut app, 1);
        assert!(app.state().is_playing());
        assert!(app.state().pending.is_some());

        let scene = scene.borrow();
        assert_eq!(scene.text(), Some("0"));
        assert_eq!(scene.layer(Layer::Bucket).count(), 1);
        assert_eq!(scene.layer(Layer::Fruits).count(), 1);
    }

    #[test]
    fn test_session_starts_once() {
        let (mut app, _, mut clock) = started(2);
        let card = app.state().scorecard.as_ref().unwrap().key;
        clock.run(&mut app, 50);
        assert_eq!(app.state().scorecard.as_ref().unwrap().key, card);
    }

    #[test]
    fn test_drop_and_settle() {
        let (mut app, scene, mut clock) = started(3);
        let pending = app.state().pending.as_ref().unwrap().key;

        let (x, y) = host(-3.0, 4.0);
        app.pointer(PointerInput::new(PointerPhase::Down, x, y));
        app.pointer(PointerInput::new(PointerPhase::Up, x, y));

        let dropped = app.state().fruit(pending).unwrap();
        assert!((dropped.position - Vec2::new(-3.0, -8.0)).length() < 1e-3);
        assert!(app.state().pending.as_ref().is_some_and(|f| f.key != pending));

        clock.run(&mut app, 180);
        let fruit = app.state().fruit(pending).unwrap();
        assert!((fruit.position.y - (10.0 - fruit.radius())).abs() < 0.05);
        assert_eq!(scene.borrow().layer(Layer::Fruits).count(), 2);
    }

    #[test]
    fn test_touching_equal_fruits_merge() {
        let (mut app, scene, mut clock) = started(4);
        app.state_mut().fruits.push(Fruit::new(3, Vec2::new(-0.6, 8.5)));
        app.state_mut().fruits.push(Fruit::new(3, Vec2::new(0.6, 8.5)));

        clock.run(&mut app, 2);
        let state = app.state();
        assert_eq!(state.score(), 3);
        assert_eq!(state.fruits.len(), 1);
        assert_eq!(state.fruits[0].level, 4);
        assert_eq!(scene.borrow().text(), Some("3"));

        // The merged fruit is simulated from the next frame on
        clock.run(&mut app, 100);
        assert_eq!(app.state().score(), 3);
        assert!(app.state().fruits[0].position.y > 8.0);
    }

    #[test]
    fn test_rim_contact_ends_game_until_restart() {
        let (mut app, scene, mut clock) = started(5);
        app.state_mut().fruits.push(Fruit::new(6, Vec2::new(0.0, -9.5)));

        clock.run(&mut app, 2);
        assert_eq!(app.state().status(), Some(GameStatus::GameOver));
        assert!(app.state().fruits.is_empty());
        assert!(app.state().pending.is_none());
        // Only the score and the bucket remain on screen
        assert_eq!(scene.borrow().layer(Layer::Fruits).count(), 0);

        let (x, y) = host(0.0, 0.0);
        app.pointer(PointerInput::new(PointerPhase::Down, x, y));
        app.pointer(PointerInput::new(PointerPhase::Up, x, y));
        assert!(app.state().fruits.is_empty());

        app.restart();
        assert!(app.state().is_playing());
        assert_eq!(app.state().score(), 0);
        assert!(app.state().pending.is_some());
    }

    #[test]
    fn test_deactivate_releases_everything() {
        let (mut app, scene, mut clock) = started(6);
        let (x, y) = host(0.0, 0.0);
        app.pointer(PointerInput::new(PointerPhase::Up, x, y));
        clock.run(&mut app, 5);
        assert!(!scene.borrow().is_empty());

        app.deactivate();
        assert!(!app.is_active());
        assert!(scene.borrow().is_empty());

        // Frames and input reach nobody
        let fruits = app.state().fruits.len();
        clock.run(&mut app, 5);
        app.pointer(PointerInput::new(PointerPhase::Up, x, y));
        assert_eq!(app.state().fruits.len(), fruits);
        assert!(scene.borrow().is_empty());
    }

    #[test]
    fn test_same_seed_same_session() {
        let play = |seed: u64| {
            let (mut app, _, mut clock) = started(seed);
            let (x, y) = host(1.0, 0.0);
            let mut levels = Vec::new();
            for _ in 0..8 {
                levels.push(app.state().pending.as_ref().map(|f| f.level));
                app.pointer(PointerInput::new(PointerPhase::Up, x, y));
                clock.run(&mut app, 30);
            }
            (levels, app.state().score())
        };
        assert_eq!(play(77), play(77));
    }

    #[test]
    fn test_runs_headless_without_surface() {
        let mut app = App::new(
            &Settings::default(),
            8,
            Box::new(|| Err(SurfaceError::Unavailable("test".into()))),
        );
        app.activate();
        let mut clock = Clock(0.0);
        clock.run(&mut app, 10);
        assert!(app.state().is_playing());

        app.pointer(PointerInput::new(PointerPhase::Up, 0.0, 0.0));
        assert_eq!(app.state().fruits.len(), 1);
    }
}
