//! Physics adapter
//!
//! Keeps a rapier-backed `World` in step with the game state. Each frame tick:
//! 1. reconcile bodies against the physics snapshot (active fruits + bucket)
//! 2. run fixed sub-steps until the accumulated time is used up
//! 3. copy body positions back into the fruits
//! 4. turn newly begun contacts into merge and rim events
//!
//! Contact events are buffered while the world steps and only emitted once
//! `advance` has returned, never from inside the world.

pub mod world;

use glam::Vec2;

use crate::EntityKey;
use crate::bus::{Context, Event, EventKind, Node};
use crate::reconcile::{Dataset, Driver, Reconciler};
use crate::settings::Settings;
use crate::sim::{BodySource, EntityKind, GameState};

pub use world::{BodyHandle, CircleDesc, ContactPair, Side, SideTag, World};

/// What a body stands for in the game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyData {
    Fruit { key: EntityKey, level: u8 },
    Bucket { key: EntityKey },
}

/// Snapshot family the physics reconciler runs over
pub struct Bodies;

impl Dataset for Bodies {
    type Kind = EntityKind;
    type Item<'a> = BodySource<'a>;
}

type BodyReconciler = Reconciler<Bodies, BodyHandle, World<BodyData>>;

/// Dynamic circle per active fruit
struct FruitBodies {
    drop_speed: f32,
    restitution: f32,
}

impl Driver<Bodies, BodyHandle, World<BodyData>> for FruitBodies {
    fn matches(&self, kind: EntityKind) -> bool {
        kind == EntityKind::Fruit
    }

    fn attach(&mut self, item: &BodySource<'_>, world: &mut World<BodyData>) -> Option<BodyHandle> {
        let BodySource::Fruit(fruit) = item else {
            return None;
        };
        let desc = CircleDesc {
            position: fruit.position,
            velocity: Vec2::new(0.0, self.drop_speed),
            radius: fruit.radius(),
            // Bigger fruits are lighter per unit area
            density: 1.0 / fruit.level.max(1) as f32,
            restitution: self.restitution,
        };
        let data = BodyData::Fruit {
            key: fruit.key,
            level: fruit.level,
        };
        Some(world.create_circle(desc, data))
    }

    fn refresh(&mut self, item: &mut BodySource<'_>, handle: &mut BodyHandle, world: &mut World<BodyData>) {
        if let BodySource::Fruit(fruit) = item {
            if let Some(position) = world.position(*handle) {
                fruit.position = position;
            }
        }
    }

    fn detach(&mut self, handle: BodyHandle, world: &mut World<BodyData>) {
        world.destroy(handle);
    }
}

/// Thickness of the solid sides around the bucket interior
const SIDE_THICKNESS: f32 = 1.0;

/// Static walls, floor and the rim lid
struct BucketBody;

impl Driver<Bodies, BodyHandle, World<BodyData>> for BucketBody {
    fn matches(&self, kind: EntityKind) -> bool {
        kind == EntityKind::Bucket
    }

    fn attach(&mut self, item: &BodySource<'_>, world: &mut World<BodyData>) -> Option<BodyHandle> {
        let BodySource::Bucket(bucket) = item else {
            return None;
        };
        let half = bucket.half_extents();
        let t = SIDE_THICKNESS / 2.0;
        let across = Vec2::new(half.x + SIDE_THICKNESS, t);
        let upright = Vec2::new(t, half.y + SIDE_THICKNESS);

        // Inner faces lie exactly on the bucket outline
        let sides = vec![
            Side {
                center: Vec2::new(0.0, -half.y - t),
                half_extents: across,
                tag: SideTag::Rim,
            },
            Side {
                center: Vec2::new(half.x + t, 0.0),
                half_extents: upright,
                tag: SideTag::Wall,
            },
            Side {
                center: Vec2::new(0.0, half.y + t),
                half_extents: across,
                tag: SideTag::Wall,
            },
            Side {
                center: Vec2::new(-half.x - t, 0.0),
                half_extents: upright,
                tag: SideTag::Wall,
            },
        ];
        Some(world.create_static(sides, BodyData::Bucket { key: bucket.key }))
    }

    fn refresh(&mut self, _item: &mut BodySource<'_>, _handle: &mut BodyHandle, _world: &mut World<BodyData>) {}

    fn detach(&mut self, handle: BodyHandle, world: &mut World<BodyData>) {
        world.destroy(handle);
    }
}

/// Physics node
pub struct Physics {
    world: World<BodyData>,
    bodies: BodyReconciler,
    step_ms: f64,
    accumulator_ms: f64,
    steps: u64,
}

impl Physics {
    pub fn new(settings: &Settings) -> Self {
        let bodies = Reconciler::new()
            .with_driver(FruitBodies {
                drop_speed: settings.drop_speed,
                restitution: settings.fruit_restitution,
            })
            .with_driver(BucketBody);
        Self {
            world: World::new(Vec2::new(0.0, settings.gravity)),
            bodies,
            step_ms: settings.physics_step_ms,
            accumulator_ms: 0.0,
            steps: 0,
        }
    }

    /// Sync bodies, integrate `dt_ms` worth of fixed steps, and return the
    /// collision events raised along the way
    pub fn advance(&mut self, dt_ms: f64, state: &mut GameState) -> Vec<Event> {
        self.bodies.reconcile(state.physics_snapshot(), &mut self.world);

        let mut raised = Vec::new();
        self.accumulator_ms += dt_ms.max(0.0);
        let dt = (self.step_ms / 1000.0) as f32;
        while self.accumulator_ms >= self.step_ms {
            for contact in self.world.step(dt) {
                if let Some(event) = self.classify(contact) {
                    raised.push(event);
                }
            }
            self.accumulator_ms -= self.step_ms;
            self.steps += 1;
        }

        for fruit in state.fruits.iter_mut() {
            if let Some(position) = self.bodies.resource(fruit.key).and_then(|h| self.world.position(*h)) {
                fruit.position = position;
            }
        }
        raised
    }

    /// Map a begun contact to the game event it implies, if any
    fn classify(&self, contact: ContactPair) -> Option<Event> {
        match contact {
            ContactPair::Circles(a, b) => match (self.world.data(a)?, self.world.data(b)?) {
                (
                    BodyData::Fruit { key: ka, level: la },
                    BodyData::Fruit { key: kb, level: lb },
                ) if la == lb => Some(Event::MergeCollision { a: ka, b: kb }),
                _ => None,
            },
            ContactPair::CircleSide { circle, tag } => {
                let BodyData::Fruit { key, .. } = self.world.data(circle)? else {
                    return None;
                };
                match tag {
                    SideTag::Rim => Some(Event::RimCollision { fruit: key }),
                    SideTag::Wall => None,
                }
            }
        }
    }

    /// Release every body
    pub fn clear(&mut self) {
        self.bodies.clear(&mut self.world);
        self.accumulator_ms = 0.0;
    }

    pub fn body_count(&self) -> usize {
        self.world.len()
    }

    pub fn accumulated_ms(&self) -> f64 {
        self.accumulator_ms
    }

    /// Fixed steps taken so far
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl Node<GameState> for Physics {
    fn name(&self) -> &'static str {
        "physics"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::Deactivate, EventKind::FrameTick]
    }

    fn handle(&mut self, event: &Event, cx: &mut Context<GameState>) {
        match event {
            Event::FrameTick { dt_ms } => {
                for raised in self.advance(*dt_ms, &mut cx.state) {
                    cx.emit(raised);
                }
            }
            Event::Deactivate => {
                log::debug!("Physics released {} bodies", self.world.len());
                self.clear();
            }
            _ => {}
        }
    }
}
