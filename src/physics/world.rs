//! Rigid-body world backed by rapier2d
//!
//! Dynamic balls fall under gravity and collide with each other and with the
//! boxes of static bodies. Each body carries caller data `T` (the equivalent
//! of a user-data pointer) so contacts can be traced back to game entities.
//!
//! `step` reports only contacts that began during that step, so one physical
//! contact is reported once no matter how long the shapes stay touching.

use std::collections::HashMap;

use glam::Vec2;
use rapier2d::crossbeam::channel;
use rapier2d::prelude::*;

/// Coulomb friction coefficient used for every collider
const FRICTION: Real = 0.2;

pub type BodyHandle = RigidBodyHandle;

/// What touching one side of a static body means to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SideTag {
    Wall,
    Rim,
}

/// A solid box belonging to a static body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Side {
    pub center: Vec2,
    pub half_extents: Vec2,
    pub tag: SideTag,
}

/// Parameters for a new dynamic ball
#[derive(Debug, Clone, Copy)]
pub struct CircleDesc {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    /// Mass per unit area
    pub density: f32,
    pub restitution: f32,
}

/// A pair of shapes that started touching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactPair {
    /// Two dynamic balls, in collider order
    Circles(BodyHandle, BodyHandle),
    /// A ball against a tagged side of a static body
    CircleSide { circle: BodyHandle, tag: SideTag },
}

/// Rigid-body world with caller data per body
pub struct World<T> {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    data: HashMap<BodyHandle, T>,
    sides: HashMap<ColliderHandle, SideTag>,
}

impl<T: Copy> World<T> {
    pub fn new(gravity: Vec2) -> Self {
        Self {
            gravity: vector![gravity.x, gravity.y],
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            data: HashMap::new(),
            sides: HashMap::new(),
        }
    }

    pub fn create_circle(&mut self, desc: CircleDesc, data: T) -> BodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![desc.position.x, desc.position.y])
            .linvel(vector![desc.velocity.x, desc.velocity.y])
            .ccd_enabled(true)
            .build();
        let handle = self.bodies.insert(body);
        let collider = ColliderBuilder::ball(desc.radius)
            .density(desc.density)
            .restitution(desc.restitution)
            .friction(FRICTION)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.colliders.insert_with_parent(collider, handle, &mut self.bodies);
        self.data.insert(handle, data);
        handle
    }

    /// A fixed body made of solid boxes, each tagged for contact reports
    pub fn create_static(&mut self, sides: Vec<Side>, data: T) -> BodyHandle {
        let handle = self.bodies.insert(RigidBodyBuilder::fixed().build());
        for side in sides {
            let collider = ColliderBuilder::cuboid(side.half_extents.x, side.half_extents.y)
                .translation(vector![side.center.x, side.center.y])
                .friction(FRICTION)
                .build();
            let collider = self.colliders.insert_with_parent(collider, handle, &mut self.bodies);
            self.sides.insert(collider, side.tag);
        }
        self.data.insert(handle, data);
        handle
    }

    /// Remove a body with its colliders
    pub fn destroy(&mut self, handle: BodyHandle) -> bool {
        if self.data.remove(&handle).is_none() {
            return false;
        }
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        self.sides.retain(|collider, _| self.colliders.contains(*collider));
        true
    }

    pub fn data(&self, handle: BodyHandle) -> Option<T> {
        self.data.get(&handle).copied()
    }

    pub fn position(&self, handle: BodyHandle) -> Option<Vec2> {
        let t = self.bodies.get(handle)?.translation();
        Some(Vec2::new(t.x, t.y))
    }

    pub fn velocity(&self, handle: BodyHandle) -> Option<Vec2> {
        let v = self.bodies.get(handle)?.linvel();
        Some(Vec2::new(v.x, v.y))
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Advance by `dt` seconds; returns contacts that began during this step
    pub fn step(&mut self, dt: f32) -> Vec<ContactPair> {
        self.params.dt = dt;

        let (collision_send, collision_recv) = channel::unbounded::<CollisionEvent>();
        let (force_send, _force_recv) = channel::unbounded::<ContactForceEvent>();
        let events = ChannelEventCollector::new(collision_send, force_send);

        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            None,
            &(),
            &events,
        );

        let mut started = Vec::new();
        while let Ok(event) = collision_recv.try_recv() {
            if let CollisionEvent::Started(a, b, _) = event {
                let (a, b) = if a.into_raw_parts() <= b.into_raw_parts() { (a, b) } else { (b, a) };
                started.push((a, b));
            }
        }
        // Channel order is not part of rapier's contract
        started.sort_by_key(|(a, b)| (a.into_raw_parts(), b.into_raw_parts()));

        started.into_iter().filter_map(|(a, b)| self.contact(a, b)).collect()
    }

    fn contact(&self, a: ColliderHandle, b: ColliderHandle) -> Option<ContactPair> {
        let body_a = self.colliders.get(a)?.parent()?;
        let body_b = self.colliders.get(b)?.parent()?;
        match (self.sides.get(&a), self.sides.get(&b)) {
            (None, None) => Some(ContactPair::Circles(body_a, body_b)),
            (Some(tag), None) => Some(ContactPair::CircleSide {
                circle: body_b,
                tag: *tag,
            }),
            (None, Some(tag)) => Some(ContactPair::CircleSide {
                circle: body_a,
                tag: *tag,
            }),
            (Some(_), Some(_)) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    /// Slab whose top face is the line y = 5
    fn floor(tag: SideTag) -> Vec<Side> {
        vec![Side {
            center: Vec2::new(0.0, 5.5),
            half_extents: Vec2::new(10.0, 0.5),
            tag,
        }]
    }

    fn ball(x: f32, y: f32) -> CircleDesc {
        CircleDesc {
            position: Vec2::new(x, y),
            velocity: Vec2::ZERO,
            radius: 0.5,
            density: 1.0,
            restitution: 0.1,
        }
    }

    fn run(world: &mut World<u32>, steps: usize) -> Vec<ContactPair> {
        (0..steps).flat_map(|_| world.step(DT)).collect()
    }

    #[test]
    fn test_falls_and_rests_on_floor() {
        let mut world = World::new(Vec2::new(0.0, 10.0));
        world.create_static(floor(SideTag::Wall), 0u32);
        let h = world.create_circle(
            CircleDesc {
                restitution: 0.0,
                ..ball(0.0, 0.0)
            },
            1u32,
        );

        let began = run(&mut world, 240);
        let pos = world.position(h).unwrap();
        assert!((pos.y - 4.5).abs() < 0.05, "resting height {}", pos.y);
        assert!(pos.x.abs() < 1e-3);
        assert!(world.velocity(h).unwrap().length() < 0.5);
        // One physical contact, one report
        assert_eq!(
            began,
            vec![ContactPair::CircleSide {
                circle: h,
                tag: SideTag::Wall
            }]
        );
    }

    #[test]
    fn test_circles_push_apart_and_report_once() {
        let mut world = World::new(Vec2::ZERO);
        let a = world.create_circle(ball(0.0, 0.0), 1);
        let b = world.create_circle(ball(0.6, 0.0), 2);

        let first = world.step(DT);
        assert_eq!(first.len(), 1);
        assert!(matches!(first[0], ContactPair::Circles(x, y) if (x, y) == (a, b) || (x, y) == (b, a)));

        // Separating or still touching, never reported again
        assert!(run(&mut world, 60).is_empty());
        let gap = world.position(b).unwrap().x - world.position(a).unwrap().x;
        assert!(gap > 0.95, "centers {} apart", gap);
    }

    #[test]
    fn test_destroy_removes_body_and_data() {
        let mut world = World::new(Vec2::ZERO);
        let a = world.create_circle(ball(0.0, 0.0), 1);
        let b = world.create_circle(ball(0.6, 0.0), 2);
        world.step(DT);

        assert!(world.destroy(b));
        assert!(!world.destroy(b));
        assert_eq!(world.len(), 1);
        assert!(world.data(b).is_none());
        assert!(world.position(b).is_none());

        let x = world.position(a).unwrap().x + 0.5;
        let c = world.create_circle(ball(x, 0.0), 3);
        let began = world.step(DT);
        assert_eq!(began.len(), 1);
        assert!(matches!(began[0], ContactPair::Circles(x, y) if (x, y) == (a, c) || (x, y) == (c, a)));
    }

    #[test]
    fn test_side_contact_carries_tag() {
        let mut world = World::new(Vec2::ZERO);
        let lid = world.create_static(floor(SideTag::Rim), 0u32);
        let h = world.create_circle(ball(0.0, 4.7), 1);
        assert_eq!(
            world.step(DT),
            vec![ContactPair::CircleSide {
                circle: h,
                tag: SideTag::Rim
            }]
        );

        // Sides go with their body
        assert!(world.destroy(lid));
        assert!(world.sides.is_empty());
        assert!(run(&mut world, 5).is_empty());
    }

    #[test]
    fn test_heavier_circle_moves_less() {
        let mut world = World::new(Vec2::ZERO);
        let light = world.create_circle(ball(0.0, 0.0), 0);
        let heavy = world.create_circle(
            CircleDesc {
                density: 9.0,
                ..ball(0.8, 0.0)
            },
            1,
        );
        run(&mut world, 10);
        let moved_light = world.position(light).unwrap().x.abs();
        let moved_heavy = (world.position(heavy).unwrap().x - 0.8).abs();
        assert!(moved_light > moved_heavy);
    }
}
