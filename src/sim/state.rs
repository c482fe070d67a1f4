//! Game state and core entity types
//!
//! `GameState` is the one context object every node on the bus shares.
//! Field ownership:
//! - `scorecard`, `pending`, membership of `fruits`, and every fruit's `level`
//!   and `collected` flag are written by gameplay only
//! - a fruit's `position` is also written back by the physics adapter
//! - `bucket` is fixed for the life of the state
//!
//! Logical space is bucket-centered with y pointing down, so the rim sits at
//! `y = -height / 2`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::reconcile::Keyed;
use crate::{EntityKey, fruit_radius};

/// Discriminant tag shared by every snapshot item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Fruit,
    Bucket,
    Scorecard,
}

/// Current phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameStatus {
    #[default]
    Playing,
    /// Terminal until a new session starts
    GameOver,
}

/// A fruit, either pending under player control or active in the bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fruit {
    pub key: EntityKey,
    pub level: u8,
    pub position: Vec2,
    /// Set once the fruit has been consumed by a merge; never cleared
    pub collected: bool,
}

impl Fruit {
    pub fn new(level: u8, position: Vec2) -> Self {
        Self {
            key: EntityKey::fresh(),
            level,
            position,
            collected: false,
        }
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        fruit_radius(self.level)
    }
}

/// The container fruits fall into
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    pub key: EntityKey,
    pub width: f32,
    pub height: f32,
}

impl Bucket {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            key: EntityKey::fresh(),
            width,
            height,
        }
    }

    #[inline]
    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Score and phase of the current session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scorecard {
    pub key: EntityKey,
    pub score: u64,
    pub status: GameStatus,
}

impl Scorecard {
    pub fn new() -> Self {
        Self {
            key: EntityKey::fresh(),
            score: 0,
            status: GameStatus::Playing,
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.status == GameStatus::Playing
    }
}

impl Default for Scorecard {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete shared game state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub bucket: Bucket,
    /// None until the first session starts
    pub scorecard: Option<Scorecard>,
    /// Fruit under player control, not yet dropped
    pub pending: Option<Fruit>,
    /// Active fruits in insertion order
    pub fruits: Vec<Fruit>,
}

impl GameState {
    pub fn new(bucket: Bucket) -> Self {
        Self {
            bucket,
            scorecard: None,
            pending: None,
            fruits: Vec::new(),
        }
    }

    /// True while a session is running and not over
    pub fn is_playing(&self) -> bool {
        self.scorecard.as_ref().is_some_and(Scorecard::is_playing)
    }

    pub fn score(&self) -> u64 {
        self.scorecard.as_ref().map(|s| s.score).unwrap_or(0)
    }

    pub fn status(&self) -> Option<GameStatus> {
        self.scorecard.as_ref().map(|s| s.status)
    }

    pub fn fruit(&self, key: EntityKey) -> Option<&Fruit> {
        self.fruits.iter().find(|f| f.key == key)
    }

    /// Items the physics adapter binds bodies to: active fruits, then the bucket
    pub fn physics_snapshot(&mut self) -> Vec<BodySource<'_>> {
        let mut items: Vec<BodySource<'_>> = self.fruits.iter_mut().map(BodySource::Fruit).collect();
        items.push(BodySource::Bucket(&self.bucket));
        items
    }

    /// Items the render adapter draws: scorecard, active fruits, pending fruit, bucket
    pub fn render_snapshot(&self) -> Vec<Visual<'_>> {
        let mut items = Vec::with_capacity(self.fruits.len() + 3);
        if let Some(card) = &self.scorecard {
            items.push(Visual::Scorecard(card));
        }
        items.extend(self.fruits.iter().map(Visual::Fruit));
        if let Some(next) = &self.pending {
            items.push(Visual::Fruit(next));
        }
        items.push(Visual::Bucket(&self.bucket));
        items
    }
}

/// Snapshot item for the physics adapter; fruit positions are written back
#[derive(Debug)]
pub enum BodySource<'a> {
    Fruit(&'a mut Fruit),
    Bucket(&'a Bucket),
}

impl Keyed for BodySource<'_> {
    type Kind = EntityKind;

    fn key(&self) -> EntityKey {
        match self {
            BodySource::Fruit(f) => f.key,
            BodySource::Bucket(b) => b.key,
        }
    }

    fn kind(&self) -> EntityKind {
        match self {
            BodySource::Fruit(_) => EntityKind::Fruit,
            BodySource::Bucket(_) => EntityKind::Bucket,
        }
    }
}

/// Read-only snapshot item for the render adapter
#[derive(Debug, Clone, Copy)]
pub enum Visual<'a> {
    Fruit(&'a Fruit),
    Bucket(&'a Bucket),
    Scorecard(&'a Scorecard),
}

impl Keyed for Visual<'_> {
    type Kind = EntityKind;

    fn key(&self) -> EntityKey {
        match self {
            Visual::Fruit(f) => f.key,
            Visual::Bucket(b) => b.key,
            Visual::Scorecard(s) => s.key,
        }
    }

    fn kind(&self) -> EntityKind {
        match self {
            Visual::Fruit(_) => EntityKind::Fruit,
            Visual::Bucket(_) => EntityKind::Bucket,
            Visual::Scorecard(_) => EntityKind::Scorecard,
        }
    }
}
