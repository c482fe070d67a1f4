//! Melon Merge - A fruit-merging bucket arcade game
//!
//! Core modules:
//! - `bus`: Event bus and node composition shared by every component
//! - `clock`: Frame clock turning host refresh timestamps into ticks
//! - `sim`: Game state and gameplay rules (spawn, drop, merge, game over)
//! - `physics`: Rigid-body world and the adapter that keeps it in sync
//! - `renderer`: Drawing surface, pointer input and the render adapter
//! - `reconcile`: Keyed attach/refresh/detach protocol used by both adapters
//! - `app`: Composition root wiring everything onto one bus

pub mod app;
pub mod bus;
pub mod clock;
pub mod physics;
pub mod reconcile;
pub mod renderer;
pub mod settings;
pub mod sim;

pub use app::App;
pub use settings::{Settings, SettingsError};

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Game configuration constants
pub mod consts {
    use std::ops::RangeInclusive;

    /// Highest fruit level; merging two of these scores but spawns nothing
    pub const MAX_LEVEL: u8 = 11;
    /// Levels a freshly spawned pending fruit is drawn from
    pub const SPAWN_LEVELS: RangeInclusive<u8> = 1..=6;
    /// Distance below the rim at which pending fruits hover
    pub const SPAWN_DEPTH: f32 = 2.0;

    /// Gap between a fruit's physical radius and its drawn circle
    pub const FRUIT_OUTLINE_INSET: f32 = 0.06;
    /// Gap between the bucket walls and its drawn frame
    pub const BUCKET_OUTLINE_OUTSET: f32 = 0.06;
    /// Logical margin kept around the bucket when fitting to the host
    pub const VIEW_MARGIN: f32 = 1.0;
    /// Extra logical room above the bucket for the score label
    pub const VIEW_HEADROOM: f32 = 2.0;
}

/// Process-unique identity of a game entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey(u64);

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

impl EntityKey {
    /// Allocate a key never handed out before in this process
    pub fn fresh() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Radius of a fruit of the given level, in logical units
#[inline]
pub fn fruit_radius(level: u8) -> f32 {
    level as f32 / 6.0 + 0.2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_keys_are_unique() {
        let a = EntityKey::fresh();
        let b = EntityKey::fresh();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn test_fruit_radius() {
        assert!((fruit_radius(1) - 0.366_666).abs() < 1e-4);
        assert!((fruit_radius(6) - 1.2).abs() < 1e-6);
        assert!((fruit_radius(consts::MAX_LEVEL) - 2.033_333).abs() < 1e-4);
    }
}
