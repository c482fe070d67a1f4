//! Game simulation module
//!
//! All gameplay logic lives here. This module must stay free of rendering
//! and physics details:
//! - Seeded RNG only
//! - Insertion-ordered fruits with stable keys
//! - Mutations are guarded no-ops when out of state

pub mod gameplay;
pub mod state;

pub use gameplay::{Gameplay, clamp_to_drop_line};
pub use state::{
    BodySource, Bucket, EntityKind, Fruit, GameState, GameStatus, Scorecard, Visual,
};
