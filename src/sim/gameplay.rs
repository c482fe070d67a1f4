//! Gameplay rules
//!
//! Owns the session state machine: spawning and dropping the pending fruit,
//! merging equal fruits, and ending the session when a fruit reaches the rim.
//! Every operation is a guarded state mutation. Requests that arrive in the
//! wrong state, or that name fruits which are gone or already collected, are
//! ignored: collision reports can repeat within a frame.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::state::{Bucket, Fruit, GameState, GameStatus, Scorecard};
use crate::EntityKey;
use crate::bus::{Context, Event, EventKind, Node};
use crate::consts::{MAX_LEVEL, SPAWN_DEPTH, SPAWN_LEVELS};

/// Place a fruit at the drop line: x clamped inside the walls, fixed y near the rim
pub fn clamp_to_drop_line(bucket: &Bucket, fruit: &mut Fruit, point: Vec2) {
    let half = bucket.half_extents();
    let x_max = (half.x - fruit.radius()).max(0.0);
    fruit.position = Vec2::new(point.x.clamp(-x_max, x_max), -(half.y - SPAWN_DEPTH));
}

pub struct Gameplay {
    seed: u64,
    rng: Pcg32,
}

impl Gameplay {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Fresh scorecard, empty bucket, new pending fruit
    pub fn start_session(&mut self, state: &mut GameState) {
        state.scorecard = Some(Scorecard::new());
        state.fruits.clear();
        state.pending = None;
        self.spawn_pending(state, Vec2::ZERO);
        log::info!(
            "Session started (seed {}, first fruit level {})",
            self.seed,
            state.pending.as_ref().map(|f| f.level).unwrap_or(0)
        );
    }

    /// Create the pending fruit above `origin`; only while playing
    pub fn spawn_pending(&mut self, state: &mut GameState, origin: Vec2) -> bool {
        if !state.is_playing() {
            return false;
        }
        let level = self.rng.random_range(SPAWN_LEVELS);
        let mut fruit = Fruit::new(level, origin);
        clamp_to_drop_line(&state.bucket, &mut fruit, origin);
        state.pending = Some(fruit);
        true
    }

    /// Slide the pending fruit toward `point`
    pub fn reposition_pending(&self, state: &mut GameState, point: Vec2) -> bool {
        let GameState { bucket, pending, .. } = state;
        let Some(fruit) = pending.as_mut() else {
            return false;
        };
        clamp_to_drop_line(bucket, fruit, point);
        true
    }

    /// Commit the pending fruit at `point`, then spawn the next one
    pub fn drop_pending(&mut self, state: &mut GameState, point: Vec2) {
        if let Some(mut fruit) = state.pending.take() {
            clamp_to_drop_line(&state.bucket, &mut fruit, point);
            log::debug!("Dropped level {} fruit at x={:.2}", fruit.level, fruit.position.x);
            state.fruits.push(fruit);
        }
        self.spawn_pending(state, point);
    }

    /// Consume two equal fruits, score their level, and grow a bigger one
    pub fn merge(&mut self, state: &mut GameState, a: EntityKey, b: EntityKey) -> bool {
        if !state.is_playing() || a == b {
            return false;
        }
        let (Some(ia), Some(ib)) = (
            state.fruits.iter().position(|f| f.key == a),
            state.fruits.iter().position(|f| f.key == b),
        ) else {
            return false;
        };
        let (fa, fb) = (&state.fruits[ia], &state.fruits[ib]);
        if fa.collected || fb.collected {
            return false;
        }
        if fa.level != fb.level {
            log::debug!("Ignoring merge of unequal levels {} and {}", fa.level, fb.level);
            return false;
        }

        let level = fa.level;
        let midpoint = (fa.position + fb.position) / 2.0;
        state.fruits[ia].collected = true;
        state.fruits[ib].collected = true;
        state.fruits.retain(|f| !f.collected);

        let score = match state.scorecard.as_mut() {
            Some(card) => {
                card.score += level as u64;
                card.score
            }
            None => 0,
        };

        if level < MAX_LEVEL {
            state.fruits.push(Fruit::new(level + 1, midpoint));
        }
        log::debug!("Merged two level {} fruits, score {}", level, score);
        true
    }

    /// End the session if an uncollected fruit reached the rim
    pub fn rim_contact(&mut self, state: &mut GameState, fruit: EntityKey) -> bool {
        if !state.is_playing() {
            return false;
        }
        if state.fruit(fruit).is_none_or(|f| f.collected) {
            return false;
        }
        state.pending = None;
        state.fruits.clear();
        if let Some(card) = state.scorecard.as_mut() {
            card.status = GameStatus::GameOver;
            log::info!("Game over, final score {}", card.score);
        }
        true
    }
}

impl Node<GameState> for Gameplay {
    fn name(&self) -> &'static str {
        "gameplay"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[
            EventKind::Activate,
            EventKind::SessionStart,
            EventKind::DropPendingFruit,
            EventKind::RepositionPendingFruit,
            EventKind::MergeCollision,
            EventKind::RimCollision,
        ]
    }

    fn handle(&mut self, event: &Event, cx: &mut Context<GameState>) {
        match event {
            Event::Activate => {
                log::debug!("Gameplay active (seed {})", self.seed);
            }
            Event::SessionStart => {
                self.start_session(&mut cx.state);
                cx.emit(Event::StateChanged);
            }
            Event::DropPendingFruit(point) => {
                self.drop_pending(&mut cx.state, *point);
                cx.emit(Event::StateChanged);
            }
            Event::RepositionPendingFruit(point) => {
                self.reposition_pending(&mut cx.state, *point);
            }
            Event::MergeCollision { a, b } => {
                if self.merge(&mut cx.state, *a, *b) {
                    cx.emit(Event::StateChanged);
                }
            }
            Event::RimCollision { fruit } => {
                if self.rim_contact(&mut cx.state, *fruit) {
                    cx.emit(Event::StateChanged);
                }
            }
            _ => {}
        }
    }
}
