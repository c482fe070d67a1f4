//! Frame clock
//!
//! Turns raw host refresh timestamps into elapsed-time ticks. Every host
//! frame yields exactly one `FrameTick`; a late frame just carries a larger
//! delta.

use crate::bus::{Context, Event, EventKind, Node};

#[derive(Debug, Default)]
pub struct FrameClock {
    last_timestamp: Option<f64>,
    /// Total elapsed time handed out, in milliseconds
    elapsed_ms: f64,
    frames: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delta for a new host timestamp; never negative
    pub fn advance(&mut self, timestamp_ms: f64) -> f64 {
        let dt = match self.last_timestamp {
            Some(last) if timestamp_ms > last => timestamp_ms - last,
            _ => 0.0,
        };
        // A clock stepping backwards must not rewind us
        if self.last_timestamp.is_none_or(|last| timestamp_ms > last) {
            self.last_timestamp = Some(timestamp_ms);
        }
        self.elapsed_ms += dt;
        self.frames += 1;
        dt
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl<S> Node<S> for FrameClock {
    fn name(&self) -> &'static str {
        "frame-clock"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::Deactivate, EventKind::HostFrame]
    }

    fn handle(&mut self, event: &Event, cx: &mut Context<S>) {
        match event {
            Event::HostFrame { timestamp_ms } => {
                let dt_ms = self.advance(*timestamp_ms);
                cx.emit(Event::FrameTick { dt_ms });
            }
            Event::Deactivate => {
                // Resuming later must not produce one huge delta
                self.last_timestamp = None;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_is_zero() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.advance(1000.0), 0.0);
        assert_eq!(clock.advance(1016.5), 16.5);
        assert_eq!(clock.frames(), 2);
    }

    #[test]
    fn test_late_frame_gives_larger_delta() {
        let mut clock = FrameClock::new();
        clock.advance(0.0);
        clock.advance(16.0);
        assert_eq!(clock.advance(116.0), 100.0);
        assert_eq!(clock.elapsed_ms(), 116.0);
    }

    #[test]
    fn test_backwards_timestamp_is_monotonic() {
        let mut clock = FrameClock::new();
        clock.advance(500.0);
        assert_eq!(clock.advance(400.0), 0.0);
        assert_eq!(clock.advance(520.0), 20.0);
    }

    #[test]
    fn test_emits_one_tick_per_host_frame() {
        let mut clock = FrameClock::new();
        let mut cx = Context::new(());
        clock.handle(&Event::HostFrame { timestamp_ms: 10.0 }, &mut cx);
        clock.handle(&Event::HostFrame { timestamp_ms: 26.0 }, &mut cx);
        assert_eq!(
            cx.drain(),
            vec![Event::FrameTick { dt_ms: 0.0 }, Event::FrameTick { dt_ms: 16.0 }]
        );
    }

    #[test]
    fn test_deactivate_resets_reference() {
        let mut clock = FrameClock::new();
        let mut cx = Context::new(());
        clock.handle(&Event::HostFrame { timestamp_ms: 10.0 }, &mut cx);
        clock.handle(&Event::Deactivate, &mut cx);
        clock.handle(&Event::HostFrame { timestamp_ms: 5000.0 }, &mut cx);
        assert_eq!(cx.drain().last(), Some(&Event::FrameTick { dt_ms: 0.0 }));
    }
}
