//! Latest-value hand-off of spectral frames between threads
//!
//! The audio thread overwrites a single preallocated slot; the display thread
//! polls it on its own tick and gets at most one frame per interval. Frames
//! published in between are coalesced, never queued.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default cap on frames handed to the consumer per second
pub const DEFAULT_SPECTRUM_RATE_HZ: f64 = 30.0;

#[derive(Debug, Default)]
struct Slot {
    frame: Vec<f32>,
    fresh: bool,
    last_delivery: Option<Instant>,
}

/// Coalescing, rate-limited single-slot mailbox
#[derive(Debug)]
pub struct SpectrumMailbox {
    slot: Mutex<Slot>,
    min_interval: Duration,
}

impl SpectrumMailbox {
    /// Create a mailbox for frames of `num_bins` values delivering at most
    /// `max_rate_hz` frames per second (non-positive disables the limit)
    pub fn new(num_bins: usize, max_rate_hz: f64) -> Self {
        let min_interval = if max_rate_hz.is_finite() && max_rate_hz > 0.0 {
            Duration::from_secs_f64(1.0 / max_rate_hz)
        } else {
            Duration::ZERO
        };

        Self {
            slot: Mutex::new(Slot {
                frame: vec![0.0; num_bins],
                ..Slot::default()
            }),
            min_interval,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Replace the pending frame (producer side).
    ///
    /// Never blocks: if the consumer holds the lock the frame is dropped, a
    /// newer one follows shortly. Allocates only if the frame size changed.
    pub fn publish(&self, magnitudes: &[f32]) -> bool {
        let Ok(mut slot) = self.slot.try_lock() else {
            return false;
        };

        if slot.frame.len() == magnitudes.len() {
            slot.frame.copy_from_slice(magnitudes);
        } else {
            slot.frame.clear();
            slot.frame.extend_from_slice(magnitudes);
        }
        slot.fresh = true;
        true
    }

    /// Copy the pending frame into `out` if one arrived since the last
    /// delivery and the rate limit allows it
    pub fn poll(&self, out: &mut Vec<f32>) -> bool {
        self.poll_at(Instant::now(), out)
    }

    /// [`poll`](Self::poll) with an explicit clock
    pub fn poll_at(&self, now: Instant, out: &mut Vec<f32>) -> bool {
        let Ok(mut slot) = self.slot.lock() else {
            return false;
        };

        if !slot.fresh {
            return false;
        }
        if let Some(last) = slot.last_delivery {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }

        out.clear();
        out.extend_from_slice(&slot.frame);
        slot.fresh = false;
        slot.last_delivery = Some(now);
        true
    }

    /// Drop any pending frame (delivery timing is kept)
    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.fresh = false;
            slot.frame.fill(0.0);
        }
    }
}
