//! Session clocks.
//!
//! Everything in a session is timed in seconds since the clock started, the
//! same reference the timing schedule uses for `ons`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// `std::time::Instant::now()` can panic on `wasm32-unknown-unknown` depending on
// how the runtime is configured. `web-time` provides a browser-backed monotonic
// clock via `performance.now()`.
#[cfg(target_arch = "wasm32")]
pub use web_time::Instant;

#[cfg(not(target_arch = "wasm32"))]
pub use std::time::Instant;

pub trait Clock {
    /// Seconds since the session clock started.
    fn now(&self) -> f64;

    /// Make `now()` read zero from this moment on, for every clone.
    fn restart(&self);
}

/// Wall-clock time, started when constructed. Clones share the zero point,
/// so a key reader thread and the trial loop agree after a restart.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    epoch: Instant,
    zero: Arc<AtomicU64>,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            zero: Arc::new(AtomicU64::new(0f64.to_bits())),
        }
    }

    fn elapsed(&self) -> f64 {
        Instant::now().duration_since(self.epoch).as_secs_f64()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.elapsed() - f64::from_bits(self.zero.load(Ordering::Relaxed))
    }

    fn restart(&self) {
        self.zero.store(self.elapsed().to_bits(), Ordering::Relaxed);
    }
}

/// Time that only moves when told to. Clones share the same counter, so a
/// display can advance the clock the trial loop reads.
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    bits: Arc<AtomicU64>,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, secs: f64) {
        let next = self.now() + secs.max(0.0);
        self.bits.store(next.to_bits(), Ordering::Relaxed);
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    fn restart(&self) {
        self.bits.store(0f64.to_bits(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_clones_share_time() {
        let a = SimulatedClock::new();
        let b = a.clone();
        assert_eq!(b.now(), 0.0);
        a.advance(1.5);
        a.advance(-3.0);
        assert_eq!(b.now(), 1.5);
    }

    #[test]
    fn restart_rezeroes_every_clone() {
        let sim = SimulatedClock::new();
        sim.advance(7.0);
        sim.clone().restart();
        assert_eq!(sim.now(), 0.0);

        let wall = MonotonicClock::start();
        let reader = wall.clone();
        std::thread::sleep(std::time::Duration::from_millis(20));
        wall.restart();
        assert!(reader.now() < 0.02);
    }

    #[test]
    fn monotonic_never_goes_back() {
        let clock = MonotonicClock::start();
        let t0 = clock.now();
        let t1 = clock.now();
        assert!(t1 >= t0);
    }
}
