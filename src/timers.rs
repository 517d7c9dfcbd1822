//! RAII timing for evaluation phases.

use std::time::{Duration, Instant};

/// Adds the time between construction and drop to `slot`.
///
/// Early returns through `?` still record the phase.
///
/// ```rust,ignore
/// let mut identity = Duration::ZERO;
/// {
///     let _timer = PhaseTimer::new(&mut identity);
///     // analyze identity policies
/// }
/// ```
pub struct PhaseTimer<'a> {
    start: Instant,
    slot: &'a mut Duration,
}

impl<'a> PhaseTimer<'a> {
    pub fn new(slot: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            slot,
        }
    }
}

impl Drop for PhaseTimer<'_> {
    fn drop(&mut self) {
        *self.slot += self.start.elapsed();
    }
}

/// Convert a phase duration to fractional milliseconds.
pub fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Run `f`, adding its duration to `slot`.
pub fn timed<T>(slot: &mut Duration, f: impl FnOnce() -> T) -> T {
    let _timer = PhaseTimer::new(slot);
    f()
}
