//! Blocking delays measured on the monotonic clock.
//!
//! The bulk of a long wait is slept through, the rest is spun on [Instant]. Neither function
//! returns before its deadline.

use std::hint::spin_loop;
use std::thread;
use std::time::{Duration, Instant};

/// Remaining time below which the wait is finished by spinning instead of sleeping.
const SPIN_THRESHOLD: Duration = Duration::from_micros(200);

/// Blocks the current thread for at least `duration`.
pub fn hold(duration: Duration) {
    hold_until(Instant::now() + duration);
}

/// Blocks the current thread until the monotonic clock reaches `deadline`.
pub fn hold_until(deadline: Instant) {
    loop {
        let now = Instant::now();
        if now >= deadline {
            return;
        }

        let remaining = deadline - now;
        if remaining > SPIN_THRESHOLD {
            thread::sleep(remaining - SPIN_THRESHOLD);
        } else {
            spin_loop();
        }
    }
}
