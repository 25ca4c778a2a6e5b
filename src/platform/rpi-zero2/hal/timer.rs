//! System timer as the workload clock

use vcore::Clock;

use crate::platform_core::micros64;

/// Milliseconds since the firmware started the 1MHz system timer
pub struct SystemClock;

impl Clock for SystemClock {
    fn millis(&self) -> u64 {
        micros64() / 1000
    }
}
