//! System clock.

use chrono::{DateTime, SubsecRound, Utc};

use crate::ports::clock::Clock;

/// Reads the system clock, truncated to whole seconds so stamps written into
/// diagrams and reports stay short.
pub struct LiveClock;

impl Clock for LiveClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(0)
    }
}
