//! Replaying adapter for the `Clock` port.

use chrono::{DateTime, Utc};

use super::{replay_value, SharedReplayer};
use crate::ports::Clock;

/// Serves recorded clock readings.
pub struct ReplayingClock {
    replayer: SharedReplayer,
}

impl ReplayingClock {
    /// Creates a clock backed by `replayer`.
    #[must_use]
    pub fn new(replayer: SharedReplayer) -> Self {
        Self { replayer }
    }
}

impl Clock for ReplayingClock {
    fn now(&self) -> DateTime<Utc> {
        replay_value(&self.replayer, "clock", "now")
    }
}
