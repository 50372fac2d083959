//! Replays recorded interactions from a cassette.

use std::collections::{HashMap, VecDeque};

use super::format::{Cassette, Interaction};
use super::CassetteError;

/// Serves interactions in recorded order, independently per port/method pair.
pub struct CassetteReplayer {
    queues: HashMap<(String, String), VecDeque<Interaction>>,
    counts: HashMap<(String, String), usize>,
}

impl CassetteReplayer {
    /// Indexes a loaded cassette.
    #[must_use]
    pub fn new(cassette: &Cassette) -> Self {
        let mut queues: HashMap<(String, String), VecDeque<Interaction>> = HashMap::new();
        for interaction in &cassette.interactions {
            let key = (interaction.port.clone(), interaction.method.clone());
            queues.entry(key).or_default().push_back(interaction.clone());
        }
        let counts = queues.iter().map(|(k, q)| (k.clone(), q.len())).collect();
        Self { queues, counts }
    }

    /// Takes the next interaction recorded for `port::method`.
    ///
    /// # Errors
    ///
    /// Returns [`CassetteError::Unrecorded`] if the pair never occurs and
    /// [`CassetteError::Exhausted`] once every recording has been served.
    pub fn next_interaction(
        &mut self,
        port: &str,
        method: &str,
    ) -> Result<Interaction, CassetteError> {
        let key = (port.to_string(), method.to_string());
        let Some(queue) = self.queues.get_mut(&key) else {
            let mut available: Vec<String> =
                self.queues.keys().map(|(p, m)| format!("{p}::{m}")).collect();
            available.sort();
            return Err(CassetteError::Unrecorded {
                port: key.0,
                method: key.1,
                available: available.join(", "),
            });
        };
        queue.pop_front().ok_or_else(|| CassetteError::Exhausted {
            count: self.counts.get(&key).copied().unwrap_or_default(),
            port: key.0,
            method: key.1,
        })
    }

    /// Number of interactions not yet served.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}
