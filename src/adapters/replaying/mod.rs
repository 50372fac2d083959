//! Replaying adapters that serve recorded interactions.
//!
//! All adapters of a replayed run share one [`CassetteReplayer`]; cursors are
//! kept per port/method pair, so call order only matters within a pair.

pub mod clock;
pub mod filesystem;
pub mod git;
pub mod llm;

use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cassette::{CassetteError, CassetteReplayer};
use crate::ports::PortError;

pub use clock::ReplayingClock;
pub use filesystem::ReplayingFileSystem;
pub use git::ReplayingGitRepo;
pub use llm::ReplayingLlmClient;

/// Replayer shared by all adapters of one run.
pub type SharedReplayer = Arc<Mutex<CassetteReplayer>>;

/// Output of the next recorded `port::method` call.
pub(crate) fn next_output(
    replayer: &SharedReplayer,
    port: &str,
    method: &str,
) -> Result<Value, CassetteError> {
    let mut guard = replayer.lock().unwrap_or_else(PoisonError::into_inner);
    guard.next_interaction(port, method).map(|interaction| interaction.output)
}

/// Decodes a `{"Ok": v}` / `{"Err": "message"}` output recorded by
/// `recording::record_result`.
pub(crate) fn replay_result<T: DeserializeOwned>(
    output: Result<Value, CassetteError>,
    context: &str,
) -> Result<T, PortError> {
    let output = output?;
    if let Some(err) = output.get("Err") {
        return Err(err.as_str().unwrap_or("unknown error").to_string().into());
    }
    let value = output.get("Ok").cloned().unwrap_or(output);
    serde_json::from_value(value)
        .map_err(|e| format!("{context}: failed to deserialize: {e}").into())
}

/// Decodes a plain output recorded by `recording::record_interaction`.
///
/// # Panics
///
/// Panics if the cassette has no usable recording: infallible port methods
/// have no error channel, and a replayed run cannot continue without one.
pub(crate) fn replay_value<T: DeserializeOwned>(
    replayer: &SharedReplayer,
    port: &str,
    method: &str,
) -> T {
    let decoded = next_output(replayer, port, method)
        .map_err(|e| e.to_string())
        .and_then(|output| serde_json::from_value(output).map_err(|e| e.to_string()));
    match decoded {
        Ok(value) => value,
        Err(message) => panic!("replaying {port}::{method}: {message}"),
    }
}

#[cfg(test)]
pub(crate) fn replayer_for(interactions: Vec<(&str, &str, Value)>) -> SharedReplayer {
    use crate::cassette::{Cassette, Interaction};

    let cassette = Cassette {
        name: "test".into(),
        recorded_at: chrono::Utc::now(),
        commit: "abc".into(),
        interactions: interactions
            .into_iter()
            .enumerate()
            .map(|(seq, (port, method, output))| Interaction {
                seq: seq as u64,
                port: port.into(),
                method: method.into(),
                input: Value::Null,
                output,
            })
            .collect(),
    };
    Arc::new(Mutex::new(CassetteReplayer::new(&cassette)))
}
