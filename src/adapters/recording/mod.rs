//! Recording adapters that capture interactions to cassettes.

pub mod clock;
pub mod filesystem;
pub mod git;
pub mod llm;

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::{json, Value};

use crate::cassette::CassetteRecorder;

pub use clock::RecordingClock;
pub use filesystem::RecordingFileSystem;
pub use git::RecordingGitRepo;
pub use llm::RecordingLlmClient;

/// Recorder shared by all adapters of one run.
pub type SharedRecorder = Arc<Mutex<CassetteRecorder>>;

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| {
        log::warn!(err:err; "value not representable in cassette");
        Value::Null
    })
}

fn push(recorder: &SharedRecorder, port: &str, method: &str, input: Value, output: Value) {
    let mut guard = recorder.lock().unwrap_or_else(PoisonError::into_inner);
    guard.record(port, method, input, output);
}

/// Records a call with a plain return value. Mirror of `replaying::next_output`.
pub(crate) fn record_interaction<I, O>(
    recorder: &SharedRecorder,
    port: &str,
    method: &str,
    input: &I,
    output: &O,
) where
    I: Serialize,
    O: Serialize,
{
    push(recorder, port, method, to_json(input), to_json(output));
}

/// Records a fallible call as `{"Ok": v}` or `{"Err": "message"}`.
/// Mirror of `replaying::replay_result`.
pub(crate) fn record_result<T, E, I>(
    recorder: &SharedRecorder,
    port: &str,
    method: &str,
    input: &I,
    result: &Result<T, E>,
) where
    T: Serialize,
    E: std::fmt::Display,
    I: Serialize,
{
    let output = match result {
        Ok(value) => json!({ "Ok": to_json(value) }),
        Err(err) => json!({ "Err": err.to_string() }),
    };
    push(recorder, port, method, to_json(input), output);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_use_ok_err_convention() {
        let dir = tempfile::tempdir().unwrap();
        let recorder: SharedRecorder =
            Arc::new(Mutex::new(CassetteRecorder::new(dir.path().join("c.yaml"), "t", "abc")));
        let ok: Result<u32, String> = Ok(3);
        let err: Result<u32, String> = Err("boom".into());
        record_result(&recorder, "git", "x", &(), &ok);
        record_result(&recorder, "git", "x", &(), &err);
        record_interaction(&recorder, "fs", "exists", &json!({"path": "a"}), &true);

        let path = recorder.lock().unwrap().save().unwrap();
        let cassette = crate::cassette::Cassette::load(&path).unwrap();
        assert_eq!(cassette.interactions[0].output, json!({"Ok": 3}));
        assert_eq!(cassette.interactions[1].output, json!({"Err": "boom"}));
        assert_eq!(cassette.interactions[2].output, json!(true));
    }
}
