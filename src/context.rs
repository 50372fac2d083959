//! Service context bundling all port trait objects.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::adapters::live::clock::LiveClock;
use crate::adapters::live::filesystem::LiveFileSystem;
use crate::adapters::live::git::LiveGitRepo;
use crate::adapters::live::llm::LiveLlmClient;
use crate::adapters::recording::{
    RecordingClock, RecordingFileSystem, RecordingGitRepo, RecordingLlmClient, SharedRecorder,
};
use crate::adapters::replaying::{
    ReplayingClock, ReplayingFileSystem, ReplayingGitRepo, ReplayingLlmClient,
};
use crate::cassette::{Cassette, CassetteError, CassetteRecorder, CassetteReplayer};
use crate::ports::{Clock, FileSystem, GitRepo, LlmClient};

/// Environment variable naming a cassette file to record the run into.
pub const RECORD_VAR: &str = "PIPEMAP_RECORD";

/// Bundles the port trait objects a run needs.
///
/// Constructors wire up live, recording or replaying adapters. Fields are
/// public so tests can swap a single port.
pub struct ServiceContext {
    /// Clock for timestamps.
    pub clock: Box<dyn Clock>,
    /// Filesystem for the diagram artifact and source scanning.
    pub fs: Box<dyn FileSystem>,
    /// Repository holding the pipeline sources.
    pub git: Box<dyn GitRepo>,
    /// Language model; `None` when no API key is configured.
    pub llm: Option<Box<dyn LlmClient>>,
    recorder: Option<SharedRecorder>,
}

impl ServiceContext {
    /// Live adapters rooted at `root`. The LLM port is present only when an
    /// API key is set in the environment.
    #[must_use]
    pub fn live(root: &Path) -> Self {
        Self {
            clock: Box::new(LiveClock),
            fs: Box::new(LiveFileSystem),
            git: Box::new(LiveGitRepo::new(root)),
            llm: LiveLlmClient::from_env().map(|c| Box::new(c) as Box<dyn LlmClient>),
            recorder: None,
        }
    }

    /// Live adapters wrapped so every call is recorded to `cassette`, which is
    /// written when the context is dropped.
    #[must_use]
    pub fn recording(root: &Path, cassette: &Path) -> Self {
        let recorder: SharedRecorder =
            Arc::new(Mutex::new(CassetteRecorder::new(cassette, "pipemap-run", "unknown")));
        let llm = LiveLlmClient::from_env().map(|live| {
            let inner: Box<dyn LlmClient> = Box::new(live);
            Box::new(RecordingLlmClient::new(inner, Arc::clone(&recorder))) as Box<dyn LlmClient>
        });
        Self {
            clock: Box::new(RecordingClock::new(Box::new(LiveClock), Arc::clone(&recorder))),
            fs: Box::new(RecordingFileSystem::new(Box::new(LiveFileSystem), Arc::clone(&recorder))),
            git: Box::new(RecordingGitRepo::new(
                Box::new(LiveGitRepo::new(root)),
                Arc::clone(&recorder),
            )),
            llm,
            recorder: Some(recorder),
        }
    }

    /// Every port served from one cassette file.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette cannot be read or parsed.
    pub fn replaying(path: &Path) -> Result<Self, CassetteError> {
        let cassette = Cassette::load(path)?;
        Ok(Self::replaying_cassette(&cassette))
    }

    /// Every port served from an in-memory cassette.
    #[must_use]
    pub fn replaying_cassette(cassette: &Cassette) -> Self {
        let replayer = Arc::new(Mutex::new(CassetteReplayer::new(cassette)));
        Self {
            clock: Box::new(ReplayingClock::new(Arc::clone(&replayer))),
            fs: Box::new(ReplayingFileSystem::new(Arc::clone(&replayer))),
            git: Box::new(ReplayingGitRepo::new(Arc::clone(&replayer))),
            llm: Some(Box::new(ReplayingLlmClient::new(replayer))),
            recorder: None,
        }
    }

    /// Picks recording when [`RECORD_VAR`] is set, live otherwise.
    #[must_use]
    pub fn from_env(root: &Path) -> Self {
        match std::env::var_os(RECORD_VAR) {
            Some(path) if !path.is_empty() => {
                log::info!(
                    cassette = path.to_string_lossy().as_ref();
                    "recording port interactions"
                );
                Self::recording(root, Path::new(&path))
            }
            _ => Self::live(root),
        }
    }

    /// Stamps the recording with the commit the run observed.
    pub fn note_commit(&self, commit: &str) {
        if let Some(recorder) = &self.recorder {
            recorder.lock().unwrap_or_else(PoisonError::into_inner).set_commit(commit);
        }
    }
}

impl Drop for ServiceContext {
    fn drop(&mut self) {
        let Some(recorder) = self.recorder.take() else {
            return;
        };
        let guard = recorder.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.save() {
            Ok(path) => log::info!(path:? = path, interactions = guard.len(); "cassette written"),
            Err(err) => log::warn!(err:err; "failed to write cassette"),
        }
    }
}
