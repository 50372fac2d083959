//! Port traits defining external boundaries.
//!
//! Each trait is a boundary between the reconciliation core and something
//! outside the process (time, language model, filesystem, version control).
//! Implementations live in `src/adapters/`.

pub mod clock;
pub mod filesystem;
pub mod git;
pub mod llm;

pub use clock::Clock;
pub use filesystem::FileSystem;
pub use git::GitRepo;
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmFuture};

/// Error type shared by all port methods.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;
