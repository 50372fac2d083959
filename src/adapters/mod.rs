//! Adapters implementing the port traits.
//!
//! `live` talks to the real world, `recording` wraps live adapters and writes
//! every call to a cassette, `replaying` serves calls back from a cassette.

pub mod live;
pub mod recording;
pub mod replaying;
