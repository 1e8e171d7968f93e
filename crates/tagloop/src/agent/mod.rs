//! Session construction and the turn loop.
//!
//! - [`env`]: `config.json`, path policy and the session directory.
//! - [`events`]: the observational event sink and its handlers.
//! - [`harness`]: [`Agent`](harness::Agent), its builder and outcomes.
//! - [`prompt`]: system prompt rendering from the live tool catalog.

pub mod env;
pub mod events;
pub mod harness;
pub mod prompt;
