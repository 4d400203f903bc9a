#![warn(missing_docs)]
//! Interfaces shared by the agents of tdlearn.
//!
//! The agents themselves live in backend crates. This crate only describes
//! the collaborators they talk to: an environment, a replay buffer handing out
//! batches of transitions, and the records an update step reports.
pub mod error;
pub mod record;

mod base;
pub use base::{Agent, Configurable, Env, ReplayBufferBase, Step, TransitionBatch};
