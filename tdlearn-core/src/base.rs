//! Core functionalities.
mod agent;
mod batch;
mod env;
mod replay_buffer;
pub use agent::{Agent, Configurable};
pub use batch::TransitionBatch;
pub use env::{Env, Step};
pub use replay_buffer::ReplayBufferBase;
