//! Environment.
use anyhow::Result;
use std::fmt::Debug;

/// Represents an environment, typically an MDP.
///
/// Agents never drive an environment themselves; a training loop owned by the
/// caller alternates between [`Env::step`] and the agent's action selection.
pub trait Env {
    /// Observation of the environment.
    type Obs: Clone + Debug;

    /// Action of the environment.
    type Act: Clone + Debug;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Self::Obs>;

    /// Performes an environment step.
    fn step(&mut self, a: &Self::Act) -> Result<Step<Self>>
    where
        Self: Sized;
}

/// Represents an action, observation and reward tuple `(a_t, o_t+1, r_t)`
/// together with the termination flag.
pub struct Step<E: Env> {
    /// Action.
    pub act: E::Act,

    /// Observation after the action was applied.
    pub obs: E::Obs,

    /// Reward.
    pub reward: f32,

    /// Flag denoting if the episode ended with this step.
    pub is_done: bool,
}

impl<E: Env> Step<E> {
    /// Constructs a [`Step`] object.
    pub fn new(obs: E::Obs, act: E::Act, reward: f32, is_done: bool) -> Self {
        Step {
            act,
            obs,
            reward,
            is_done,
        }
    }
}
