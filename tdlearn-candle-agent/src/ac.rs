//! Actor-Critic agent.
mod base;
mod config;
mod policy;
mod trajectory;
mod value;
pub use base::ActorCritic;
pub use config::{ActorCriticConfig, PolicyLoss};
pub use policy::{GaussianPolicy, GaussianPolicyConfig};
pub use trajectory::{Trajectory, TrajectoryStep};
pub use value::{Value, ValueConfig};
