//! Configuration of Actor-Critic agent.
use super::{GaussianPolicyConfig, ValueConfig};
use crate::{util::OutDim, Device};
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Surrogate objective of the policy.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum PolicyLoss {
    /// `mean(exp(-log_prob) * advantage)`.
    InverseLikelihood,

    /// `mean(-log_prob * advantage)`, the likelihood-ratio policy gradient.
    LogLikelihood,
}

impl Default for PolicyLoss {
    fn default() -> Self {
        Self::InverseLikelihood
    }
}

/// Configuration of [`ActorCritic`](super::ActorCritic) agent.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ActorCriticConfig<P, V>
where
    P: OutDim,
{
    /// Configuration of the policy.
    pub policy_config: GaussianPolicyConfig<P>,

    /// Configuration of the state-value function.
    pub value_config: ValueConfig<V>,

    /// Discount factor.
    pub gamma: f64,

    /// Surrogate objective of the policy.
    #[serde(default)]
    pub policy_loss: PolicyLoss,

    /// If `true`, the optimizer of the value function is stepped together
    /// with that of the policy.
    #[serde(default)]
    pub update_value_net: bool,

    /// Device.
    #[serde(default)]
    pub device: Device,
}

impl<P, V> Default for ActorCriticConfig<P, V>
where
    P: OutDim,
{
    fn default() -> Self {
        Self {
            policy_config: GaussianPolicyConfig::default(),
            value_config: ValueConfig::default(),
            gamma: 0.99,
            policy_loss: PolicyLoss::default(),
            update_value_net: false,
            device: Device::Cpu,
        }
    }
}

impl<P, V> ActorCriticConfig<P, V>
where
    P: DeserializeOwned + Serialize + OutDim,
    V: DeserializeOwned + Serialize,
{
    /// Sets the configuration of the policy.
    pub fn policy_config(mut self, v: GaussianPolicyConfig<P>) -> Self {
        self.policy_config = v;
        self
    }

    /// Sets the configuration of the state-value function.
    pub fn value_config(mut self, v: ValueConfig<V>) -> Self {
        self.value_config = v;
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Sets the surrogate objective of the policy.
    pub fn policy_loss(mut self, v: PolicyLoss) -> Self {
        self.policy_loss = v;
        self
    }

    /// Sets if the value function has its own optimizer step.
    pub fn update_value_net(mut self, v: bool) -> Self {
        self.update_value_net = v;
        self
    }

    /// Sets the device.
    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Loads [`ActorCriticConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ActorCriticConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
