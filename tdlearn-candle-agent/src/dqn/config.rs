//! Configuration of DQN agent.
use super::DqnModelConfig;
use crate::{util::OutDim, Device};
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Dqn`](super::Dqn) agent.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DqnConfig<Q>
where
    Q: OutDim,
{
    /// Configuration of the action-value network and its optimizer.
    pub model_config: DqnModelConfig<Q>,

    /// Number of transitions sampled for each update.
    pub batch_size: usize,

    /// Discount factor.
    pub discount_factor: f64,

    /// Maximum global norm of the gradients.
    pub grad_clip_norm: f64,

    /// Soft update coefficient of the target network.
    pub tau: f64,

    /// Seed of the random number generator for exploration.
    pub seed: u64,

    /// Device.
    pub device: Device,
}

impl<Q> Default for DqnConfig<Q>
where
    Q: OutDim,
{
    fn default() -> Self {
        Self {
            model_config: DqnModelConfig::default(),
            batch_size: 32,
            discount_factor: 0.98,
            grad_clip_norm: 1000.0,
            tau: 0.001,
            seed: 42,
            device: Device::Cpu,
        }
    }
}

impl<Q> DqnConfig<Q>
where
    Q: DeserializeOwned + Serialize + OutDim,
{
    /// Sets the configuration of the model.
    pub fn model_config(mut self, model_config: DqnModelConfig<Q>) -> Self {
        self.model_config = model_config;
        self
    }

    /// Sets batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.discount_factor = v;
        self
    }

    /// Sets the maximum gradient norm.
    pub fn grad_clip_norm(mut self, v: f64) -> Self {
        self.grad_clip_norm = v;
        self
    }

    /// Sets soft update coefficient.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Sets the seed of the exploration.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the device.
    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Loads [`DqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DqnConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
