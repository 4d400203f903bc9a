//! Gaussian policy.
use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::OutDim,
};
use anyhow::{Context, Result};
use candle_core::{backprop::GradStore, DType, Device, Tensor, D};
use candle_nn::{Init, VarBuilder, VarMap};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

fn default_init_log_std() -> f64 {
    1.0
}

/// Configuration of [`GaussianPolicy`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct GaussianPolicyConfig<P> {
    /// Configuration of the network computing the mean action.
    pub policy_config: Option<P>,

    /// Initial value of every element of the log standard deviation.
    #[serde(default = "default_init_log_std")]
    pub init_log_std: f64,

    /// Configuration of optimizer.
    pub opt_config: OptimizerConfig,
}

impl<P> Default for GaussianPolicyConfig<P> {
    fn default() -> Self {
        Self {
            policy_config: None,
            init_log_std: default_init_log_std(),
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<P> GaussianPolicyConfig<P>
where
    P: DeserializeOwned + Serialize,
{
    /// Sets configurations for the mean network.
    pub fn policy_config(mut self, v: P) -> Self {
        self.policy_config = Some(v);
        self
    }

    /// Sets the initial log standard deviation.
    pub fn init_log_std(mut self, v: f64) -> Self {
        self.init_log_std = v;
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Loads [`GaussianPolicyConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`GaussianPolicyConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Diagonal Gaussian policy over continuous actions.
///
/// The mean depends on the observation while the log standard deviation is a
/// single learned vector shared across all observations.
pub struct GaussianPolicy<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
{
    varmap: VarMap,
    mean: P,
    log_std: Tensor,
    opt: Optimizer,
}

impl<P> GaussianPolicy<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`GaussianPolicy`].
    ///
    /// Variables are registered with the prefix `actor`, the log standard
    /// deviation as `actor.log_std`.
    pub fn build(config: GaussianPolicyConfig<P::Config>, device: &Device) -> Result<Self> {
        let policy_config = config.policy_config.context("policy_config is not set.")?;
        let act_dim = policy_config.get_out_dim();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device).set_prefix("actor");
        let mean = P::build(vb.clone(), policy_config)?;
        let log_std = vb.get_with_hints(act_dim, "log_std", Init::Const(config.init_log_std))?;
        let opt = config.opt_config.build(varmap.all_vars())?;

        Ok(Self {
            varmap,
            mean,
            log_std,
            opt,
        })
    }

    /// Returns the mean action, shape `[batch_size, act_dim]`.
    pub fn mean(&self, obs: &Tensor) -> Result<Tensor> {
        self.mean.forward(obs)
    }

    /// Samples actions and returns them with their log-probabilities.
    ///
    /// Sampled actions are detached, log-probabilities are summed over action
    /// dimensions and keep the gradient path to the parameters.
    pub fn sample(&self, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        let mean = self.mean(obs)?;
        let std = self.log_std.exp()?;
        let eps = mean.randn_like(0.0, 1.0)?;
        let act = mean.broadcast_add(&eps.broadcast_mul(&std)?)?.detach();
        let log_prob = self.log_prob_with_mean(&act, &mean)?;
        Ok((act, log_prob))
    }

    /// Log-probabilities of the given actions, shape `[batch_size]`.
    pub fn log_prob(&self, obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        let mean = self.mean(obs)?;
        self.log_prob_with_mean(act, &mean)
    }

    fn log_prob_with_mean(&self, act: &Tensor, mean: &Tensor) -> Result<Tensor> {
        let std = self.log_std.exp()?;
        let z = (act - mean)?.broadcast_div(&std)?;
        let log_z = -0.5 * (2.0 * std::f64::consts::PI).ln();
        let logp = ((z.sqr()? * -0.5)?.broadcast_sub(&self.log_std)? + log_z)?;
        Ok(logp.sum(D::Minus1)?)
    }

    /// Returns the log standard deviation.
    pub fn log_std(&self) -> &Tensor {
        &self.log_std
    }

    /// Applies an optimizer step with precomputed gradients.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        self.opt.step(grads)
    }

    /// Returns the variables of the policy.
    pub fn get_varmap(&self) -> &VarMap {
        &self.varmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlp::{Mlp, MlpConfig};

    fn policy(init_log_std: f64) -> Result<GaussianPolicy<Mlp>> {
        let config = GaussianPolicyConfig::default()
            .policy_config(MlpConfig::new(3, vec![16], 2).out_init_std(0.0))
            .init_log_std(init_log_std);
        GaussianPolicy::build(config, &Device::Cpu)
    }

    #[test]
    fn test_log_prob_standard_normal() -> Result<()> {
        // zero mean from the zero-initialized output layer, unit variance
        let policy = policy(0.0)?;
        let obs = Tensor::new(&[[0.1f32, 0.2, 0.3]], &Device::Cpu)?;
        let act = Tensor::new(&[[1f32, -1.0]], &Device::Cpu)?;
        let logp: Vec<f32> = policy.log_prob(&obs, &act)?.to_vec1()?;
        let expected = -1.0 - (2.0 * std::f32::consts::PI).ln();
        assert!((logp[0] - expected).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_sample() -> Result<()> {
        let policy = policy(1.0)?;
        let obs = Tensor::new(&[[0.1f32, 0.2, 0.3]], &Device::Cpu)?;
        let (act, logp) = policy.sample(&obs)?;
        assert_eq!(act.dims(), &[1, 2]);
        assert_eq!(logp.dims(), &[1]);

        // The sampled action is a constant of the log-probability, so the
        // gradient w.r.t. the mean is (act - mean) / std^2, i.e. the gradient
        // of the output bias of the mean network.
        let grads = logp.sum_all()?.backward()?;
        assert!(grads.get(policy.log_std()).is_some());
        let grad_bias: Vec<f32> = {
            let data = policy.get_varmap().data().lock().unwrap();
            let bias = data.get("actor.mlp.ln1.bias").unwrap();
            grads.get(bias.as_tensor()).unwrap().to_vec1()?
        };
        let mean: Vec<f32> = policy.mean(&obs)?.squeeze(0)?.to_vec1()?;
        let act: Vec<f32> = act.squeeze(0)?.to_vec1()?;
        let var = (2.0f32).exp();
        for i in 0..2 {
            let expected = (act[i] - mean[i]) / var;
            assert!(
                (grad_bias[i] - expected).abs() < 1e-4,
                "{} != {}",
                grad_bias[i],
                expected
            );
        }

        let log_std: Vec<f32> = policy.log_std().to_vec1()?;
        assert_eq!(log_std, vec![1.0, 1.0]);
        Ok(())
    }
}
