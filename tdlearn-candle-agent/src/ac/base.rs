//! Actor-Critic agent implemented with candle.
use super::{ActorCriticConfig, GaussianPolicy, PolicyLoss, Trajectory, TrajectoryStep, Value};
use crate::{
    model::SubModel1,
    util::{normalize, NamedTensors, OutDim},
};
use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::loss::mse;
use log::{debug, info, trace, warn};
use serde::{de::DeserializeOwned, Serialize};
use std::{convert::TryInto, fs, path::Path};
use tdlearn_core::{
    error::TdlError,
    record::{Record, RecordValue},
    Agent, Configurable,
};

const POLICY: &str = "policy";
const VALUE: &str = "value";

struct Losses {
    policy: Tensor,
    value: Tensor,
    advantage: Tensor,
}

/// Actor-Critic agent with a Gaussian policy and a state-value baseline.
///
/// The agent accumulates the steps of one episode with
/// [`ActorCritic::record`] and consumes them in [`ActorCritic::update`].
/// The value loss is the mean squared one-step TD error. The policy loss
/// weights the log-probabilities stored at action selection with the
/// normalized TD error.
pub struct ActorCritic<P, V>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    V: SubModel1<Input = Tensor, Output = Tensor>,
{
    policy: GaussianPolicy<P>,
    value: Value<V>,
    gamma: f64,
    policy_loss: PolicyLoss,
    update_value_net: bool,
    trajectory: Trajectory,
    train: bool,
    device: Device,
}

impl<P, V> ActorCritic<P, V>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    V: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
    V::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Returns an action for a single observation.
    ///
    /// With `evaluation`, the action is the mean of the policy and no
    /// log-probability is returned. Otherwise the action is sampled and
    /// returned with its log-probability, to be passed to
    /// [`ActorCritic::record`].
    pub fn select_action(
        &self,
        obs: &[f32],
        evaluation: bool,
    ) -> Result<(Vec<f32>, Option<Tensor>)> {
        let obs = Tensor::from_slice(obs, (1, obs.len()), &self.device)?;

        if evaluation {
            let act = self.policy.mean(&obs)?.detach().squeeze(0)?.to_vec1()?;
            Ok((act, None))
        } else {
            let (act, log_prob) = self.policy.sample(&obs)?;
            Ok((act.squeeze(0)?.to_vec1()?, Some(log_prob)))
        }
    }

    /// Appends a step of the current episode.
    pub fn record(
        &mut self,
        obs: &[f32],
        log_prob: Tensor,
        reward: f32,
        is_done: bool,
        next_obs: &[f32],
    ) {
        self.trajectory.push(TrajectoryStep {
            obs: obs.to_vec(),
            log_prob,
            reward,
            is_done,
            next_obs: next_obs.to_vec(),
        });
    }

    /// Returns the steps recorded since the last update.
    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    fn losses(&self, steps: &[TrajectoryStep]) -> Result<Losses> {
        let n = steps.len();
        let obs_dim = steps[0].obs.len();

        trace!("Stack {} steps", n);
        let obs = steps.iter().flat_map(|s| s.obs.iter().copied()).collect::<Vec<_>>();
        let obs = Tensor::from_vec(obs, (n, obs_dim), &self.device)?;
        let next_obs = steps
            .iter()
            .flat_map(|s| s.next_obs.iter().copied())
            .collect::<Vec<_>>();
        let next_obs = Tensor::from_vec(next_obs, (n, obs_dim), &self.device)?;
        let reward = steps.iter().map(|s| s.reward).collect::<Vec<_>>();
        let reward = Tensor::from_vec(reward, n, &self.device)?;
        let not_done = steps
            .iter()
            .map(|s| if s.is_done { 0f32 } else { 1f32 })
            .collect::<Vec<_>>();
        let not_done = Tensor::from_vec(not_done, n, &self.device)?;
        let log_prob = steps
            .iter()
            .map(|s| s.log_prob.to_device(&self.device)?.flatten_all())
            .collect::<candle_core::Result<Vec<_>>>()?;
        let log_prob = Tensor::cat(&log_prob, 0)?;

        let value = self.value.forward(&obs)?;
        let next_value = (self.value.forward(&next_obs)? * &not_done)?;
        let td_target = (reward + (next_value * self.gamma)?)?;
        let loss_value = mse(&value, &td_target)?;

        let advantage = normalize(&(&td_target - &value)?)?.detach();
        let loss_policy = match self.policy_loss {
            PolicyLoss::InverseLikelihood => (log_prob.neg()?.exp()? * &advantage)?.mean_all()?,
            PolicyLoss::LogLikelihood => (log_prob.neg()? * &advantage)?.mean_all()?,
        };

        Ok(Losses {
            policy: loss_policy,
            value: loss_value,
            advantage,
        })
    }

    /// Updates the agent with the steps recorded since the last update.
    ///
    /// The trajectory is emptied before any computation, so the steps are
    /// consumed even if the update fails. The returned record contains
    /// `loss_policy`, `loss_value` and `actor_logstd`, the mean of the log
    /// standard deviation of the policy.
    pub fn update(&mut self) -> Result<Record> {
        let steps = self.trajectory.drain();
        if steps.is_empty() {
            return Err(TdlError::EmptyTrajectory.into());
        }

        let losses = self.losses(&steps)?;
        let advantage: Vec<f32> = losses.advantage.to_vec1()?;
        if advantage.iter().any(|v| !v.is_finite()) {
            warn!(
                "Non-finite advantage over an episode of {} steps, the TD errors have no variance",
                steps.len()
            );
        }

        trace!("Backward");
        let loss = (&losses.policy + &losses.value)?;
        let grads = loss.backward()?;
        self.policy.step(&grads)?;
        if self.update_value_net {
            self.value.step(&grads)?;
        }

        let loss_policy = losses.policy.to_scalar::<f32>()?;
        let loss_value = losses.value.to_scalar::<f32>()?;
        let actor_logstd = self.policy.log_std().mean_all()?.to_scalar::<f32>()?;
        debug!(
            "loss_policy = {}, loss_value = {}, actor_logstd = {}",
            loss_policy, loss_value, actor_logstd
        );

        Ok(Record::from_slice(&[
            ("loss_policy", RecordValue::Scalar(loss_policy)),
            ("loss_value", RecordValue::Scalar(loss_value)),
            ("actor_logstd", RecordValue::Scalar(actor_logstd)),
        ]))
    }

    /// Returns the policy.
    pub fn policy(&self) -> &GaussianPolicy<P> {
        &self.policy
    }

    /// Returns the state-value function.
    pub fn value(&self) -> &Value<V> {
        &self.value
    }

    /// Saves the parameters of the policy and the value function to a single
    /// file, under `policy` and `value` respectively.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        NamedTensors::copy_from(&[
            (POLICY, self.policy.get_varmap()),
            (VALUE, self.value.get_varmap()),
        ])?
        .save(&path)?;
        info!("Save Actor-Critic agent to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the parameters written by [`ActorCritic::save`].
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        NamedTensors::load(&path, &self.device)?.copy_to(&[
            (POLICY, self.policy.get_varmap()),
            (VALUE, self.value.get_varmap()),
        ])?;
        info!("Load Actor-Critic agent from {:?}", path.as_ref());
        Ok(())
    }
}

impl<P, V> Configurable for ActorCritic<P, V>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    V: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
    V::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    type Config = ActorCriticConfig<P::Config, V::Config>;

    fn build(config: Self::Config) -> Result<Self> {
        let device: Device = config.device.try_into()?;
        let policy = GaussianPolicy::build(config.policy_config, &device)?;
        let value = Value::build(config.value_config, &device)?;

        Ok(Self {
            policy,
            value,
            gamma: config.gamma,
            policy_loss: config.policy_loss,
            update_value_net: config.update_value_net,
            trajectory: Trajectory::default(),
            train: true,
            device,
        })
    }
}

impl<P, V> Agent for ActorCritic<P, V>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    V: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
    V::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// The mode is informational: action selection is controlled by the
    /// `evaluation` argument of [`ActorCritic::select_action`].
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.save(path.join("ac.pt"))
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.load(path.join("ac.pt"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ac::{GaussianPolicyConfig, ValueConfig},
        mlp::{Activation, Mlp, MlpConfig},
    };

    fn config() -> ActorCriticConfig<MlpConfig, MlpConfig> {
        let policy_config = GaussianPolicyConfig::default().policy_config(
            MlpConfig::new(2, vec![64, 64], 1)
                .activation(Activation::Tanh)
                .out_init_std(0.01),
        );
        let value_config = ValueConfig::default()
            .value_config(MlpConfig::new(2, vec![64, 64], 1).activation(Activation::Tanh));
        ActorCriticConfig::default()
            .policy_config(policy_config)
            .value_config(value_config)
    }

    fn mean_std(xs: &[f32]) -> (f32, f32) {
        let n = xs.len() as f32;
        let mean = xs.iter().sum::<f32>() / n;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / (n - 1.0);
        (mean, var.sqrt())
    }

    fn record_episode(agent: &mut ActorCritic<Mlp, Mlp>, rewards: &[f32]) -> Result<()> {
        let n = rewards.len();
        for (i, reward) in rewards.iter().enumerate() {
            let obs = [i as f32 * 0.1, 1.0 - i as f32 * 0.2];
            let next_obs = [(i + 1) as f32 * 0.1, 1.0 - (i + 1) as f32 * 0.2];
            let (_, log_prob) = agent.select_action(&obs, false)?;
            let log_prob = log_prob.ok_or_else(|| anyhow::anyhow!("no log-probability"))?;
            agent.record(&obs, log_prob, *reward, i == n - 1, &next_obs);
        }
        Ok(())
    }

    #[test]
    fn test_advantage_is_normalized() -> Result<()> {
        let mut agent = ActorCritic::<Mlp, Mlp>::build(config())?;
        record_episode(&mut agent, &[1.0, -0.5, 2.0, 0.0, 3.0])?;

        let steps = agent.trajectory.drain();
        let losses = agent.losses(&steps)?;
        let advantage: Vec<f32> = losses.advantage.to_vec1()?;
        let (mean, std) = mean_std(&advantage);
        assert_eq!(advantage.len(), 5);
        assert!(mean.abs() < 1e-4);
        assert!((std - 1.0).abs() < 1e-4);

        Ok(())
    }

    #[test]
    fn test_update_drains_trajectory() -> Result<()> {
        let mut agent = ActorCritic::<Mlp, Mlp>::build(config())?;
        record_episode(&mut agent, &[1.0, 2.0, 0.5, -1.0])?;
        assert_eq!(agent.trajectory().len(), 4);

        let record = agent.update()?;
        assert!(agent.trajectory().is_empty());
        assert!(record.get_scalar("loss_policy")?.is_finite());
        assert!(record.get_scalar("loss_value")?.is_finite());

        Ok(())
    }

    #[test]
    fn test_update_empty_trajectory() -> Result<()> {
        let mut agent = ActorCritic::<Mlp, Mlp>::build(config())?;
        let err = agent.update().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TdlError>(),
            Some(TdlError::EmptyTrajectory)
        ));
        Ok(())
    }

    #[test]
    fn test_evaluation_action() -> Result<()> {
        let agent = ActorCritic::<Mlp, Mlp>::build(config())?;
        let obs = [0.3f32, -0.2];
        let (act1, log_prob) = agent.select_action(&obs, true)?;
        let (act2, _) = agent.select_action(&obs, true)?;
        assert!(log_prob.is_none());
        assert_eq!(act1.len(), 1);
        assert_eq!(act1, act2);

        let (act, log_prob) = agent.select_action(&obs, false)?;
        assert_eq!(act.len(), 1);
        assert!(log_prob.is_some());

        Ok(())
    }

    fn value_params(agent: &ActorCritic<Mlp, Mlp>) -> Result<NamedTensors> {
        NamedTensors::copy_from(&[("value", agent.value().get_varmap())])
    }

    fn max_abs_diff(nt1: &NamedTensors, nt2: &NamedTensors) -> Result<f32> {
        let mut diff = 0f32;
        for (k, t1) in nt1.named_tensors.iter() {
            let t2 = nt2
                .get(k)
                .ok_or_else(|| TdlError::MissingTensor(k.clone()))?;
            let d = (t1 - t2)?.abs()?.flatten_all()?.max(0)?;
            diff = diff.max(d.to_scalar::<f32>()?);
        }
        Ok(diff)
    }

    #[test]
    fn test_value_net_is_not_stepped_by_default() -> Result<()> {
        let mut agent = ActorCritic::<Mlp, Mlp>::build(config())?;
        let before = value_params(&agent)?;
        record_episode(&mut agent, &[1.0, 1.0, 1.0])?;
        agent.update()?;
        let after = value_params(&agent)?;
        assert_eq!(max_abs_diff(&before, &after)?, 0.0);
        Ok(())
    }

    #[test]
    fn test_value_net_is_stepped_on_request() -> Result<()> {
        let mut agent = ActorCritic::<Mlp, Mlp>::build(config().update_value_net(true))?;
        let before = value_params(&agent)?;
        record_episode(&mut agent, &[1.0, 1.0, 1.0])?;
        agent.update()?;
        let after = value_params(&agent)?;
        assert!(max_abs_diff(&before, &after)? > 0.0);
        Ok(())
    }
}
