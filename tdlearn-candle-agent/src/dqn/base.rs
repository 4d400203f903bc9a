//! DQN agent implemented with candle.
use super::{config::DqnConfig, model::DqnModel};
use crate::{
    model::SubModel1,
    util::{clip_grad_norm, track, NamedTensors, OutDim},
};
use anyhow::Result;
use candle_core::{shape::D, DType, Device, Tensor};
use log::{debug, info, trace};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{de::DeserializeOwned, Serialize};
use std::{convert::TryInto, fs, path::Path};
use tdlearn_core::{
    error::TdlError,
    record::{Record, RecordValue},
    Agent, Configurable, ReplayBufferBase, TransitionBatch,
};

const POLICY: &str = "policy";
const POLICY_TARGET: &str = "policy_target";

/// DQN agent implemented with candle.
///
/// Actions are selected greedily with respect to the target network, with a
/// uniformly random action taken with probability `epsilon`. The caller owns
/// the schedule of `epsilon`.
#[allow(clippy::upper_case_acronyms)]
pub struct Dqn<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    qnet: DqnModel<Q>,
    qnet_tgt: DqnModel<Q>,
    batch_size: usize,
    discount_factor: f64,
    grad_clip_norm: f64,
    tau: f64,
    n_updates: usize,
    train: bool,
    device: Device,
    rng: SmallRng,
}

impl<Q> Dqn<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Returns the loss, the predicted action values of the taken actions and
    /// the bootstrap targets.
    ///
    /// `act` holds action indices of shape `[batch_size]`.
    fn critic_loss(
        &self,
        obs: &Tensor,
        act: &Tensor,
        next_obs: &Tensor,
        reward: &[f32],
        not_done: &[f32],
    ) -> Result<(Tensor, Tensor, Tensor)> {
        let batch_size = reward.len();

        let pred = {
            let act = act
                .to_device(&self.device)?
                .to_dtype(DType::U32)?
                .reshape((batch_size, 1))?;
            let x = self.qnet.forward(obs)?;
            x.gather(&act, D::Minus1)?.squeeze(D::Minus1)?
        };

        let tgt = {
            // Values of terminal next states stay zero
            let next_value = Tensor::zeros(batch_size, DType::F32, &self.device)?;
            let ixs = not_done
                .iter()
                .enumerate()
                .filter(|(_, v)| **v != 0.0)
                .map(|(i, _)| i as u32)
                .collect::<Vec<_>>();
            let next_value = if ixs.is_empty() {
                next_value
            } else {
                let n = ixs.len();
                let ixs = Tensor::from_vec(ixs, n, &self.device)?;
                let next_obs = next_obs.to_device(&self.device)?.index_select(&ixs, 0)?;
                let q = self.qnet_tgt.forward(&next_obs)?.max(D::Minus1)?.detach();
                next_value.index_add(&ixs, &q, 0)?
            };
            let reward = Tensor::from_slice(reward, batch_size, &self.device)?;
            (reward + (next_value * self.discount_factor)?)?.detach()
        };

        let loss = ((&pred - &tgt)?.sqr()?.sum_all()? * 0.5)?;

        Ok((loss, pred, tgt))
    }

    /// Selects an action for a single observation.
    ///
    /// With probability `epsilon`, returns an action drawn uniformly from
    /// `[0, n_actions)`. Otherwise returns the action maximizing the value
    /// estimated by the target network.
    pub fn select_action(&mut self, obs: &[f32], epsilon: f64) -> Result<usize> {
        if self.rng.gen::<f64>() < epsilon {
            let n_actions = self.qnet_tgt.out_dim();
            Ok(self.rng.gen_range(0..n_actions))
        } else {
            let obs = Tensor::from_slice(obs, (1, obs.len()), &self.device)?;
            let a = self
                .qnet_tgt
                .forward(&obs)?
                .detach()
                .squeeze(0)?
                .argmax(D::Minus1)?
                .to_scalar::<u32>()?;
            Ok(a as usize)
        }
    }

    /// Performs a gradient step on a batch sampled from `buffer`, then moves
    /// the target network toward the policy network.
    ///
    /// The returned record contains `loss`, `q_mean`, `num_update` and
    /// `grad_norm`, the gradient norm before clipping.
    pub fn update<R>(&mut self, buffer: &mut R) -> Result<Record>
    where
        R: ReplayBufferBase,
        <R::Batch as TransitionBatch>::ObsBatch: Into<Tensor>,
        <R::Batch as TransitionBatch>::ActBatch: Into<Tensor>,
    {
        trace!("Sample a batch");
        let batch = buffer.batch(self.batch_size)?;
        if batch.len() != self.batch_size {
            return Err(TdlError::BatchSize {
                expected: self.batch_size,
                actual: batch.len(),
            }
            .into());
        }
        let (obs, act, next_obs, reward, not_done) = batch.unpack();

        let (loss, pred, _) = self.critic_loss(
            &obs.into(),
            &act.into(),
            &next_obs.into(),
            &reward,
            &not_done,
        )?;

        trace!("Backward");
        let mut grads = loss.backward()?;
        let vars = self.qnet.get_varmap().all_vars();
        let grad_norm = clip_grad_norm(&mut grads, &vars, self.grad_clip_norm)?;
        self.qnet.step(&grads)?;

        trace!("Soft update");
        track(self.qnet_tgt.get_varmap(), self.qnet.get_varmap(), self.tau)?;

        self.n_updates += 1;

        let loss = loss.to_scalar::<f32>()?;
        let q_mean = pred.mean_all()?.to_scalar::<f32>()?;
        debug!(
            "update {}: loss = {}, q_mean = {}, grad_norm = {}",
            self.n_updates, loss, q_mean, grad_norm
        );

        Ok(Record::from_slice(&[
            ("loss", RecordValue::Scalar(loss)),
            ("q_mean", RecordValue::Scalar(q_mean)),
            ("num_update", RecordValue::Scalar(self.n_updates as f32)),
            ("grad_norm", RecordValue::Scalar(grad_norm)),
        ]))
    }

    /// Returns the number of updates performed so far.
    pub fn num_updates(&self) -> usize {
        self.n_updates
    }

    /// Returns the policy network.
    pub fn qnet(&self) -> &DqnModel<Q> {
        &self.qnet
    }

    /// Returns the target network.
    pub fn qnet_tgt(&self) -> &DqnModel<Q> {
        &self.qnet_tgt
    }

    /// Saves the parameters of both networks to a single file.
    ///
    /// The policy network is stored under `policy` and the target network
    /// under `policy_target`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        NamedTensors::copy_from(&[
            (POLICY, self.qnet.get_varmap()),
            (POLICY_TARGET, self.qnet_tgt.get_varmap()),
        ])?
        .save(&path)?;
        info!("Save DQN agent to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the parameters of both networks written by [`Dqn::save`].
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        NamedTensors::load(&path, &self.device)?.copy_to(&[
            (POLICY, self.qnet.get_varmap()),
            (POLICY_TARGET, self.qnet_tgt.get_varmap()),
        ])?;
        info!("Load DQN agent from {:?}", path.as_ref());
        Ok(())
    }
}

impl<Q> Configurable for Dqn<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    type Config = DqnConfig<Q::Config>;

    /// Constructs DQN agent.
    ///
    /// The target network starts as an exact copy of the policy network.
    fn build(config: Self::Config) -> Result<Self> {
        let device: Device = config.device.try_into()?;
        let qnet = DqnModel::build(config.model_config, device.clone())?;
        let qnet_tgt = qnet.duplicate()?;

        Ok(Dqn {
            qnet,
            qnet_tgt,
            batch_size: config.batch_size,
            discount_factor: config.discount_factor,
            grad_clip_norm: config.grad_clip_norm,
            tau: config.tau,
            n_updates: 0,
            train: true,
            device,
            rng: SmallRng::seed_from_u64(config.seed),
        })
    }
}

impl<Q> Agent for Dqn<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// The mode is informational: exploration is controlled by the
    /// `epsilon` argument of [`Dqn::select_action`].
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
        self.save(path.join("dqn.pt"))
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.load(path.join("dqn.pt"))
    }
}
