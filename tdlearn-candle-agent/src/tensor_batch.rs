//! Batch of transitions backed by candle tensors.
use candle_core::{Device, Result, Tensor};
use tdlearn_core::TransitionBatch;

/// A batch of transitions stored as [`Tensor`]s.
///
/// Observations have the shape `[batch_size, obs_dim]` and actions have the
/// shape `[batch_size]`. Rewards and termination masks are kept on the host.
#[derive(Clone, Debug)]
pub struct TensorBatch {
    obs: Tensor,
    act: Tensor,
    next_obs: Tensor,
    reward: Vec<f32>,
    not_done: Vec<f32>,
}

impl TensorBatch {
    /// Constructs a batch from flattened host data.
    ///
    /// `obs` and `next_obs` hold `reward.len()` observations of `obs_dim`
    /// values each, `act` holds discrete action indices and `is_done` the
    /// termination flags.
    pub fn from_slices(
        obs: &[f32],
        act: &[u32],
        next_obs: &[f32],
        reward: &[f32],
        is_done: &[bool],
        obs_dim: usize,
        device: &Device,
    ) -> Result<Self> {
        let batch_size = reward.len();
        let not_done = is_done.iter().map(|&d| if d { 0f32 } else { 1f32 }).collect();

        Ok(Self {
            obs: Tensor::from_slice(obs, (batch_size, obs_dim), device)?,
            act: Tensor::from_slice(act, batch_size, device)?,
            next_obs: Tensor::from_slice(next_obs, (batch_size, obs_dim), device)?,
            reward: reward.to_vec(),
            not_done,
        })
    }
}

impl TransitionBatch for TensorBatch {
    type ObsBatch = Tensor;
    type ActBatch = Tensor;

    fn unpack(self) -> (Tensor, Tensor, Tensor, Vec<f32>, Vec<f32>) {
        (self.obs, self.act, self.next_obs, self.reward, self.not_done)
    }

    fn len(&self) -> usize {
        self.reward.len()
    }

    fn obs(&self) -> &Tensor {
        &self.obs
    }

    fn act(&self) -> &Tensor {
        &self.act
    }

    fn next_obs(&self) -> &Tensor {
        &self.next_obs
    }

    fn reward(&self) -> &[f32] {
        &self.reward
    }

    fn not_done(&self) -> &[f32] {
        &self.not_done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slices() -> Result<()> {
        let batch = TensorBatch::from_slices(
            &[0.0, 1.0, 2.0, 3.0],
            &[1, 0],
            &[1.0, 2.0, 3.0, 4.0],
            &[0.5, -1.0],
            &[false, true],
            2,
            &Device::Cpu,
        )?;

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.obs().dims(), &[2, 2]);
        assert_eq!(batch.act().dims(), &[2]);
        assert_eq!(batch.not_done(), &[1.0, 0.0]);

        Ok(())
    }
}
