//! Steps of an episode collected for the Actor-Critic update.
use candle_core::Tensor;

/// A transition recorded during an episode.
#[derive(Clone, Debug)]
pub struct TrajectoryStep {
    /// Observation.
    pub obs: Vec<f32>,

    /// Log-probability of the sampled action, attached to the policy's
    /// computation graph.
    pub log_prob: Tensor,

    /// Reward.
    pub reward: f32,

    /// Flag denoting if the episode ended with this step.
    pub is_done: bool,

    /// Next observation.
    pub next_obs: Vec<f32>,
}

/// Steps of one episode, consumed once by an update.
#[derive(Clone, Debug, Default)]
pub struct Trajectory {
    steps: Vec<TrajectoryStep>,
}

impl Trajectory {
    /// Appends a step.
    pub fn push(&mut self, step: TrajectoryStep) {
        self.steps.push(step);
    }

    /// Returns the number of recorded steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if no step is recorded.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns all recorded steps in order and leaves the trajectory empty.
    pub fn drain(&mut self) -> Vec<TrajectoryStep> {
        std::mem::take(&mut self.steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_drain() -> candle_core::Result<()> {
        let mut trajectory = Trajectory::default();
        for i in 0..3 {
            trajectory.push(TrajectoryStep {
                obs: vec![i as f32],
                log_prob: Tensor::new(&[0f32], &Device::Cpu)?,
                reward: 1.0,
                is_done: i == 2,
                next_obs: vec![i as f32 + 1.0],
            });
        }
        assert_eq!(trajectory.len(), 3);

        let steps = trajectory.drain();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2].obs, vec![2.0]);
        assert!(steps[2].is_done);
        assert!(trajectory.is_empty());

        Ok(())
    }
}
