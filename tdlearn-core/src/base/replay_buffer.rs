//! Replay buffer interface.
use super::TransitionBatch;
use anyhow::Result;

/// Interface for replay buffers that generate batches for training.
///
/// Storing transitions is left to the implementor; agents only ever sample.
pub trait ReplayBufferBase {
    /// The type of batch generated for training.
    type Batch: TransitionBatch;

    /// Samples a batch of `size` transitions.
    ///
    /// Callers are expected to hold off sampling until the buffer contains at
    /// least `size` transitions.
    fn batch(&mut self, size: usize) -> Result<Self::Batch>;

    /// Returns the current number of transitions in the buffer.
    fn len(&self) -> usize;

    /// Returns `true` if the buffer holds no transitions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
