//! Batch.

/// A batch of transitions `(o_t, a_t, o_t+1, r_t, not_done_t)`.
///
/// All fields are aligned by transition index and share the same leading size.
/// `not_done` is a binary mask, `1 - is_done`.
pub trait TransitionBatch {
    /// A set of observations in a batch.
    type ObsBatch;

    /// A set of actions in a batch.
    type ActBatch;

    /// Unpack the data `(o_t, a_t, o_t+1, r_t, not_done_t)`.
    fn unpack(self) -> (Self::ObsBatch, Self::ActBatch, Self::ObsBatch, Vec<f32>, Vec<f32>);

    /// Returns the number of transitions.
    fn len(&self) -> usize;

    /// Returns `true` if the batch holds no transitions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `o_t`.
    fn obs(&self) -> &Self::ObsBatch;

    /// Returns `a_t`.
    fn act(&self) -> &Self::ActBatch;

    /// Returns `o_t+1`.
    fn next_obs(&self) -> &Self::ObsBatch;

    /// Returns `r_t`.
    fn reward(&self) -> &[f32];

    /// Returns `not_done_t`.
    fn not_done(&self) -> &[f32];
}
