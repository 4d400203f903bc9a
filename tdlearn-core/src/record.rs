//! Records of diagnostic values.
//!
//! Update steps of the agents return a [`Record`] holding the scalars a training
//! loop would log, e.g. the loss or the mean of predicted action values.
use crate::error::TdlError;
use std::collections::HashMap;

/// Represents possible types of values that can be stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value, typically used for metrics like loss.
    Scalar(f32),
}

/// A container for storing key-value pairs of diagnostic values.
///
/// # Examples
///
/// ```rust
/// use tdlearn_core::record::{Record, RecordValue};
///
/// let record = Record::from_slice(&[
///     ("loss", RecordValue::Scalar(0.5)),
///     ("q_mean", RecordValue::Scalar(1.5)),
/// ]);
///
/// assert_eq!(record.get_scalar("loss").unwrap(), 0.5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Gets a scalar value from the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not exist.
    pub fn get_scalar(&self, k: &str) -> Result<f32, TdlError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            None => Err(TdlError::RecordKeyError(k.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_scalar() {
        let record = Record::from_slice(&[
            ("loss", RecordValue::Scalar(0.25)),
            ("q_mean", RecordValue::Scalar(-1.0)),
        ]);

        assert_eq!(record.get_scalar("loss").unwrap(), 0.25);
        assert_eq!(record.get_scalar("q_mean").unwrap(), -1.0);
        assert!(matches!(
            record.get_scalar("grad_norm"),
            Err(TdlError::RecordKeyError(_))
        ));
    }

    #[test]
    fn test_duplicate_keys() {
        let record = Record::from_slice(&[
            ("loss", RecordValue::Scalar(1.0)),
            ("loss", RecordValue::Scalar(3.0)),
        ]);
        assert_eq!(record.get_scalar("loss").unwrap(), 3.0);
    }
}
