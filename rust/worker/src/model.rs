//! Model state exchanged with the master.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use worker_core::codec::{decode_frame, encode_frame};
use worker_core::{ModelUpdate, Result};

/// Dense parameter vector of a linear model.
///
/// `weights[0]` is the intercept. The master averages the vectors sent by
/// its workers, weighted by `examples`, and publishes the result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterVector {
    pub weights: Vec<f64>,
    /// Examples that contributed to these weights.
    pub examples: u64,
    pub iteration: u32,
}

impl ParameterVector {
    pub fn new(weights: Vec<f64>, examples: u64, iteration: u32) -> Self {
        Self {
            weights,
            examples,
            iteration,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.weights.len()
    }
}

impl ModelUpdate for ParameterVector {
    fn to_bytes(&self) -> Result<Bytes> {
        encode_frame(self)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_frame(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let params = ParameterVector::new(vec![0.25, -3.5, 1e-9, 42.0], 1_000, 7);

        let bytes = params.to_bytes().unwrap();
        let decoded = ParameterVector::from_bytes(&bytes).unwrap();

        assert_eq!(decoded, params);
        assert_eq!(decoded.dimensions(), 4);
    }

    #[test]
    fn test_rejects_foreign_bytes() {
        assert!(ParameterVector::from_bytes(b"not a parameter vector").is_err());
        assert!(ParameterVector::from_bytes(&[]).is_err());
    }
}
