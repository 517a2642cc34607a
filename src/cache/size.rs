//! Size Estimation Module
//!
//! Pluggable strategies for estimating how much memory a cached value holds.

use std::marker::PhantomData;

use serde::Serialize;
use tracing::debug;

/// Estimates the size in bytes of a cached value.
pub trait SizeEstimator<V>: Send + Sync {
    fn estimate(&self, value: &V) -> usize;
}

// == JSON Estimator ==
/// Uses the length of the JSON encoding as the size estimate.
///
/// Values that cannot be serialized are counted as zero bytes; the write
/// itself still goes through.
#[derive(Debug)]
pub struct JsonSizeEstimator<V>(PhantomData<fn(&V)>);

impl<V> JsonSizeEstimator<V> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<V> Default for JsonSizeEstimator<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize> SizeEstimator<V> for JsonSizeEstimator<V> {
    fn estimate(&self, value: &V) -> usize {
        match serde_json::to_vec(value) {
            Ok(bytes) => bytes.len(),
            Err(e) => {
                debug!("Size estimate unavailable, counting as 0 bytes: {}", e);
                0
            }
        }
    }
}

impl<V, F> SizeEstimator<V> for F
where
    F: Fn(&V) -> usize + Send + Sync,
{
    fn estimate(&self, value: &V) -> usize {
        self(value)
    }
}
