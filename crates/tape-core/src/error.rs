//! Error types for the tape pipeline.

use thiserror::Error;

/// Error type shared by every tape crate.
///
/// Source exhaustion is never an error: it is reported through short frame
/// counts. Only buffer growth and invalid playback factors can fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The backing storage of a sample buffer could not be grown.
    #[error("Failed to allocate a sample buffer of {frames} frames")]
    AllocationFailure { frames: usize },

    /// A rate, tempo or pitch factor was zero, negative or not finite.
    #[error("Invalid parameter: {name} = {value} (must be a positive, finite number)")]
    InvalidParameter { name: &'static str, value: f64 },
}

impl Error {
    /// Reject factors that would turn into a division by zero downstream.
    pub fn check_positive(name: &'static str, value: f64) -> Result<f64> {
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(Error::InvalidParameter { name, value })
        }
    }
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
