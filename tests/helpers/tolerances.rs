//! Tolerance constants for pipeline testing.
//!
//! Different checks need different precision levels.

/// Floating point rounding errors (passthrough, unity settings).
/// Use for paths that should be sample exact.
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Silence threshold (~-80dB).
/// Values below this are considered silent.
pub const SILENCE_THRESHOLD: f32 = 0.0001;

/// Relative error allowed on a zero-crossing frequency estimate.
/// WSOLA splices shift phase slightly at each sequence boundary.
pub const FREQUENCY_TOLERANCE: f64 = 0.03;

/// Relative error allowed between the energy of two renders of the same input.
pub const ENERGY_TOLERANCE: f32 = 0.1;

/// Frames an output length may differ from `input * tempo / rate`.
pub const LENGTH_TOLERANCE_FRAMES: usize = 1;
