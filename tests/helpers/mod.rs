//! Test helpers and fixtures for tape integration tests
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact paths (passthrough, unity settings)
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)
//! - `FREQUENCY_TOLERANCE` (3%): Pitch estimates after stretching
//! - `ENERGY_TOLERANCE` (10%): RMS comparisons between renders

#![allow(dead_code)]

pub mod tolerances;

use std::sync::Once;
use tape::prelude::*;
use tape::CHANNELS;

/// Default test sample rate (the pipeline default)
pub const TEST_SAMPLE_RATE: u32 = 44100;

/// Frames pulled from the adapter per call
pub const TEST_BLOCK_FRAMES: usize = 1024;

/// Route `tracing` output to the test harness.
///
/// Honors `RUST_LOG`; stays quiet otherwise.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Generate a test signal: sine wave at given frequency for specified frames.
pub fn generate_sine(frequency: f64, sample_rate: u32, num_frames: usize) -> Vec<f32> {
    (0..num_frames)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (0.5 * (2.0 * std::f64::consts::PI * frequency * t).sin()) as f32
        })
        .collect()
}

/// Sine duplicated to both channels, interleaved.
pub fn stereo_sine(frequency: f64, sample_rate: u32, num_frames: usize) -> Vec<f32> {
    interleave_mono(&generate_sine(frequency, sample_rate, num_frames))
}

/// Generate white noise (random samples in -1..1), interleaved stereo.
pub fn generate_noise(num_frames: usize, seed: u64) -> Vec<f32> {
    // Simple LCG for reproducible "random" noise
    let mut rng = seed;
    (0..num_frames * CHANNELS)
        .map(|_| {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((rng >> 33) as f32 / u32::MAX as f32) * 4.0 - 1.0
        })
        .collect()
}

/// Left channel of an interleaved buffer.
pub fn left(samples: &[f32]) -> Vec<f32> {
    samples.iter().step_by(CHANNELS).copied().collect()
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Estimate the frequency of a mono signal from its rising zero crossings.
///
/// Only the span between the first and last crossing is measured, so partial
/// periods at either end do not bias the estimate.
pub fn zero_crossing_frequency(samples: &[f32], sample_rate: u32) -> f64 {
    let rising: Vec<usize> = samples
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] < 0.0 && w[1] >= 0.0)
        .map(|(i, _)| i)
        .collect();

    match (rising.first(), rising.last()) {
        (Some(&first), Some(&last)) if last > first => {
            let periods = (rising.len() - 1) as f64;
            periods * sample_rate as f64 / (last - first) as f64
        }
        _ => 0.0,
    }
}

/// Frequency of the left channel, ignoring `margin` frames at each end.
pub fn dominant_frequency(samples: &[f32], sample_rate: u32, margin: usize) -> f64 {
    let mono = left(samples);
    let end = mono.len().saturating_sub(margin);
    let start = margin.min(end);
    zero_crossing_frequency(&mono[start..end], sample_rate)
}

/// Assert `actual` is within `tolerance` (relative) of `expected`.
pub fn assert_relative(actual: f64, expected: f64, tolerance: f64, context: &str) {
    let error = (actual - expected).abs() / expected.abs();
    assert!(
        error <= tolerance,
        "{}: expected {:.3}, got {:.3} (relative error {:.4} > {:.4})",
        context,
        expected,
        actual,
        error,
        tolerance
    );
}

/// Run interleaved `samples` through a pipeline built from `builder`.
pub fn render_with(samples: &[f32], builder: PipelineBuilder) -> RenderResult {
    init_tracing();
    let pipeline = builder.build().expect("valid pipeline settings");
    render(samples, pipeline).expect("render succeeds")
}

/// Pull exactly `frames` frames, panicking on a short read.
pub fn pull<S: Source, P: SamplePipe>(adapter: &mut PullAdapter<S, P>, frames: usize) -> Vec<f32> {
    let mut block = vec![0.0; frames * CHANNELS];
    let got = adapter.extract(&mut block, frames).expect("extract succeeds");
    assert_eq!(got, frames, "short read before the end of the stream");
    block
}

/// Result of comparing two audio buffers.
#[derive(Debug, Clone)]
pub struct AudioComparisonResult {
    /// Whether all samples are within tolerance.
    pub equal: bool,
    /// Maximum absolute difference between any two samples.
    pub max_diff: f32,
    /// Index of first sample that exceeds tolerance (if any).
    pub first_diff_sample: Option<usize>,
    /// Number of samples that exceed tolerance.
    pub num_diffs: usize,
}

/// Compare two audio buffers with epsilon tolerance.
pub fn compare_audio(a: &[f32], b: &[f32], epsilon: f32) -> AudioComparisonResult {
    if a.len() != b.len() {
        return AudioComparisonResult {
            equal: false,
            max_diff: f32::MAX,
            first_diff_sample: Some(a.len().min(b.len())),
            num_diffs: a.len().max(b.len()),
        };
    }

    let mut max_diff: f32 = 0.0;
    let mut first_diff: Option<usize> = None;
    let mut num_diffs = 0;

    for (i, (&x, &y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        max_diff = max_diff.max(diff);
        if diff > epsilon {
            num_diffs += 1;
            if first_diff.is_none() {
                first_diff = Some(i);
            }
        }
    }

    AudioComparisonResult {
        equal: num_diffs == 0,
        max_diff,
        first_diff_sample: first_diff,
        num_diffs,
    }
}

/// Assert two signals are equal within tolerance, with detailed error message.
pub fn assert_signals_equal(a: &[f32], b: &[f32], epsilon: f32, context: &str) {
    let result = compare_audio(a, b, epsilon);
    assert!(
        result.equal,
        "{}: Signals differ - lengths {} vs {}, first diff {:?}, max_diff={:.6}, diffs={}",
        context,
        a.len(),
        b.len(),
        result.first_diff_sample,
        result.max_diff,
        result.num_diffs
    );
}

/// Assert signal is silent within threshold.
pub fn assert_is_silent(samples: &[f32], threshold: f32, context: &str) {
    let max_val = peak(samples);
    assert!(
        max_val <= threshold,
        "{}: Expected silence (threshold {}), but peak was {}",
        context,
        threshold,
        max_val
    );
}
