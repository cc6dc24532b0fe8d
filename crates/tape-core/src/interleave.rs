//! Conversions between planar and interleaved stereo.

use crate::buffer::CHANNELS;

/// Interleave two channels into `[L, R, L, R, ...]`.
///
/// The shorter channel decides the frame count.
pub fn interleave(left: &[f32], right: &[f32]) -> Vec<f32> {
    let frames = left.len().min(right.len());
    let mut result = Vec::with_capacity(frames * CHANNELS);
    for (&l, &r) in left.iter().zip(right) {
        result.push(l);
        result.push(r);
    }
    result
}

/// Duplicate a mono channel into both sides of an interleaved stereo vector.
pub fn interleave_mono(mono: &[f32]) -> Vec<f32> {
    interleave(mono, mono)
}

/// Split interleaved stereo into `(left, right)`.
///
/// A trailing half frame is ignored.
pub fn deinterleave(interleaved: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let frames = interleaved.len() / CHANNELS;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for frame in interleaved.chunks_exact(CHANNELS) {
        left.push(frame[0]);
        right.push(frame[1]);
    }
    (left, right)
}
