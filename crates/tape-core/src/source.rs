//! Sources of stereo frames for a pull adapter.
//!
//! A [`Source`] is random access: the adapter asks for frames at an absolute
//! frame position and may ask for the same position again after a seek.

use crate::buffer::CHANNELS;
use crate::interleave::{interleave, interleave_mono};

/// Random-access provider of interleaved stereo frames.
pub trait Source {
    /// Copy up to `frame_count` frames starting at frame `position` into
    /// `target` and return how many were written.
    ///
    /// Returning fewer than `frame_count` means the end of the stream was
    /// reached. Implementations must not block and must tolerate repeated or
    /// overlapping reads of the same positions.
    fn extract(&mut self, target: &mut [f32], frame_count: usize, position: usize) -> usize;
}

impl<S: Source + ?Sized> Source for &mut S {
    fn extract(&mut self, target: &mut [f32], frame_count: usize, position: usize) -> usize {
        (**self).extract(target, frame_count, position)
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn extract(&mut self, target: &mut [f32], frame_count: usize, position: usize) -> usize {
        (**self).extract(target, frame_count, position)
    }
}

/// In-memory source over decoded, interleaved stereo audio.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferSource {
    samples: Vec<f32>,
}

impl BufferSource {
    /// Wrap interleaved stereo samples. A trailing half frame is dropped.
    pub fn from_interleaved(mut samples: Vec<f32>) -> Self {
        samples.truncate(samples.len() / CHANNELS * CHANNELS);
        Self { samples }
    }

    /// Build from separate left and right channels.
    pub fn from_planar(left: &[f32], right: &[f32]) -> Self {
        Self {
            samples: interleave(left, right),
        }
    }

    /// Build from a single channel played on both sides.
    pub fn from_mono(mono: &[f32]) -> Self {
        Self {
            samples: interleave_mono(mono),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / CHANNELS
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

impl Source for BufferSource {
    fn extract(&mut self, target: &mut [f32], frame_count: usize, position: usize) -> usize {
        let frames = frame_count
            .min(self.frame_count().saturating_sub(position))
            .min(target.len() / CHANNELS);
        if frames == 0 {
            return 0;
        }

        let start = position * CHANNELS;
        let len = frames * CHANNELS;
        target[..len].copy_from_slice(&self.samples[start..start + len]);
        frames
    }
}
