//! Offline rendering
//!
//! Drives a [`PullAdapter`] to the end of its source and collects everything
//! it delivers into one interleaved buffer.

use tape_core::{deinterleave, BufferSource, Result, SamplePipe, Source, CHANNELS};
use tape_stretch::{Pipeline, PullAdapter};

/// Frames requested from the adapter per pull.
pub const DEFAULT_BLOCK_FRAMES: usize = 4096;

/// Result of a render operation
#[derive(Debug, Clone, PartialEq)]
pub struct RenderResult {
    /// Interleaved stereo audio [L, R, L, R, ...]
    pub samples: Vec<f32>,
    /// Sample rate of the rendered audio
    pub sample_rate: u32,
    /// Peak level (linear)
    pub peak_level: f32,
}

impl RenderResult {
    fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        let peak_level = samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
        Self {
            samples,
            sample_rate,
            peak_level,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / CHANNELS
    }

    /// Get duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Split into `(left, right)` channels.
    pub fn planar(&self) -> (Vec<f32>, Vec<f32>) {
        deinterleave(&self.samples)
    }

    /// Frames at the start where both channels are exactly zero.
    pub fn leading_silence_frames(&self) -> usize {
        leading_silence_frames(&self.samples)
    }

    /// Drop the leading all-zero frames and return how many were removed.
    pub fn trim_leading_silence(&mut self) -> usize {
        let frames = self.leading_silence_frames();
        self.samples.drain(..frames * CHANNELS);
        frames
    }
}

/// Count the frames at the start of `samples` whose channels are all exactly zero.
pub fn leading_silence_frames(samples: &[f32]) -> usize {
    samples
        .chunks_exact(CHANNELS)
        .take_while(|frame| frame.iter().all(|&s| s == 0.0))
        .count()
}

/// Pull `adapter` until it reports the end of the stream.
///
/// `sample_rate` only labels the result; it does not affect processing.
pub fn render_adapter<S: Source, P: SamplePipe>(
    adapter: &mut PullAdapter<S, P>,
    sample_rate: u32,
    block_frames: usize,
) -> Result<RenderResult> {
    let block_frames = block_frames.max(1);
    let mut block = vec![0.0f32; block_frames * CHANNELS];
    let mut samples = Vec::new();

    loop {
        let frames = adapter.extract(&mut block, block_frames)?;
        samples.extend_from_slice(&block[..frames * CHANNELS]);
        if frames < block_frames {
            break;
        }
    }

    tracing::debug!(
        frames = samples.len() / CHANNELS,
        source_frames = adapter.source_position(),
        "render complete"
    );
    Ok(RenderResult::new(samples, sample_rate))
}

/// Run interleaved stereo `samples` through `pipeline` in one go.
///
/// # Example
///
/// ```
/// use tape::render::render;
/// use tape::Pipeline;
///
/// let input = vec![0.0f32; 2 * 44100];
/// let pipeline = Pipeline::builder().rate(2.0).build()?;
///
/// let result = render(&input, pipeline)?;
/// assert_eq!(result.frame_count(), 22050);
/// assert_eq!(result.peak_level, 0.0);
/// # Ok::<(), tape::Error>(())
/// ```
pub fn render(samples: &[f32], pipeline: Pipeline) -> Result<RenderResult> {
    let sample_rate = pipeline.stretcher().sample_rate();
    let source = BufferSource::from_interleaved(samples.to_vec());
    let mut adapter = PullAdapter::new(source, pipeline);
    render_adapter(&mut adapter, sample_rate, DEFAULT_BLOCK_FRAMES)
}
