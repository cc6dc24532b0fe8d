//! Processing stage and pipe abstractions.
//!
//! A [`FifoStage`] owns no buffers: it drains the input it is handed and
//! appends to the output it is handed. Whoever owns the buffers decides which
//! stage reads and writes which buffer, so a buffer is only ever mutated by the
//! stage currently processing it.
//!
//! A [`SamplePipe`] is the buffer-owning side: frames go in through
//! [`put_samples`](SamplePipe::put_samples) and come out of
//! [`output_buffer`](SamplePipe::output_buffer).

use crate::buffer::SampleBuffer;
use crate::error::Result;

/// Upper bound on silence rounds fed while flushing.
const MAX_FLUSH_ROUNDS: usize = 64;

/// A single processing stage over interleaved stereo frames.
pub trait FifoStage {
    /// Consume what the stage can from `input` and append results to `output`.
    fn process(&mut self, input: &mut SampleBuffer, output: &mut SampleBuffer) -> Result<()>;

    /// Forget all carried-over state (interpolation phase, overlap tails).
    fn clear(&mut self);

    /// Output frames produced per consumed input frame at the current settings.
    fn output_ratio(&self) -> f64;

    /// Input frames the stage needs buffered before it can emit anything.
    fn input_chunk_size(&self) -> usize {
        1
    }
}

/// Buffer-owning processor that a pull adapter can drive.
pub trait SamplePipe {
    /// Append `frame_count` frames from `samples`, starting `offset` frames in.
    fn put_samples(&mut self, samples: &[f32], offset: usize, frame_count: usize) -> Result<()>;

    /// Frames waiting in the input buffer.
    fn input_frames(&self) -> usize;

    /// Input frames needed before processing makes progress.
    fn input_chunk_size(&self) -> usize;

    /// Output frames per input frame at the current settings.
    fn output_ratio(&self) -> f64;

    fn output_buffer(&self) -> &SampleBuffer;

    fn output_buffer_mut(&mut self) -> &mut SampleBuffer;

    /// Run the processing stage(s) over the buffered input.
    fn process(&mut self) -> Result<()>;

    /// Push out everything still held inside the stages at end of stream.
    fn flush(&mut self) -> Result<()>;

    /// Drop all buffered frames and stage state.
    fn clear(&mut self);
}

/// Bookkeeping for flushing: frames owed versus frames produced.
///
/// Input frames are credited with the output ratio in effect when they were
/// put, so a flush can emit exactly the number of frames the stream should
/// have produced.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlushTracker {
    expected: f64,
    produced: usize,
}

impl FlushTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `frames` input frames at `ratio` output frames each.
    #[inline]
    pub fn record_input(&mut self, frames: usize, ratio: f64) {
        self.expected += frames as f64 * ratio;
    }

    #[inline]
    pub fn record_output(&mut self, frames: usize) {
        self.produced += frames;
    }

    /// Whole output frames the input so far should produce.
    pub fn expected_frames(&self) -> usize {
        self.expected.round() as usize
    }

    pub fn produced_frames(&self) -> usize {
        self.produced
    }

    /// Frames produced beyond what the input accounts for.
    pub fn excess_frames(&self) -> usize {
        self.produced.saturating_sub(self.expected_frames())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feed silence through `run` until the expected output count is reached,
    /// then trim whatever was produced beyond it from the back of `output`.
    ///
    /// Leftover padding is dropped from `input` and the tracker is reset;
    /// clearing stage state is left to the caller.
    pub fn flush_with_silence<F>(
        &mut self,
        input: &mut SampleBuffer,
        output: &mut SampleBuffer,
        chunk_frames: usize,
        mut run: F,
    ) -> Result<()>
    where
        F: FnMut(&mut SampleBuffer, &mut SampleBuffer) -> Result<()>,
    {
        let target = self.expected_frames();
        let chunk_frames = chunk_frames.max(1);
        let mut rounds = 0;

        while self.produced < target && rounds < MAX_FLUSH_ROUNDS {
            input.spare_mut(chunk_frames)?.fill(0.0);
            input.put(chunk_frames);

            let before = output.frame_count();
            run(input, output)?;
            self.record_output(output.frame_count() - before);
            rounds += 1;
        }

        let excess = self.excess_frames();
        if excess > 0 {
            output.truncate(output.frame_count().saturating_sub(excess));
        }

        tracing::debug!(
            target_frames = target,
            produced = self.produced,
            trimmed = excess,
            rounds,
            "flushed"
        );

        input.clear();
        self.reset();
        Ok(())
    }
}

/// A single stage with its own input and output buffers.
///
/// Lets any [`FifoStage`] be driven on its own, for example a bare rate
/// transposer behind a pull adapter.
#[derive(Debug, Clone, Default)]
pub struct StagePipe<S> {
    stage: S,
    input: SampleBuffer,
    output: SampleBuffer,
    tracker: FlushTracker,
}

impl<S: FifoStage> StagePipe<S> {
    pub fn new(stage: S) -> Self {
        Self {
            stage,
            input: SampleBuffer::new(),
            output: SampleBuffer::new(),
            tracker: FlushTracker::new(),
        }
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    /// Mutable access to the stage, e.g. to change its settings between blocks.
    pub fn stage_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    pub fn input_buffer(&self) -> &SampleBuffer {
        &self.input
    }

    pub fn into_stage(self) -> S {
        self.stage
    }

    fn run(&mut self) -> Result<()> {
        let before = self.output.frame_count();
        self.stage.process(&mut self.input, &mut self.output)?;
        self.tracker.record_output(self.output.frame_count() - before);
        Ok(())
    }
}

impl<S: FifoStage> SamplePipe for StagePipe<S> {
    fn put_samples(&mut self, samples: &[f32], offset: usize, frame_count: usize) -> Result<()> {
        let before = self.input.frame_count();
        self.input.put_samples(samples, offset, frame_count)?;
        let added = self.input.frame_count() - before;
        self.tracker.record_input(added, self.stage.output_ratio());
        Ok(())
    }

    fn input_frames(&self) -> usize {
        self.input.frame_count()
    }

    fn input_chunk_size(&self) -> usize {
        self.stage.input_chunk_size()
    }

    fn output_ratio(&self) -> f64 {
        self.stage.output_ratio()
    }

    fn output_buffer(&self) -> &SampleBuffer {
        &self.output
    }

    fn output_buffer_mut(&mut self) -> &mut SampleBuffer {
        &mut self.output
    }

    fn process(&mut self) -> Result<()> {
        self.run()
    }

    fn flush(&mut self) -> Result<()> {
        // Account for anything still buffered before padding
        self.run()?;

        let chunk = self.stage.input_chunk_size();
        let stage = &mut self.stage;
        self.tracker
            .flush_with_silence(&mut self.input, &mut self.output, chunk, |input, output| {
                stage.process(input, output)
            })?;
        self.stage.clear();
        Ok(())
    }

    fn clear(&mut self) {
        self.stage.clear();
        self.input.clear();
        self.output.clear();
        self.tracker.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::CHANNELS;

    /// Emits every input frame twice, with a one-frame hold-back.
    #[derive(Default)]
    struct Doubler {
        held: Option<[f32; 2]>,
    }

    impl FifoStage for Doubler {
        fn process(&mut self, input: &mut SampleBuffer, output: &mut SampleBuffer) -> Result<()> {
            let frames = input.frame_count();
            if frames == 0 {
                return Ok(());
            }
            let spare = output.spare_mut(frames * 2)?;
            let mut written = 0;
            if let Some(held) = self.held.take() {
                spare[..4].copy_from_slice(&[held[0], held[1], held[0], held[1]]);
                written += 2;
            }
            let src = input.frames();
            for frame in src.chunks_exact(CHANNELS).take(frames - 1) {
                let i = written * CHANNELS;
                spare[i..i + 4].copy_from_slice(&[frame[0], frame[1], frame[0], frame[1]]);
                written += 2;
            }
            let last = frames - 1;
            self.held = Some([src[last * 2], src[last * 2 + 1]]);
            input.receive(frames);
            output.put(written);
            Ok(())
        }

        fn clear(&mut self) {
            self.held = None;
        }

        fn output_ratio(&self) -> f64 {
            2.0
        }
    }

    fn ramp(frames: usize) -> Vec<f32> {
        (0..frames).flat_map(|i| [i as f32, i as f32]).collect()
    }

    #[test]
    fn test_tracker_counts() {
        let mut tracker = FlushTracker::new();
        tracker.record_input(10, 1.5);
        tracker.record_output(12);
        assert_eq!(tracker.expected_frames(), 15);
        assert_eq!(tracker.produced_frames(), 12);
        assert_eq!(tracker.excess_frames(), 0);

        tracker.record_output(5);
        assert_eq!(tracker.excess_frames(), 2);

        tracker.reset();
        assert_eq!(tracker, FlushTracker::default());
    }

    #[test]
    fn test_stage_pipe_process_holds_back() {
        let mut pipe = StagePipe::new(Doubler::default());
        pipe.put_samples(&ramp(4), 0, 4).unwrap();
        assert_eq!(pipe.input_frames(), 4);

        pipe.process().unwrap();
        assert_eq!(pipe.input_frames(), 0);
        assert_eq!(pipe.output_buffer().frame_count(), 6);
    }

    #[test]
    fn test_stage_pipe_flush_emits_expected_count() {
        let mut pipe = StagePipe::new(Doubler::default());
        pipe.put_samples(&ramp(4), 0, 4).unwrap();
        pipe.process().unwrap();
        pipe.flush().unwrap();

        let out = pipe.output_buffer();
        assert_eq!(out.frame_count(), 8);
        assert_eq!(&out.frames()[12..16], &[3.0, 3.0, 3.0, 3.0]);
        assert_eq!(pipe.input_frames(), 0, "padding must not linger");
    }

    #[test]
    fn test_stage_pipe_flush_without_input_is_noop() {
        let mut pipe = StagePipe::new(Doubler::default());
        pipe.flush().unwrap();
        assert!(pipe.output_buffer().is_empty());
    }

    #[test]
    fn test_stage_pipe_clear() {
        let mut pipe = StagePipe::new(Doubler::default());
        pipe.put_samples(&ramp(4), 0, 4).unwrap();
        pipe.process().unwrap();
        pipe.clear();

        assert_eq!(pipe.input_frames(), 0);
        assert!(pipe.output_buffer().is_empty());
        assert!(pipe.stage().held.is_none());
    }
}
