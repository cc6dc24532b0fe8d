//! Pull-based driver between a [`Source`] and a [`SamplePipe`].
//!
//! A consumer asks for output frames; the adapter pulls as much input from the
//! source as the pipe needs to produce them. Delivered frames stay in the
//! pipe's output buffer for `history_buffer_size` frames so short backward
//! seeks replay them without touching the source.

use tape_core::{Error, Result, SamplePipe, Source, CHANNELS};

/// Delivered frames retained for backward seeks (half a second at 44.1 kHz).
pub const DEFAULT_HISTORY_FRAMES: usize = 22050;

/// Input frames kept queued in front of the pipe.
const INPUT_BACKLOG_FRAMES: usize = 8192 * 2;

/// Pulls frames from `S` through pipe `P` on demand.
///
/// # Example
///
/// ```
/// use tape_stretch::{BufferSource, Pipeline, PullAdapter};
///
/// let source = BufferSource::from_mono(&vec![0.25; 44100]);
/// let mut pipeline = Pipeline::new();
/// pipeline.set_tempo(2.0)?;
///
/// let mut adapter = PullAdapter::new(source, pipeline);
/// let mut block = vec![0.0; 4096 * 2];
/// let mut total = 0;
/// loop {
///     let frames = adapter.extract(&mut block, 4096)?;
///     if frames == 0 {
///         break;
///     }
///     total += frames;
/// }
/// assert_eq!(total, 88200);
/// # Ok::<(), tape_stretch::Error>(())
/// ```
#[derive(Debug)]
pub struct PullAdapter<S, P> {
    source: S,
    pipe: P,
    history_buffer_size: usize,

    /// Next source frame to pull
    source_position: usize,
    /// Delivery offset into the pipe's output buffer
    output_buffer_position: usize,
    /// Frames delivered since the start, adjusted by seeks
    position: usize,

    /// Source exhausted and the pipe flushed
    source_finished: bool,
    scratch: Vec<f32>,
}

impl<S: Source, P: SamplePipe> PullAdapter<S, P> {
    pub fn new(source: S, pipe: P) -> Self {
        Self {
            source,
            pipe,
            history_buffer_size: DEFAULT_HISTORY_FRAMES,
            source_position: 0,
            output_buffer_position: 0,
            position: 0,
            source_finished: false,
            scratch: Vec::new(),
        }
    }

    /// Retain `frames` delivered frames for backward seeks.
    pub fn with_history_size(mut self, frames: usize) -> Self {
        self.history_buffer_size = frames;
        self
    }

    pub fn history_buffer_size(&self) -> usize {
        self.history_buffer_size
    }

    /// Output frames delivered so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Next frame the source will be asked for.
    pub fn source_position(&self) -> usize {
        self.source_position
    }

    /// The source ran dry and every produced frame has been delivered.
    pub fn is_finished(&self) -> bool {
        self.source_finished
            && self.output_buffer_position >= self.pipe.output_buffer().frame_count()
    }

    pub fn pipe(&self) -> &P {
        &self.pipe
    }

    /// Mutable access to the pipe, e.g. to change tempo while playing.
    pub fn pipe_mut(&mut self) -> &mut P {
        &mut self.pipe
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_inner(self) -> (S, P) {
        (self.source, self.pipe)
    }

    /// Pull up to `frame_count` frames from the source into the pipe input.
    fn fill_input(&mut self, frame_count: usize) -> Result<usize> {
        let len = frame_count * CHANNELS;
        if len > self.scratch.len() {
            self.scratch
                .try_reserve_exact(len - self.scratch.len())
                .map_err(|_| Error::AllocationFailure { frames: frame_count })?;
        }
        self.scratch.resize(len, 0.0);
        let extracted = self
            .source
            .extract(&mut self.scratch, frame_count, self.source_position)
            .min(frame_count);
        self.source_position += extracted;
        self.pipe.put_samples(&self.scratch, 0, extracted)?;
        Ok(extracted)
    }

    /// Process until the pipe holds `required` output frames or the stream ends.
    ///
    /// When the source comes up short the pipe is flushed once, so the tail
    /// held inside the stages is delivered too.
    pub fn fill_output_to(&mut self, required: usize) -> Result<()> {
        let backlog = INPUT_BACKLOG_FRAMES.max(2 * self.pipe.input_chunk_size());

        while self.pipe.output_buffer().frame_count() < required && !self.source_finished {
            let wanted = backlog.saturating_sub(self.pipe.input_frames());
            let pulled = self.fill_input(wanted)?;

            if pulled < wanted {
                self.pipe.flush()?;
                self.source_finished = true;
                tracing::debug!(
                    source_position = self.source_position,
                    buffered = self.pipe.output_buffer().frame_count(),
                    "source exhausted, pipe flushed"
                );
                break;
            }
            self.pipe.process()?;
        }
        Ok(())
    }

    /// Write up to `frame_count` frames into `target` and return how many were
    /// written. Fewer than requested means the end of the stream.
    pub fn extract(&mut self, target: &mut [f32], frame_count: usize) -> Result<usize> {
        let frame_count = frame_count.min(target.len() / CHANNELS);
        self.fill_output_to(self.output_buffer_position + frame_count)?;

        let output = self.pipe.output_buffer();
        let extracted = output.extract(target, self.output_buffer_position, frame_count);

        let current = self.output_buffer_position + extracted;
        self.output_buffer_position = current.min(self.history_buffer_size);
        self.pipe
            .output_buffer_mut()
            .receive(current.saturating_sub(self.history_buffer_size));

        self.position += extracted;
        Ok(extracted)
    }

    /// Move the delivery position to `new_position` output frames.
    ///
    /// Positions still inside the retained output replay it exactly. Anything
    /// else restarts the source at the matching input frame, estimated from
    /// the pipe's current output ratio.
    pub fn seek(&mut self, new_position: usize) {
        let buffered = self.pipe.output_buffer().frame_count();
        let in_window = (self.output_buffer_position + new_position)
            .checked_sub(self.position)
            .filter(|&offset| offset <= buffered);

        match in_window {
            Some(offset) => {
                // Keep no more than the history behind the delivery offset
                let excess = offset.saturating_sub(self.history_buffer_size);
                self.pipe.output_buffer_mut().receive(excess);
                self.output_buffer_position = offset - excess;
            }
            None => {
                let ratio = self.pipe.output_ratio();
                let source_position = (new_position as f64 / ratio).round() as usize;
                tracing::debug!(
                    new_position,
                    source_position,
                    "seek outside retained output, re-pulling"
                );
                self.set_source_position(source_position);
            }
        }
        self.position = new_position;
    }

    /// Restart pulling at source frame `source_position`.
    ///
    /// Clears all stage state and buffered frames; nothing from before the jump
    /// is crossfaded into what follows.
    pub fn set_source_position(&mut self, source_position: usize) {
        self.pipe.clear();
        self.source_position = source_position;
        self.output_buffer_position = 0;
        self.source_finished = false;
    }
}
