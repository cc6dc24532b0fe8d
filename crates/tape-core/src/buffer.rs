//! Growable FIFO of interleaved stereo samples.
//!
//! Every processing stage reads from one [`SampleBuffer`] and appends to
//! another. Frames are consumed from the front by advancing a read cursor and
//! appended at the back; the backing storage is compacted back to offset 0
//! instead of reallocated whenever compaction alone makes enough room.

use crate::error::{Error, Result};

/// Number of interleaved channels per frame.
pub const CHANNELS: usize = 2;

/// Interleaved stereo `f32` FIFO.
///
/// The valid, unread frames live in `[position, position + frame_count)`;
/// everything else in the backing storage is garbage.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    vector: Vec<f32>,
    position: usize,
    frame_count: usize,
}

impl SampleBuffer {
    /// Create an empty buffer without allocating.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer able to hold `frames` frames without growing.
    pub fn with_capacity(frames: usize) -> Result<Self> {
        let mut buffer = Self::new();
        buffer.ensure_capacity(frames)?;
        Ok(buffer)
    }

    /// Number of valid, unread frames.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    /// Read cursor, in frames from the start of the backing storage.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Total frames the backing storage can hold.
    #[inline]
    pub fn capacity_frames(&self) -> usize {
        self.vector.len() / CHANNELS
    }

    #[inline]
    fn start_index(&self) -> usize {
        self.position * CHANNELS
    }

    #[inline]
    fn end_index(&self) -> usize {
        (self.position + self.frame_count) * CHANNELS
    }

    /// Interleaved samples of the unread frames.
    #[inline]
    pub fn frames(&self) -> &[f32] {
        &self.vector[self.start_index()..self.end_index()]
    }

    /// Mutable view of the unread frames.
    #[inline]
    pub fn frames_mut(&mut self) -> &mut [f32] {
        let (start, end) = (self.start_index(), self.end_index());
        &mut self.vector[start..end]
    }

    /// Writable region of `frame_count` frames directly after the valid data.
    ///
    /// The region holds garbage; write into it and then [`put`](Self::put)
    /// the number of frames actually produced.
    pub fn spare_mut(&mut self, frame_count: usize) -> Result<&mut [f32]> {
        self.ensure_additional_capacity(frame_count)?;
        let start = self.end_index();
        Ok(&mut self.vector[start..start + frame_count * CHANNELS])
    }

    /// Commit `frame_count` frames written past the end of the valid data.
    ///
    /// Clamped so the valid window never extends past the backing storage.
    pub fn put(&mut self, frame_count: usize) {
        let room = self.capacity_frames() - self.position - self.frame_count;
        debug_assert!(frame_count <= room, "put past the end of the buffer");
        self.frame_count += frame_count.min(room);
    }

    /// Append `frame_count` frames from `samples`, starting `offset` frames in.
    ///
    /// Frames missing from `samples` are not invented: the count is clamped to
    /// what the slice actually holds.
    pub fn put_samples(
        &mut self,
        samples: &[f32],
        offset: usize,
        frame_count: usize,
    ) -> Result<()> {
        let available = (samples.len() / CHANNELS).saturating_sub(offset);
        let frame_count = frame_count.min(available);
        if frame_count == 0 {
            return Ok(());
        }

        let source = &samples[offset * CHANNELS..(offset + frame_count) * CHANNELS];
        self.spare_mut(frame_count)?.copy_from_slice(source);
        self.frame_count += frame_count;
        Ok(())
    }

    /// Append `frame_count` unread frames of `other`, starting `offset` frames
    /// after its read cursor. `other` is left untouched.
    pub fn put_buffer(
        &mut self,
        other: &SampleBuffer,
        offset: usize,
        frame_count: usize,
    ) -> Result<()> {
        self.put_samples(other.frames(), offset, frame_count)
    }

    /// Discard up to `frame_count` frames from the front. Returns the number of
    /// frames actually discarded.
    pub fn receive(&mut self, frame_count: usize) -> usize {
        let frame_count = frame_count.min(self.frame_count);
        self.frame_count -= frame_count;
        self.position += frame_count;
        frame_count
    }

    /// Copy the oldest frames into `target` and consume them.
    pub fn receive_samples(&mut self, target: &mut [f32], frame_count: usize) -> usize {
        let copied = self.extract(target, 0, frame_count);
        self.receive(copied)
    }

    /// Copy `frame_count` frames starting `position` frames after the read
    /// cursor into `target` without consuming them.
    ///
    /// Returns the number of frames copied, limited by the valid data and by
    /// the size of `target`.
    pub fn extract(&self, target: &mut [f32], position: usize, frame_count: usize) -> usize {
        let frame_count = frame_count
            .min(self.frame_count.saturating_sub(position))
            .min(target.len() / CHANNELS);
        if frame_count == 0 {
            return 0;
        }

        let start = self.start_index() + position * CHANNELS;
        target[..frame_count * CHANNELS]
            .copy_from_slice(&self.vector[start..start + frame_count * CHANNELS]);
        frame_count
    }

    /// Keep at most `frame_count` unread frames, dropping the newest ones.
    pub fn truncate(&mut self, frame_count: usize) {
        self.frame_count = self.frame_count.min(frame_count);
    }

    /// Guarantee room for `required_frames` frames at the read cursor.
    ///
    /// Compacts the valid window to offset 0 when that is enough; otherwise
    /// reallocates, at least doubling the storage.
    pub fn ensure_capacity(&mut self, required_frames: usize) -> Result<()> {
        let capacity = self.capacity_frames();
        if self.position + required_frames <= capacity {
            return Ok(());
        }
        if required_frames <= capacity {
            self.rewind();
            return Ok(());
        }

        let frames = required_frames.max(capacity * 2);
        let mut grown: Vec<f32> = Vec::new();
        grown
            .try_reserve_exact(frames * CHANNELS)
            .map_err(|_| Error::AllocationFailure { frames })?;
        grown.extend_from_slice(self.frames());
        grown.resize(frames * CHANNELS, 0.0);

        tracing::trace!(from = capacity, to = frames, "sample buffer grown");

        self.vector = grown;
        self.position = 0;
        Ok(())
    }

    /// Guarantee room for `extra_frames` more frames after the valid data.
    pub fn ensure_additional_capacity(&mut self, extra_frames: usize) -> Result<()> {
        self.ensure_capacity(self.frame_count + extra_frames)
    }

    /// Move the valid window to the start of the backing storage.
    pub fn rewind(&mut self) {
        if self.position > 0 {
            let (start, end) = (self.start_index(), self.end_index());
            self.vector.copy_within(start..end, 0);
            self.position = 0;
        }
    }

    /// Drop all frames, keeping the allocation.
    pub fn clear(&mut self) {
        self.position = 0;
        self.frame_count = 0;
    }
}
