//! WSOLA tempo stretcher.
//!
//! Changes duration without changing pitch. The input is cut into sequences
//! of `seek_window_length` frames; each new sequence is shifted by up to
//! `seek_length` frames to the position where it best resembles the tail of
//! the previous one (waveform similarity), then crossfaded onto that tail over
//! `overlap_length` frames.
//!
//! ## Processing
//!
//! 1. **Seek**: cross-correlate the amplitude-weighted tail with the input at
//!    each candidate offset (every offset, or a coarse-to-fine hierarchical
//!    scan when quick seek is on)
//! 2. **Overlap-add**: linear crossfade of tail and input at the best offset
//! 3. **Copy**: the middle of the sequence goes straight to the output
//! 4. **Skip**: advance the input by the nominal skip, carrying the fraction
//!
//! Each sequence emits `seek_window_length - overlap_length` frames and
//! consumes `(seek_window_length - overlap_length) / tempo` on average.

use crate::settings::{StretchSettings, DEFAULT_OVERLAP_MS, DEFAULT_SAMPLE_RATE};
use tape_core::{Error, FifoStage, Result, SampleBuffer, CHANNELS};

/// Offset steps of the four hierarchical search passes, coarse to fine.
static SCAN_OFFSETS: [&[i32]; 4] = [
    &[
        124, 186, 248, 310, 372, 434, 496, 558, 620, 682, 744, 806, 868, 930, 992, 1054, 1116,
        1178, 1240, 1302, 1364, 1426, 1488,
    ],
    &[-100, -75, -50, -25, 25, 50, 75, 100],
    &[-20, -15, -10, -5, 5, 10, 15, 20],
    &[-4, -3, -2, -1, 1, 2, 3, 4],
];

// Calibration of the automatic sequence and seek window lengths. Between
// speeds 0.5 and 2.0 both interpolate linearly; outside they are clamped.
const AUTOSEQ_SPEED_LOW: f64 = 0.5;
const AUTOSEQ_SPEED_TOP: f64 = 2.0;

const AUTOSEQ_AT_MIN: f64 = 125.0;
const AUTOSEQ_AT_MAX: f64 = 50.0;
const AUTOSEQ_K: f64 = (AUTOSEQ_AT_MAX - AUTOSEQ_AT_MIN) / (AUTOSEQ_SPEED_TOP - AUTOSEQ_SPEED_LOW);
const AUTOSEQ_C: f64 = AUTOSEQ_AT_MIN - AUTOSEQ_K * AUTOSEQ_SPEED_LOW;

const AUTOSEEK_AT_MIN: f64 = 25.0;
const AUTOSEEK_AT_MAX: f64 = 15.0;
const AUTOSEEK_K: f64 =
    (AUTOSEEK_AT_MAX - AUTOSEEK_AT_MIN) / (AUTOSEQ_SPEED_TOP - AUTOSEQ_SPEED_LOW);
const AUTOSEEK_C: f64 = AUTOSEEK_AT_MIN - AUTOSEEK_K * AUTOSEQ_SPEED_LOW;

/// Shortest allowed overlap, in frames.
pub const MIN_OVERLAP_FRAMES: usize = 16;

/// Where the stretcher is in its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StretchState {
    /// Waiting for `overlap_length` frames to seed the tail
    #[default]
    Empty,
    /// Tail seeded, no sequence emitted yet
    Primed,
    /// At least one sequence emitted
    Steady,
}

/// Convert milliseconds to whole frames, rounding to nearest.
fn ms_to_frames(sample_rate: u32, ms: f64) -> usize {
    (f64::from(sample_rate) * ms / 1000.0).round() as usize
}

/// Overlap length for a sample rate: a multiple of 8, at least 16 frames.
pub fn overlap_frames(sample_rate: u32, overlap_ms: f64) -> usize {
    let frames = ms_to_frames(sample_rate, overlap_ms).max(MIN_OVERLAP_FRAMES);
    frames - frames % 8
}

/// Time stretcher using waveform-similarity overlap-add.
///
/// `tempo` is the ratio of output duration to input duration: `2.0` plays at
/// half speed, `0.5` at double speed.
#[derive(Debug, Clone)]
pub struct TempoStretcher {
    tempo: f64,

    // Configuration
    sample_rate: u32,
    sequence_ms: f64,
    seek_window_ms: f64,
    overlap_ms: f64,
    auto_sequence: bool,
    auto_seek_window: bool,
    quick_seek: bool,

    // Derived, in frames
    seek_window_length: usize,
    seek_length: usize,
    overlap_length: usize,
    nominal_skip: f64,
    sample_req: usize,

    skip_fract: f64,
    mid_buffer: Vec<f32>,
    ref_mid_buffer: Vec<f32>,
    state: StretchState,
}

impl TempoStretcher {
    /// Create a stretcher at unity tempo with default settings.
    pub fn new() -> Self {
        Self::with_settings(StretchSettings::default())
    }

    pub fn with_settings(settings: StretchSettings) -> Self {
        let mut stretcher = Self {
            tempo: 1.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            sequence_ms: 0.0,
            seek_window_ms: 0.0,
            overlap_ms: DEFAULT_OVERLAP_MS,
            auto_sequence: true,
            auto_seek_window: true,
            quick_seek: true,
            seek_window_length: 0,
            seek_length: 0,
            overlap_length: 0,
            nominal_skip: 0.0,
            sample_req: 0,
            skip_fract: 0.0,
            mid_buffer: Vec::new(),
            ref_mid_buffer: Vec::new(),
            state: StretchState::Empty,
        };
        stretcher.apply_settings(&settings);
        stretcher
    }

    /// Apply all time constants and the seek mode at once.
    pub fn apply_settings(&mut self, settings: &StretchSettings) {
        self.quick_seek = settings.quick_seek;
        self.set_parameters(
            settings.sample_rate,
            settings.sequence_ms,
            settings.seek_window_ms,
            settings.overlap_ms,
        );
    }

    /// Current configuration. Automatic lengths are reported as zero.
    pub fn settings(&self) -> StretchSettings {
        StretchSettings {
            sample_rate: self.sample_rate,
            sequence_ms: if self.auto_sequence { 0.0 } else { self.sequence_ms },
            seek_window_ms: if self.auto_seek_window { 0.0 } else { self.seek_window_ms },
            overlap_ms: self.overlap_ms,
            quick_seek: self.quick_seek,
        }
    }

    /// Set the time constants.
    ///
    /// A zero `sample_rate` or non-positive `overlap_ms` keeps the previous
    /// value. A non-positive `sequence_ms` or `seek_window_ms` selects the
    /// automatic, tempo-dependent length.
    pub fn set_parameters(
        &mut self,
        sample_rate: u32,
        sequence_ms: f64,
        seek_window_ms: f64,
        overlap_ms: f64,
    ) {
        if sample_rate > 0 {
            self.sample_rate = sample_rate;
        } else {
            tracing::debug!("ignoring zero sample rate, keeping {}", self.sample_rate);
        }

        if overlap_ms > 0.0 {
            self.overlap_ms = overlap_ms;
        } else {
            tracing::debug!(overlap_ms, "ignoring overlap, keeping {} ms", self.overlap_ms);
        }

        if sequence_ms > 0.0 {
            self.sequence_ms = sequence_ms;
            self.auto_sequence = false;
        } else {
            self.auto_sequence = true;
        }

        if seek_window_ms > 0.0 {
            self.seek_window_ms = seek_window_ms;
            self.auto_seek_window = false;
        } else {
            self.auto_seek_window = true;
        }

        self.update_overlap_length();
        self.recalculate();
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Input frames consumed per output frame (`1 / tempo`).
    pub fn speed(&self) -> f64 {
        1.0 / self.tempo
    }

    /// Set the output/input duration ratio.
    pub fn set_tempo(&mut self, tempo: f64) -> Result<()> {
        self.tempo = Error::check_positive("tempo", tempo)?;
        self.recalculate();
        Ok(())
    }

    pub fn set_quick_seek(&mut self, enable: bool) {
        self.quick_seek = enable;
    }

    pub fn is_quick_seek(&self) -> bool {
        self.quick_seek
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Sequence length in use, automatic or pinned.
    pub fn sequence_ms(&self) -> f64 {
        self.sequence_ms
    }

    /// Seek window length in use, automatic or pinned.
    pub fn seek_window_ms(&self) -> f64 {
        self.seek_window_ms
    }

    pub fn overlap_ms(&self) -> f64 {
        self.overlap_ms
    }

    pub fn seek_window_length(&self) -> usize {
        self.seek_window_length
    }

    pub fn seek_length(&self) -> usize {
        self.seek_length
    }

    pub fn overlap_length(&self) -> usize {
        self.overlap_length
    }

    pub fn nominal_skip(&self) -> f64 {
        self.nominal_skip
    }

    pub fn state(&self) -> StretchState {
        self.state
    }

    /// Input frames needed to emit one more sequence.
    pub fn sample_req(&self) -> usize {
        self.sample_req
    }

    /// Frames emitted per sequence.
    pub fn output_chunk_size(&self) -> usize {
        self.overlap_length + self.seek_window_length.saturating_sub(2 * self.overlap_length)
    }

    /// Frames held back in the overlap tail until the next sequence or a flush.
    ///
    /// The output is not delayed: the first tail is seeded without consuming
    /// input, so output frame 0 lines up with input frame 0.
    pub fn held_back_frames(&self) -> usize {
        self.overlap_length
    }

    fn update_overlap_length(&mut self) {
        let overlap_length = overlap_frames(self.sample_rate, self.overlap_ms);
        if overlap_length == self.overlap_length {
            return;
        }

        self.overlap_length = overlap_length;
        // Resized on the next process call
        self.mid_buffer = Vec::new();
        self.ref_mid_buffer = Vec::new();
        // A tail of the old length cannot be crossfaded
        self.state = StretchState::Empty;
    }

    /// Size the tail buffers for the current overlap length.
    fn ensure_tail_buffers(&mut self) -> Result<()> {
        let frames = self.overlap_length;
        let len = frames * CHANNELS;
        for buffer in [&mut self.mid_buffer, &mut self.ref_mid_buffer] {
            if buffer.len() != len {
                buffer.clear();
                buffer
                    .try_reserve_exact(len)
                    .map_err(|_| Error::AllocationFailure { frames })?;
                buffer.resize(len, 0.0);
            }
        }
        Ok(())
    }

    /// Recompute sequence lengths, skip and input requirement from the tempo.
    fn recalculate(&mut self) {
        let speed = self.speed();

        if self.auto_sequence {
            let seq = (AUTOSEQ_C + AUTOSEQ_K * speed).clamp(AUTOSEQ_AT_MAX, AUTOSEQ_AT_MIN);
            self.sequence_ms = (seq + 0.5).floor();
        }
        if self.auto_seek_window {
            let seek = (AUTOSEEK_C + AUTOSEEK_K * speed).clamp(AUTOSEEK_AT_MAX, AUTOSEEK_AT_MIN);
            self.seek_window_ms = (seek + 0.5).floor();
        }

        self.seek_window_length =
            ms_to_frames(self.sample_rate, self.sequence_ms).max(2 * self.overlap_length);
        self.seek_length = ms_to_frames(self.sample_rate, self.seek_window_ms).max(1);

        self.nominal_skip = speed * (self.seek_window_length - self.overlap_length) as f64;
        self.skip_fract = 0.0;
        let int_skip = (self.nominal_skip + 0.5).floor() as usize;
        self.sample_req =
            (int_skip + self.overlap_length).max(self.seek_window_length) + self.seek_length;

        tracing::debug!(
            tempo = self.tempo,
            sequence_ms = self.sequence_ms,
            seek_window_ms = self.seek_window_ms,
            overlap_length = self.overlap_length,
            seek_window_length = self.seek_window_length,
            seek_length = self.seek_length,
            sample_req = self.sample_req,
            "stretch parameters updated"
        );
    }

    /// Weight the tail by `i * (overlap_length - i)` for the correlation.
    fn precalc_corr_reference(&mut self) {
        let overlap = self.overlap_length;
        let frames = self
            .ref_mid_buffer
            .chunks_exact_mut(CHANNELS)
            .zip(self.mid_buffer.chunks_exact(CHANNELS));
        for (i, (weighted, tail)) in frames.enumerate() {
            let weight = (i * (overlap - i)) as f32;
            weighted[0] = tail[0] * weight;
            weighted[1] = tail[1] * weight;
        }
    }

    /// Correlation of the weighted tail with `mixing`. Frame 0 has no weight.
    #[inline]
    fn cross_corr(&self, mixing: &[f32]) -> f64 {
        let len = self.overlap_length * CHANNELS;
        mixing[CHANNELS..len]
            .chunks_exact(CHANNELS)
            .zip(self.ref_mid_buffer[CHANNELS..len].chunks_exact(CHANNELS))
            .map(|(m, r)| f64::from(m[0]) * f64::from(r[0]) + f64::from(m[1]) * f64::from(r[1]))
            .sum()
    }

    fn seek_best_overlap_position(&mut self, input: &[f32]) -> usize {
        self.precalc_corr_reference();
        if self.quick_seek {
            self.seek_quick(input)
        } else {
            self.seek_exhaustive(input)
        }
    }

    fn seek_exhaustive(&self, input: &[f32]) -> usize {
        let mut best_corr = f64::MIN;
        let mut best_offset = 0;

        for offset in 0..self.seek_length {
            let corr = self.cross_corr(&input[offset * CHANNELS..]);
            if corr > best_corr {
                best_corr = corr;
                best_offset = offset;
            }
        }
        best_offset
    }

    fn seek_quick(&self, input: &[f32]) -> usize {
        let mut best_corr = f64::MIN;
        let mut best_offset = 0;
        let mut center = 0;

        for pass in SCAN_OFFSETS.iter() {
            for &step in pass.iter() {
                let offset = center as i64 + i64::from(step);
                if offset >= self.seek_length as i64 {
                    break;
                }
                if offset < 0 {
                    continue;
                }

                let offset = offset as usize;
                let corr = self.cross_corr(&input[offset * CHANNELS..]);
                if corr > best_corr {
                    best_corr = corr;
                    best_offset = offset;
                }
            }
            center = best_offset;
        }
        best_offset
    }

    /// Crossfade the tail into `input`, writing `overlap_length` frames.
    fn overlap(&self, dest: &mut [f32], input: &[f32]) {
        let overlap = self.overlap_length;
        let scale = 1.0 / overlap as f32;

        let frames = dest
            .chunks_exact_mut(CHANNELS)
            .zip(input.chunks_exact(CHANNELS))
            .zip(self.mid_buffer.chunks_exact(CHANNELS))
            .take(overlap);
        for (i, ((out, new), tail)) in frames.enumerate() {
            let fade_in = i as f32 * scale;
            let fade_out = (overlap - i) as f32 * scale;
            out[0] = new[0] * fade_in + tail[0] * fade_out;
            out[1] = new[1] * fade_in + tail[1] * fade_out;
        }
    }
}

impl Default for TempoStretcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FifoStage for TempoStretcher {
    fn process(&mut self, input: &mut SampleBuffer, output: &mut SampleBuffer) -> Result<()> {
        self.ensure_tail_buffers()?;
        let overlap = self.overlap_length;

        if self.state == StretchState::Empty {
            if input.frame_count() < overlap {
                return Ok(());
            }
            // Seed without consuming: the first sequence crossfades onto itself
            input.extract(&mut self.mid_buffer, 0, overlap);
            self.state = StretchState::Primed;
        }

        while input.frame_count() >= self.sample_req {
            let offset = if self.tempo == 1.0 {
                0
            } else {
                self.seek_best_overlap_position(input.frames())
            };
            tracing::trace!(offset, "sequence");

            let dest = output.spare_mut(overlap)?;
            self.overlap(dest, &input.frames()[offset * CHANNELS..]);
            output.put(overlap);

            let straight = self.seek_window_length.saturating_sub(2 * overlap);
            if straight > 0 {
                output.put_buffer(input, offset + overlap, straight)?;
            }

            let tail_start = offset + self.seek_window_length - overlap;
            input.extract(&mut self.mid_buffer, tail_start, overlap);

            self.skip_fract += self.nominal_skip;
            let skip = self.skip_fract.floor();
            self.skip_fract -= skip;
            input.receive(skip as usize);

            self.state = StretchState::Steady;
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.mid_buffer.fill(0.0);
        self.ref_mid_buffer.fill(0.0);
        self.skip_fract = 0.0;
        self.state = StretchState::Empty;
    }

    fn output_ratio(&self) -> f64 {
        self.tempo
    }

    fn input_chunk_size(&self) -> usize {
        self.sample_req
    }
}
