//! Sample rate transposer.
//!
//! Changes playback rate, and with it pitch and duration together, by linear
//! interpolation between neighbouring input frames. No anti-alias filter is
//! applied before downsampling.

use tape_core::{Error, FifoStage, Result, SampleBuffer, CHANNELS};

/// Linear-interpolation resampler over interleaved stereo frames.
///
/// `rate` is input frames consumed per output frame: `2.0` plays twice as
/// fast (half the frames, an octave up), `0.5` half as fast.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTransposer {
    rate: f64,
    /// Position of the next output frame, measured from the last consumed frame
    slope_count: f64,
    prev_sample_l: f32,
    prev_sample_r: f32,
}

impl RateTransposer {
    pub fn new() -> Self {
        Self {
            rate: 1.0,
            slope_count: 0.0,
            prev_sample_l: 0.0,
            prev_sample_r: 0.0,
        }
    }

    /// Create a transposer at `rate`.
    pub fn with_rate(rate: f64) -> Result<Self> {
        let mut transposer = Self::new();
        transposer.set_rate(rate)?;
        Ok(transposer)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Change the rate. Interpolation continues from the current phase.
    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        self.rate = Error::check_positive("rate", rate)?;
        Ok(())
    }

    /// Interpolate all of `src` into `dest`, returning the frames written.
    ///
    /// `dest` must hold at least `src_frames / rate + 2` frames.
    fn transpose(&mut self, src: &[f32], dest: &mut [f32]) -> usize {
        let frames = src.len() / CHANNELS;
        let mut written = 0;

        // Frames between the carried-over sample and the first new one
        while self.slope_count < 1.0 {
            let t = self.slope_count as f32;
            let out = written * CHANNELS;
            dest[out] = (1.0 - t) * self.prev_sample_l + t * src[0];
            dest[out + 1] = (1.0 - t) * self.prev_sample_r + t * src[1];
            written += 1;
            self.slope_count += self.rate;
        }
        self.slope_count -= 1.0;

        if frames > 1 {
            let mut used = 0;
            'blocks: loop {
                while self.slope_count > 1.0 {
                    self.slope_count -= 1.0;
                    used += 1;
                    if used >= frames - 1 {
                        break 'blocks;
                    }
                }

                let t = self.slope_count as f32;
                let i = used * CHANNELS;
                let out = written * CHANNELS;
                dest[out] = (1.0 - t) * src[i] + t * src[i + 2];
                dest[out + 1] = (1.0 - t) * src[i + 1] + t * src[i + 3];
                written += 1;
                self.slope_count += self.rate;
            }
        }

        self.prev_sample_l = src[src.len() - 2];
        self.prev_sample_r = src[src.len() - 1];
        written
    }

    /// Unity rate: copy straight through and park the phase on the last frame.
    fn pass_through(&mut self, input: &mut SampleBuffer, output: &mut SampleBuffer) -> Result<()> {
        let frames = input.frame_count();
        output.put_buffer(input, 0, frames)?;

        let src = input.frames();
        self.prev_sample_l = src[src.len() - 2];
        self.prev_sample_r = src[src.len() - 1];
        self.slope_count = 1.0;

        input.receive(frames);
        Ok(())
    }
}

impl Default for RateTransposer {
    fn default() -> Self {
        Self::new()
    }
}

impl FifoStage for RateTransposer {
    fn process(&mut self, input: &mut SampleBuffer, output: &mut SampleBuffer) -> Result<()> {
        let frames = input.frame_count();
        if frames == 0 {
            return Ok(());
        }
        if self.rate == 1.0 {
            return self.pass_through(input, output);
        }

        let capacity = (frames as f64 / self.rate).ceil() as usize + 2;
        let dest = output.spare_mut(capacity)?;
        let written = self.transpose(input.frames(), dest);
        output.put(written);
        input.receive(frames);
        Ok(())
    }

    fn clear(&mut self) {
        self.slope_count = 0.0;
        self.prev_sample_l = 0.0;
        self.prev_sample_r = 0.0;
    }

    fn output_ratio(&self) -> f64 {
        1.0 / self.rate
    }
}
