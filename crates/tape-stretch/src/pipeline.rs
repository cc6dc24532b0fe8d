//! Rate, tempo and pitch control over a transposer and a stretcher.
//!
//! The pipeline owns three buffers and hands them to the two stages
//! explicitly:
//!
//! ```text
//! RateFirst:  input -> RateTransposer -> intermediate -> TempoStretcher -> output
//! TempoFirst: input -> TempoStretcher -> intermediate -> RateTransposer -> output
//! ```
//!
//! Speeding up puts the stretcher first so it works on fewer frames; slowing
//! down puts the transposer first for the same reason.

use crate::settings::StretchSettings;
use crate::stretcher::TempoStretcher;
use crate::transposer::RateTransposer;
use tape_core::{Error, FifoStage, FlushTracker, Result, SampleBuffer, SamplePipe};

/// Smallest change of an effective value that is pushed into a stage.
const PARAM_EPSILON: f64 = 1e-10;

/// Which stage reads the pipeline input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageOrder {
    /// Transposer, then stretcher (effective rate <= 1)
    #[default]
    RateFirst,
    /// Stretcher, then transposer (effective rate > 1)
    TempoFirst,
}

impl StageOrder {
    fn for_rate(effective_rate: f64) -> Self {
        if effective_rate > 1.0 {
            StageOrder::TempoFirst
        } else {
            StageOrder::RateFirst
        }
    }
}

fn run_stages(
    order: StageOrder,
    transposer: &mut RateTransposer,
    stretcher: &mut TempoStretcher,
    input: &mut SampleBuffer,
    intermediate: &mut SampleBuffer,
    output: &mut SampleBuffer,
) -> Result<()> {
    match order {
        StageOrder::RateFirst => {
            transposer.process(input, intermediate)?;
            stretcher.process(intermediate, output)
        }
        StageOrder::TempoFirst => {
            stretcher.process(input, intermediate)?;
            transposer.process(intermediate, output)
        }
    }
}

/// Combined pitch/tempo/rate processor.
///
/// - `rate` changes tempo and pitch together (resampling)
/// - `tempo` changes duration only (output/input duration ratio)
/// - `pitch` changes pitch only
///
/// Output duration is `tempo / rate` times the input duration, whatever the
/// pitch.
///
/// # Example
///
/// ```
/// use tape_stretch::{Pipeline, SamplePipe};
///
/// let mut pipeline = Pipeline::new();
/// pipeline.set_tempo(1.25)?;
/// pipeline.set_pitch_semitones(-3.0)?;
///
/// let silence = vec![0.0f32; 2 * 44100];
/// pipeline.put_samples(&silence, 0, 44100)?;
/// pipeline.process()?;
/// pipeline.flush()?;
/// assert_eq!(pipeline.output_buffer().frame_count(), 55125);
/// # Ok::<(), tape_stretch::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    transposer: RateTransposer,
    stretcher: TempoStretcher,

    input: SampleBuffer,
    intermediate: SampleBuffer,
    output: SampleBuffer,
    order: StageOrder,

    virtual_rate: f64,
    virtual_tempo: f64,
    virtual_pitch: f64,
    effective_rate: f64,
    effective_tempo: f64,

    tracker: FlushTracker,
}

impl Pipeline {
    /// Unity rate, tempo and pitch with default stretch settings.
    pub fn new() -> Self {
        Self::with_settings(StretchSettings::default())
    }

    pub fn with_settings(settings: StretchSettings) -> Self {
        Self {
            transposer: RateTransposer::new(),
            stretcher: TempoStretcher::with_settings(settings),
            input: SampleBuffer::new(),
            intermediate: SampleBuffer::new(),
            output: SampleBuffer::new(),
            order: StageOrder::RateFirst,
            virtual_rate: 1.0,
            virtual_tempo: 1.0,
            virtual_pitch: 1.0,
            effective_rate: 1.0,
            effective_tempo: 1.0,
            tracker: FlushTracker::new(),
        }
    }

    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn rate(&self) -> f64 {
        self.virtual_rate
    }

    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        let rate = Error::check_positive("rate", rate)?;
        self.update(rate, self.virtual_tempo, self.virtual_pitch)
    }

    /// Set the rate as a change in percent: `+100` doubles it.
    pub fn set_rate_change(&mut self, percent: f64) -> Result<()> {
        self.set_rate(1.0 + 0.01 * percent)
    }

    pub fn tempo(&self) -> f64 {
        self.virtual_tempo
    }

    pub fn set_tempo(&mut self, tempo: f64) -> Result<()> {
        let tempo = Error::check_positive("tempo", tempo)?;
        self.update(self.virtual_rate, tempo, self.virtual_pitch)
    }

    /// Set the tempo as a change in percent: `+100` doubles the duration.
    pub fn set_tempo_change(&mut self, percent: f64) -> Result<()> {
        self.set_tempo(1.0 + 0.01 * percent)
    }

    pub fn pitch(&self) -> f64 {
        self.virtual_pitch
    }

    /// Set pitch as a frequency ratio (`2.0` is an octave up).
    pub fn set_pitch(&mut self, pitch: f64) -> Result<()> {
        let pitch = Error::check_positive("pitch", pitch)?;
        self.update(self.virtual_rate, self.virtual_tempo, pitch)
    }

    pub fn set_pitch_octaves(&mut self, octaves: f64) -> Result<()> {
        self.set_pitch((std::f64::consts::LN_2 * octaves).exp())
    }

    pub fn set_pitch_semitones(&mut self, semitones: f64) -> Result<()> {
        self.set_pitch_octaves(semitones / 12.0)
    }

    /// Resampling factor applied by the transposer (`rate * pitch`).
    pub fn effective_rate(&self) -> f64 {
        self.effective_rate
    }

    /// Duration ratio applied by the stretcher (`tempo * pitch`).
    pub fn effective_tempo(&self) -> f64 {
        self.effective_tempo
    }

    pub fn stage_order(&self) -> StageOrder {
        self.order
    }

    pub fn transposer(&self) -> &RateTransposer {
        &self.transposer
    }

    pub fn stretcher(&self) -> &TempoStretcher {
        &self.stretcher
    }

    /// Change the stretcher's time constants and seek mode.
    pub fn apply_settings(&mut self, settings: &StretchSettings) {
        self.stretcher.apply_settings(settings);
    }

    pub fn set_quick_seek(&mut self, enable: bool) {
        self.stretcher.set_quick_seek(enable);
    }

    pub fn input_buffer(&self) -> &SampleBuffer {
        &self.input
    }

    pub fn intermediate_buffer(&self) -> &SampleBuffer {
        &self.intermediate
    }

    /// Output frames the input put so far should produce once flushed.
    pub fn expected_output_frames(&self) -> usize {
        self.tracker.expected_frames()
    }

    /// Validate the new controls, commit them and push changed effective
    /// values into the stages.
    fn update(&mut self, rate: f64, tempo: f64, pitch: f64) -> Result<()> {
        let effective_rate = Error::check_positive("rate", rate * pitch)?;
        let effective_tempo = Error::check_positive("tempo", tempo * pitch)?;

        self.virtual_rate = rate;
        self.virtual_tempo = tempo;
        self.virtual_pitch = pitch;

        if (effective_tempo - self.effective_tempo).abs() > PARAM_EPSILON {
            self.stretcher.set_tempo(effective_tempo)?;
            self.effective_tempo = effective_tempo;
        }
        if (effective_rate - self.effective_rate).abs() > PARAM_EPSILON {
            self.transposer.set_rate(effective_rate)?;
            self.effective_rate = effective_rate;
        }

        let order = StageOrder::for_rate(self.effective_rate);
        if order != self.order {
            tracing::debug!(
                from = ?self.order,
                to = ?order,
                effective_rate = self.effective_rate,
                "stage order switched"
            );
            self.order = order;
        }
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        let before = self.output.frame_count();
        run_stages(
            self.order,
            &mut self.transposer,
            &mut self.stretcher,
            &mut self.input,
            &mut self.intermediate,
            &mut self.output,
        )?;
        self.tracker.record_output(self.output.frame_count() - before);
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplePipe for Pipeline {
    fn put_samples(&mut self, samples: &[f32], offset: usize, frame_count: usize) -> Result<()> {
        let before = self.input.frame_count();
        self.input.put_samples(samples, offset, frame_count)?;
        let added = self.input.frame_count() - before;
        self.tracker.record_input(added, self.output_ratio());
        Ok(())
    }

    fn input_frames(&self) -> usize {
        self.input.frame_count()
    }

    /// Input frames needed before the stretcher can emit a sequence.
    fn input_chunk_size(&self) -> usize {
        let sample_req = self.stretcher.sample_req();
        match self.order {
            StageOrder::RateFirst => (sample_req as f64 * self.effective_rate).ceil() as usize,
            StageOrder::TempoFirst => sample_req,
        }
        .max(1)
    }

    fn output_ratio(&self) -> f64 {
        self.effective_tempo / self.effective_rate
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
        self.run()?;

        let chunk = self.input_chunk_size();
        let order = self.order;
        let transposer = &mut self.transposer;
        let stretcher = &mut self.stretcher;
        let intermediate = &mut self.intermediate;
        self.tracker
            .flush_with_silence(&mut self.input, &mut self.output, chunk, |input, output| {
                run_stages(order, transposer, stretcher, input, intermediate, output)
            })?;

        self.transposer.clear();
        self.stretcher.clear();
        self.intermediate.clear();
        Ok(())
    }

    fn clear(&mut self) {
        self.transposer.clear();
        self.stretcher.clear();
        self.input.clear();
        self.intermediate.clear();
        self.output.clear();
        self.tracker.reset();
    }
}

/// Builder for a [`Pipeline`] with initial controls.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    settings: StretchSettings,
    rate: f64,
    tempo: f64,
    pitch: f64,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            settings: StretchSettings::default(),
            rate: 1.0,
            tempo: 1.0,
            pitch: 1.0,
        }
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(mut self, settings: StretchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Default: 44100
    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.settings.sample_rate = sample_rate;
        self
    }

    /// Default: true
    pub fn quick_seek(mut self, enable: bool) -> Self {
        self.settings.quick_seek = enable;
        self
    }

    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    pub fn tempo(mut self, tempo: f64) -> Self {
        self.tempo = tempo;
        self
    }

    pub fn pitch(mut self, pitch: f64) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn pitch_semitones(mut self, semitones: f64) -> Self {
        self.pitch = (std::f64::consts::LN_2 * semitones / 12.0).exp();
        self
    }

    /// Fails if rate, tempo or pitch is not a positive finite number.
    pub fn build(self) -> Result<Pipeline> {
        let rate = Error::check_positive("rate", self.rate)?;
        let tempo = Error::check_positive("tempo", self.tempo)?;
        let pitch = Error::check_positive("pitch", self.pitch)?;

        let mut pipeline = Pipeline::with_settings(self.settings);
        pipeline.update(rate, tempo, pitch)?;
        Ok(pipeline)
    }
}
