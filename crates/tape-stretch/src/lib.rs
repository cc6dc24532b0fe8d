//! Time-domain pitch and tempo processing for interleaved stereo audio.
//!
//! # Primary API
//!
//! - [`Pipeline`] / [`PipelineBuilder`]: rate, tempo and pitch over two stages
//! - [`PullAdapter`]: pulls frames from a [`Source`] through a pipe on demand
//! - [`TempoStretcher`]: WSOLA time stretch (duration only)
//! - [`RateTransposer`]: linear-interpolation resampling (duration and pitch)
//! - [`StretchSettings`]: stretcher time constants
//!
//! # Example
//!
//! ```
//! use tape_stretch::{BufferSource, Pipeline, PullAdapter};
//!
//! let source = BufferSource::from_mono(&vec![0.0; 22050]);
//! let pipeline = Pipeline::builder()
//!     .tempo(1.5)
//!     .pitch_semitones(2.0)
//!     .build()?;
//!
//! let mut adapter = PullAdapter::new(source, pipeline);
//! let mut block = vec![0.0; 1024 * 2];
//! let frames = adapter.extract(&mut block, 1024)?;
//! assert_eq!(frames, 1024);
//! # Ok::<(), tape_stretch::Error>(())
//! ```

pub mod adapter;
pub mod pipeline;
pub mod settings;
pub mod stretcher;
pub mod transposer;

pub use adapter::{PullAdapter, DEFAULT_HISTORY_FRAMES};
pub use pipeline::{Pipeline, PipelineBuilder, StageOrder};
pub use settings::{StretchSettings, DEFAULT_OVERLAP_MS, DEFAULT_SAMPLE_RATE};
pub use stretcher::{overlap_frames, StretchState, TempoStretcher};
pub use transposer::RateTransposer;

pub use tape_core::{
    BufferSource, Error, FifoStage, Result, SampleBuffer, SamplePipe, Source, StagePipe, CHANNELS,
};
