//! # Tape - Time-domain pitch and tempo processing
//!
//! Changes the playback rate, tempo and pitch of interleaved stereo audio
//! independently, without any frequency-domain processing.
//!
//! ## Architecture
//!
//! Tape is an umbrella crate that coordinates:
//! - **tape-core** - Sample FIFO, stage traits, flush bookkeeping, sources
//! - **tape-stretch** - Rate transposer, WSOLA tempo stretcher, pipeline and pull adapter
//!
//! ## Quick Start
//!
//! ```
//! use tape::prelude::*;
//!
//! // One second of a 440 Hz tone, mono duplicated to both channels
//! let tone: Vec<f32> = (0..44100)
//!     .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
//!     .collect();
//!
//! // Twice as long, same pitch
//! let pipeline = Pipeline::builder().tempo(2.0).build()?;
//! let result = tape::render::render(&interleave_mono(&tone), pipeline)?;
//!
//! assert_eq!(result.frame_count(), 88200);
//! # Ok::<(), tape::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Pipeline and rendering
//! - `serialization` - Serde support for [`StretchSettings`]

/// Re-export of tape-core for direct access
pub use tape_core as core;

/// Re-export of tape-stretch for direct access
pub use tape_stretch as stretch;

pub mod render;

pub use tape_core::{
    deinterleave, interleave, interleave_mono, BufferSource, Error, FifoStage, FlushTracker,
    Result, SampleBuffer, SamplePipe, Source, StagePipe, CHANNELS,
};
pub use tape_stretch::{
    Pipeline, PipelineBuilder, PullAdapter, RateTransposer, StageOrder, StretchSettings,
    TempoStretcher,
};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::render::{render, render_adapter, RenderResult};
    pub use crate::{
        deinterleave, interleave, interleave_mono, BufferSource, Error, Pipeline,
        PipelineBuilder, PullAdapter, RateTransposer, Result, SamplePipe, Source, StagePipe,
        StretchSettings, TempoStretcher,
    };
}
