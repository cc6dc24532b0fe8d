//! Building blocks of the tape pitch/tempo pipeline.
//!
//! - [`SampleBuffer`]: growable FIFO of interleaved stereo `f32` frames
//! - [`FifoStage`] / [`SamplePipe`]: a processing stage and a buffer-owning pipe
//! - [`StagePipe`]: drives a single stage on its own buffers
//! - [`Source`] / [`BufferSource`]: random-access frame providers
//!
//! Everything here is single-threaded and synchronous. No call blocks or
//! spawns work; buffers only allocate when they have to grow.

pub mod buffer;
pub mod error;
pub mod interleave;
pub mod source;
pub mod stage;

pub use buffer::{SampleBuffer, CHANNELS};
pub use error::{Error, Result};
pub use interleave::{deinterleave, interleave, interleave_mono};
pub use source::{BufferSource, Source};
pub use stage::{FifoStage, FlushTracker, SamplePipe, StagePipe};
