//! Frame samplers: convert decoded frames into the requested output layout.
//!
//! A sampler caches the conversion context it built for the last
//! (input geometry, output format) pair and only rebuilds when either side
//! changes. Consecutive frames of the same shape reuse the same context.

pub mod audio;
pub mod geometry;
pub mod video;

use crate::core::media::MediaType;

pub use audio::{AudioInput, AudioSampler};
pub use video::{VideoInput, VideoSampler};

/// Error raised while converting a single frame
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Zero-area geometry {width}x{height}")]
    ZeroArea { width: u32, height: u32 },
    #[error("Invalid audio input: {0}")]
    InvalidAudio(String),
    #[error("FFmpeg error: {0}")]
    FFmpeg(#[from] ffmpeg_next::Error),
    #[error("Resampler error: {0}")]
    Resampler(i32),
}

/// Common surface of the video and audio samplers
pub trait MediaSampler {
    /// Decoded frame type consumed by `sample`
    type Frame;
    /// Geometry of the incoming frames
    type Input: Copy + PartialEq;
    /// Requested output description
    type Output: Copy + PartialEq;

    fn media_type(&self) -> MediaType;

    /// Make the conversion state match `input -> output`.
    /// Returns `true` if contexts were (re)built, `false` if the cached ones fit.
    fn configure(&mut self, input: Self::Input, output: Self::Output)
        -> Result<bool, ConversionError>;

    /// Convert `frame` into `out` (cleared first) and return the number of
    /// bytes written. Empty frames write nothing and return 0.
    fn sample(&mut self, frame: &Self::Frame, out: &mut Vec<u8>) -> Result<usize, ConversionError>;

    /// Resolved output of the current configuration, if any
    fn output_format(&self) -> Option<Self::Output>;

    /// How many times conversion contexts have been built
    fn contexts_built(&self) -> usize;

    /// Release conversion contexts. The next `sample` rebuilds them.
    fn shutdown(&mut self);
}
