//! Core types shared by the decoder, the samplers and the session.
//!
//! All time values are microseconds (i64).

pub mod format;
pub mod media;
pub mod time;

pub use format::{
    AudioFormat, DecoderParameters, ElementType, FormatDetail, MediaFormat, OutputPixel, OutputSample,
    VideoFormat,
};
pub use media::{MediaType, ParseError, StreamSpec, ALL_STREAMS, FIRST_STREAM};
pub use time::{Time, JITTER_US};
