//! Container demuxing, decoding and frame sampling into fixed-shape
//! buffers, built on FFmpeg.
//!
//! [`Video`] is the entry point: open a file, pick a stream with a
//! `type[:index]` specifier, then seek and pull frames with `next`.
//! [`DecoderCore`] is the lower level worker-backed decoder it drives.

pub mod core;
pub mod decode;
pub mod sampler;
pub mod session;

pub use crate::core::{
    AudioFormat, DecoderParameters, ElementType, MediaFormat, MediaType, OutputPixel, OutputSample,
    ParseError, StreamSpec, Time, VideoFormat,
};
pub use crate::decode::{DecodeError, DecoderCore, DecoderOutputMessage, DecoderState, StreamHeader};
pub use crate::sampler::ConversionError;
pub use crate::session::{
    BufferAllocator, FrameBuffer, HostAllocator, HostBuffer, SessionError, Source, Video, VideoOptions,
};
