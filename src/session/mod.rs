//! High level reading session and the output buffer contract.

pub mod buffer;
pub mod video;

pub use buffer::{BufferAllocator, FrameBuffer, HostAllocator, HostBuffer};
pub use video::{Source, SessionError, Video, VideoOptions};
