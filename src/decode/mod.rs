//! Decoding subsystem: stream matching, the decode worker and the message
//! channel between them.

pub mod decoder;
pub mod message;
pub mod stream;
pub mod stream_info;
mod worker;

pub use decoder::{DecodeError, DecoderCore, DecoderState};
pub use message::{DecoderOutputMessage, MessageHeader, ShutdownHandle};
pub use stream_info::{match_streams, StreamHeader};
