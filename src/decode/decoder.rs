//! Decoder core: drives one decode worker thread per session.
//! All FFmpeg handles live on the worker; this side only sees stream
//! headers and sampled output messages.

use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError};
use tracing::{debug, warn};

use crate::core::format::DecoderParameters;
use crate::core::time::{self, Time};
use crate::decode::message::{message_channel, DecoderOutputMessage, MessageReceiver, ShutdownHandle};
use crate::decode::stream_info::StreamHeader;
use crate::decode::worker;
use crate::sampler::ConversionError;

/// Error type for decoding operations
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("FFmpeg error: {0}")]
    FFmpeg(#[from] ffmpeg_next::Error),
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: ffmpeg_next::Error,
    },
    #[error("No matching stream: {0}")]
    NoMatchingStream(String),
    #[error("Unsupported codec {codec} on stream {stream}")]
    UnsupportedCodec { stream: usize, codec: String },
    #[error("Invalid stream index: {0}")]
    InvalidStreamIndex(i64),
    #[error("No output within {0} ms")]
    Timeout(u64),
    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),
    #[error("Decoder not initialized")]
    NotInitialized,
    #[error("Decode worker failed: {0}")]
    Worker(String),
}

/// Lifecycle of a [`DecoderCore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Uninitialized,
    Initializing,
    Ready,
    Decoding,
    Seeking { target: Time },
    Shutdown,
}

impl DecoderState {
    pub fn is_ready(&self) -> bool {
        matches!(self, DecoderState::Ready | DecoderState::Decoding)
    }

    pub fn is_seeking(&self) -> bool {
        matches!(self, DecoderState::Seeking { .. })
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, DecoderState::Shutdown)
    }
}

/// One running decode worker
struct Session {
    receiver: MessageReceiver,
    shutdown: ShutdownHandle,
    worker: Option<JoinHandle<()>>,
}

impl Session {
    fn stop(&mut self) {
        self.shutdown.shutdown();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("decode worker panicked");
            }
        }
    }

    /// Cancel without joining. The worker may be blocked opening the input;
    /// it exits on its own once it finds nobody waiting for it.
    fn abandon(mut self) {
        self.shutdown.shutdown();
        self.worker.take();
    }
}

/// Owns the decode worker and the channel it writes to
pub struct DecoderCore {
    state: DecoderState,
    params: Option<DecoderParameters>,
    headers: Vec<StreamHeader>,
    session: Option<Session>,
}

impl Default for DecoderCore {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderCore {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Uninitialized,
            params: None,
            headers: Vec::new(),
            session: None,
        }
    }

    /// Start a worker for `params` and wait for its stream headers.
    ///
    /// Any previous worker is stopped first. In header-only mode the worker
    /// exits right after reporting headers.
    pub fn init(&mut self, params: DecoderParameters) -> Result<&[StreamHeader], DecodeError> {
        self.release();
        self.headers.clear();

        if !params.uri.exists() {
            self.state = DecoderState::Uninitialized;
            return Err(DecodeError::FileNotFound(params.uri.clone()));
        }
        if !self.state.is_seeking() {
            self.state = DecoderState::Initializing;
        }

        let (sender, receiver, shutdown) = message_channel(params.channel_capacity);
        let (init_tx, init_rx) = channel::bounded::<worker::InitResult>(1);
        let worker_params = params.clone();
        let worker = thread::Builder::new()
            .name("video-reader-decode".to_string())
            .spawn(move || worker::run(worker_params, init_tx, sender))
            .map_err(|e| DecodeError::Worker(e.to_string()))?;

        let session = Session {
            receiver,
            shutdown,
            worker: Some(worker),
        };

        let timeout = Duration::from_millis(params.timeout_ms);
        let headers = match init_rx.recv_timeout(timeout) {
            Ok(Ok(headers)) => headers,
            Ok(Err(e)) => {
                session.abandon();
                self.state = DecoderState::Uninitialized;
                return Err(e);
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("no stream headers from {:?} within {} ms", params.uri, params.timeout_ms);
                session.abandon();
                self.state = DecoderState::Uninitialized;
                return Err(DecodeError::Timeout(params.timeout_ms));
            }
            Err(RecvTimeoutError::Disconnected) => {
                session.abandon();
                self.state = DecoderState::Uninitialized;
                return Err(DecodeError::Worker("exited before reporting streams".to_string()));
            }
        };

        debug!(
            "decoder ready: {} stream(s), start {}, header only {}",
            headers.len(),
            time::format_time(params.start_offset),
            params.header_only
        );
        self.headers = headers;
        self.params = Some(params);
        self.session = Some(session);
        self.state = DecoderState::Ready;
        Ok(&self.headers)
    }

    /// Next sampled message. `Ok(None)` once every stream ended or after
    /// shutdown; `Err(Timeout)` if the worker produced nothing in time.
    pub fn decode(&mut self, timeout_ms: u64) -> Result<Option<DecoderOutputMessage>, DecodeError> {
        let session = self.session.as_ref().ok_or(DecodeError::NotInitialized)?;
        self.state = DecoderState::Decoding;
        session.receiver.recv(Duration::from_millis(timeout_ms))
    }

    /// Restart decoding so the first message is the earliest frame at or
    /// after `timestamp` (µs)
    pub fn seek(&mut self, timestamp: Time) -> Result<(), DecodeError> {
        let params = self
            .params
            .clone()
            .ok_or(DecodeError::NotInitialized)?
            .with_start_offset(timestamp.max(0))
            .with_header_only(false);

        debug!("seek to {}", time::format_time(timestamp));
        self.state = DecoderState::Seeking { target: timestamp };
        self.init(params).map(|_| ())
    }

    /// Stop the worker and unblock any pending `decode`. Idempotent.
    pub fn shutdown(&mut self) {
        self.release();
        self.state = DecoderState::Shutdown;
    }

    fn release(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
    }

    /// Cancels the current worker from another thread. A later `init` or
    /// `seek` starts a new worker with its own handle.
    pub fn shutdown_handle(&self) -> Option<ShutdownHandle> {
        self.session.as_ref().map(|s| s.shutdown.clone())
    }

    pub fn headers(&self) -> &[StreamHeader] {
        &self.headers
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn params(&self) -> Option<&DecoderParameters> {
        self.params.as_ref()
    }
}

impl Drop for DecoderCore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
