//! `Video` session: the high level reader over one container.
//!
//! Opening a file first gathers metadata for every stream in header-only
//! mode, then starts decoding the current stream. Each `next` call returns
//! one frame buffer and its presentation time in seconds.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use crate::core::format::{
    AudioFormat, DecoderParameters, ElementType, VideoFormat, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_SEEK_ACCURACY_US, DEFAULT_TIMEOUT_MS,
};
use crate::core::media::{MediaType, ParseError, StreamSpec};
use crate::core::time::{self, Time};
use crate::decode::{
    DecodeError, DecoderCore, DecoderOutputMessage, MessageHeader, ShutdownHandle, StreamHeader,
};
use crate::session::buffer::{byte_len, BufferAllocator, FrameBuffer, HostAllocator};

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("No {0} stream in this source")]
    Lookup(MediaType),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Unsupported source: {0}")]
    UnsupportedSource(&'static str),
    #[error("Requested {requested} but the session is decoding {current}")]
    StreamMismatch {
        requested: StreamSpec,
        current: StreamSpec,
    },
    #[error("Payload of {actual} bytes does not fill a {expected} byte buffer")]
    PayloadMismatch { expected: usize, actual: usize },
}

/// Where the session reads from
#[derive(Debug, Clone)]
pub enum Source {
    File(PathBuf),
    /// Reserved; opening one fails with [`SessionError::UnsupportedSource`]
    Memory(Vec<u8>),
}

impl From<&str> for Source {
    fn from(path: &str) -> Self {
        Source::File(PathBuf::from(path))
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::File(path.to_path_buf())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::File(path)
    }
}

/// Session-wide decoder settings
#[derive(Debug, Clone, Copy)]
pub struct VideoOptions {
    pub timeout_ms: u64,
    pub seek_accuracy: Time,
    pub channel_capacity: usize,
    /// Output geometry for video streams
    pub video: VideoFormat,
    /// Output layout for audio streams
    pub audio: AudioFormat,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            seek_accuracy: DEFAULT_SEEK_ACCURACY_US,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            video: VideoFormat::default(),
            audio: AudioFormat::default(),
        }
    }
}

/// Reader over one media file
pub struct Video<A: BufferAllocator = HostAllocator> {
    uri: PathBuf,
    options: VideoOptions,
    core: DecoderCore,
    allocator: A,
    current: StreamSpec,
    /// Target of the last seek (µs) until the first frame after it is returned
    seek_target: Option<Time>,
    any_frame: bool,
    /// Every stream found while gathering metadata
    headers: Vec<StreamHeader>,
    fps: BTreeMap<MediaType, Vec<f64>>,
    /// Seconds
    duration: BTreeMap<MediaType, Vec<f64>>,
}

impl Video<HostAllocator> {
    /// Open `path` and start decoding `stream` (`""` means the first video
    /// stream)
    pub fn open(path: impl AsRef<Path>, stream: &str) -> Result<Self, SessionError> {
        Self::open_with_options(path, stream, VideoOptions::default())
    }

    pub fn open_with_options(
        path: impl AsRef<Path>,
        stream: &str,
        options: VideoOptions,
    ) -> Result<Self, SessionError> {
        Self::open_with(Source::from(path.as_ref()), stream, options, HostAllocator)
    }
}

impl<A: BufferAllocator> Video<A> {
    /// Open `source` writing output through `allocator`
    pub fn open_with(
        source: Source,
        stream: &str,
        options: VideoOptions,
        allocator: A,
    ) -> Result<Self, SessionError> {
        let uri = match source {
            Source::File(path) => path,
            Source::Memory(_) => return Err(SessionError::UnsupportedSource("in-memory buffers")),
        };
        let current = if stream.is_empty() {
            StreamSpec::first(MediaType::Video)
        } else {
            StreamSpec::parse(stream)?
        };

        info!("gathering metadata from file [{}]", uri.display());
        let mut core = DecoderCore::new();
        let discovery = DecoderParameters::new(&uri)
            .with_all_streams()
            .with_header_only(true)
            .with_timeout_ms(options.timeout_ms);
        let headers = core.init(discovery)?.to_vec();

        let mut fps: BTreeMap<MediaType, Vec<f64>> = BTreeMap::new();
        let mut duration: BTreeMap<MediaType, Vec<f64>> = BTreeMap::new();
        for header in &headers {
            debug!(
                "{} stream {}: {} fps {:.3}, duration {:.3}s, time base {}/{}",
                header.media_type(),
                header.index(),
                header.codec_name,
                header.fps,
                header.duration_seconds(),
                header.time_base_num,
                header.time_base_den
            );
            fps.entry(header.media_type()).or_default().push(header.fps);
            duration
                .entry(header.media_type())
                .or_default()
                .push(header.duration_seconds());
        }
        info!(
            "found {} stream(s) in [{}], decoding {}",
            headers.len(),
            uri.display(),
            current
        );

        let mut video = Self {
            uri,
            options,
            core,
            allocator,
            current,
            seek_target: None,
            any_frame: false,
            headers,
            fps,
            duration,
        };
        video.start(current, 0)?;
        Ok(video)
    }

    fn params_for(&self, spec: StreamSpec, start: Time) -> DecoderParameters {
        DecoderParameters::new(&self.uri)
            .with_stream(spec, self.options.video, self.options.audio)
            .with_start_offset(start)
            .with_timeout_ms(self.options.timeout_ms)
            .with_seek_accuracy(self.options.seek_accuracy)
            .with_channel_capacity(self.options.channel_capacity)
    }

    /// Decode `spec` from `start`, reusing the running parameters when only
    /// the position changes
    fn start(&mut self, spec: StreamSpec, start: Time) -> Result<(), SessionError> {
        if !self.fps.contains_key(&spec.media_type) {
            return Err(SessionError::Lookup(spec.media_type));
        }
        let same_stream = self.current == spec && self.core.params().is_some_and(|p| !p.header_only);
        if same_stream {
            self.core.seek(start)?;
        } else {
            let params = self.params_for(spec, start);
            self.core.init(params)?;
        }
        self.current = spec;
        Ok(())
    }

    /// Resolve a user supplied specifier; `""` means the current stream
    fn resolve(&self, stream: &str) -> Result<StreamSpec, SessionError> {
        if stream.is_empty() {
            Ok(self.current)
        } else {
            Ok(StreamSpec::parse(stream)?)
        }
    }

    /// Frame rates of every stream of the type named by `stream`
    pub fn get_fps(&self, stream: &str) -> Result<&[f64], SessionError> {
        let media_type = self.resolve(stream)?.media_type;
        self.fps
            .get(&media_type)
            .map(Vec::as_slice)
            .ok_or(SessionError::Lookup(media_type))
    }

    /// Durations in seconds of every stream of the type named by `stream`
    pub fn get_duration(&self, stream: &str) -> Result<&[f64], SessionError> {
        let media_type = self.resolve(stream)?.media_type;
        self.duration
            .get(&media_type)
            .map(Vec::as_slice)
            .ok_or(SessionError::Lookup(media_type))
    }

    /// Restart decoding of `stream` at `ts` seconds. Returns 0 on success
    /// and 1 if the decoder could not be restarted.
    ///
    /// With `any_frame` set the next returned frame is the first keyframe at
    /// or after `ts`; otherwise it is the first frame at or after `ts`.
    pub fn seek(&mut self, ts: f64, stream: &str, any_frame: bool) -> Result<i32, SessionError> {
        let spec = self.resolve(stream)?;
        let target = time::from_seconds(ts).max(0);

        match self.start(spec, target) {
            Ok(()) => {
                debug!("seek {} to {}", spec, time::format_time(target));
                self.seek_target = Some(target);
                self.any_frame = any_frame;
                Ok(0)
            }
            Err(e) => {
                warn!("seek {} to {:.3}s failed: {}", spec, ts, e);
                Ok(1)
            }
        }
    }

    /// Next frame of the current stream and its pts as a `[1]` f32 buffer in
    /// seconds. `Ok(None)` at end of stream.
    pub fn next(&mut self, stream: &str) -> Result<Option<(A::Buffer, A::Buffer)>, SessionError> {
        let requested = self.resolve(stream)?;
        if requested != self.current {
            return Err(SessionError::StreamMismatch {
                requested,
                current: self.current,
            });
        }

        loop {
            let Some(message) = self.core.decode(self.options.timeout_ms)? else {
                self.seek_target = None;
                return Ok(None);
            };

            if let Some(target) = self.seek_target {
                if !accepts(&message.header, target, self.any_frame) {
                    trace!("skipping {} while looking for a keyframe", message.header.pts);
                    continue;
                }
                self.seek_target = None;
            }
            return self.fill(message).map(Some);
        }
    }

    /// Copy one message into freshly allocated frame and pts buffers
    fn fill(&mut self, message: DecoderOutputMessage) -> Result<(A::Buffer, A::Buffer), SessionError> {
        let (shape, element_type) = message.header.output_shape(message.payload.len());
        let expected = byte_len(&shape, element_type);
        if expected != message.payload.len() {
            return Err(SessionError::PayloadMismatch {
                expected,
                actual: message.payload.len(),
            });
        }

        let mut frame = self.allocator.allocate(&shape, element_type);
        frame.bytes_mut().copy_from_slice(&message.payload);

        let mut pts = self.allocator.allocate(&[1], ElementType::F32);
        let seconds = time::to_seconds(message.header.pts) as f32;
        pts.bytes_mut().copy_from_slice(&seconds.to_ne_bytes());
        Ok((frame, pts))
    }

    /// Switch decoding to `stream` from the beginning
    pub fn set_current_stream(&mut self, stream: &str) -> Result<(), SessionError> {
        let spec = if stream.is_empty() {
            StreamSpec::first(MediaType::Video)
        } else {
            StreamSpec::parse(stream)?
        };
        self.seek_target = None;
        self.any_frame = false;
        self.start(spec, 0)
    }

    pub fn current_stream(&self) -> StreamSpec {
        self.current
    }

    /// Headers of every stream found while opening
    pub fn stream_headers(&self) -> &[StreamHeader] {
        &self.headers
    }

    /// Cancels the running decode from another thread
    pub fn shutdown_handle(&self) -> Option<ShutdownHandle> {
        self.core.shutdown_handle()
    }

    /// Stop decoding; later `next` calls return `Ok(None)` or an error
    pub fn shutdown(&mut self) {
        self.core.shutdown();
    }
}

/// Whether the first frame after a seek to `target` may be returned. The
/// worker already dropped frames before the target; keyframe mode also
/// waits for the next keyframe.
fn accepts(header: &MessageHeader, target: Time, any_frame: bool) -> bool {
    !any_frame || (header.key_frame && time::reached(header.pts, target))
}
