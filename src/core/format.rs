//! Output format descriptions and decoder parameters.
//!
//! A [`DecoderParameters`] value fully determines one decode session: which
//! streams to open, what shape each decoded frame is sampled into, where to
//! start and how long to wait for output. It is rebuilt on every seek.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::core::media::{MediaType, StreamSpec, ALL_STREAMS};
use crate::core::time::Time;

/// Default receive timeout (10 minutes)
pub const DEFAULT_TIMEOUT_MS: u64 = 600_000;
/// Default container seek margin in microseconds
pub const DEFAULT_SEEK_ACCURACY_US: Time = 10;
/// Default number of decoded messages buffered between worker and consumer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Element type of an output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    U8,
    I16,
    F32,
}

impl ElementType {
    /// Size of one element in bytes
    pub fn size(self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::I16 => 2,
            ElementType::F32 => 4,
        }
    }
}

/// Pixel layout written by the video sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputPixel {
    /// Packed 8-bit RGB, 3 channels
    #[default]
    Rgb24,
    /// 8-bit luma, 1 channel
    Gray8,
}

impl OutputPixel {
    pub fn channels(self) -> usize {
        match self {
            OutputPixel::Rgb24 => 3,
            OutputPixel::Gray8 => 1,
        }
    }
}

/// Sample layout written by the audio sampler (always packed/interleaved)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputSample {
    #[default]
    F32,
    I16,
}

impl OutputSample {
    pub fn bytes(self) -> usize {
        self.element_type().size()
    }

    pub fn element_type(self) -> ElementType {
        match self {
            OutputSample::F32 => ElementType::F32,
            OutputSample::I16 => ElementType::I16,
        }
    }
}

/// Requested video output. Zero means "use the source value".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    /// Shorter output side when width and height are both unset
    pub min_dimension: u32,
    /// Longer output side when width and height are both unset
    pub max_dimension: u32,
    /// Scale to cover the target and centre-crop instead of stretching
    pub crop_image: bool,
    pub pixel: OutputPixel,
}

impl VideoFormat {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Bytes of one packed output frame
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * self.pixel.channels()
    }
}

/// Requested audio output. Zero means "use the source value".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample: OutputSample,
}

impl AudioFormat {
    /// Bytes of `samples` interleaved output samples
    pub fn bytes_for(&self, samples: usize) -> usize {
        samples * self.channels as usize * self.sample.bytes()
    }
}

/// Type specific part of a [`MediaFormat`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatDetail {
    Video(VideoFormat),
    Audio(AudioFormat),
    /// Subtitles and closed captions carry text, no geometry
    Text,
}

/// Per-stream target description.
///
/// Ordering and equality consider only `(media_type, stream)`, so a
/// `BTreeSet<MediaFormat>` holds at most one target per stream.
#[derive(Debug, Clone, Copy)]
pub struct MediaFormat {
    pub media_type: MediaType,
    /// Container stream index, or -1 (first) / -2 (all) of this type
    pub stream: i64,
    pub detail: FormatDetail,
}

impl MediaFormat {
    /// Target for `media_type` with native geometry
    pub fn native(media_type: MediaType, stream: i64) -> Self {
        let detail = match media_type {
            MediaType::Video => FormatDetail::Video(VideoFormat::default()),
            MediaType::Audio => FormatDetail::Audio(AudioFormat::default()),
            MediaType::Subtitle | MediaType::ClosedCaption => FormatDetail::Text,
        };
        Self {
            media_type,
            stream,
            detail,
        }
    }

    pub fn video(stream: i64, format: VideoFormat) -> Self {
        Self {
            media_type: MediaType::Video,
            stream,
            detail: FormatDetail::Video(format),
        }
    }

    pub fn audio(stream: i64, format: AudioFormat) -> Self {
        Self {
            media_type: MediaType::Audio,
            stream,
            detail: FormatDetail::Audio(format),
        }
    }

    pub fn video_format(&self) -> Option<&VideoFormat> {
        match &self.detail {
            FormatDetail::Video(v) => Some(v),
            _ => None,
        }
    }

    pub fn audio_format(&self) -> Option<&AudioFormat> {
        match &self.detail {
            FormatDetail::Audio(a) => Some(a),
            _ => None,
        }
    }

    fn key(&self) -> (MediaType, i64) {
        (self.media_type, self.stream)
    }
}

impl PartialEq for MediaFormat {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for MediaFormat {}

impl PartialOrd for MediaFormat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaFormat {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Everything one decode session needs
#[derive(Debug, Clone)]
pub struct DecoderParameters {
    pub timeout_ms: u64,
    /// First presentation timestamp to emit (µs)
    pub start_offset: Time,
    /// Last presentation timestamp to emit (µs), unbounded if `None`
    pub end_offset: Option<Time>,
    /// Container seeks land this many µs before `start_offset`
    pub seek_accuracy: Time,
    /// Only gather stream headers, do not decode
    pub header_only: bool,
    pub formats: BTreeSet<MediaFormat>,
    pub uri: PathBuf,
    pub channel_capacity: usize,
}

impl Default for DecoderParameters {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            start_offset: 0,
            end_offset: None,
            seek_accuracy: DEFAULT_SEEK_ACCURACY_US,
            header_only: false,
            formats: BTreeSet::new(),
            uri: PathBuf::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl DecoderParameters {
    pub fn new(uri: impl Into<PathBuf>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    /// Request every stream of every type with native geometry
    pub fn with_all_streams(mut self) -> Self {
        self.formats = MediaType::ALL
            .into_iter()
            .map(|t| MediaFormat::native(t, ALL_STREAMS))
            .collect();
        self
    }

    /// Request exactly one stream, replacing any previous formats.
    /// `video` and `audio` apply when `stream` names a stream of that type.
    pub fn with_stream(mut self, stream: StreamSpec, video: VideoFormat, audio: AudioFormat) -> Self {
        let format = match stream.media_type {
            MediaType::Video => MediaFormat::video(stream.index, video),
            MediaType::Audio => MediaFormat::audio(stream.index, audio),
            other => MediaFormat::native(other, stream.index),
        };
        self.formats = BTreeSet::from([format]);
        self
    }

    /// Add a target. Returns false if one already exists for the same stream.
    pub fn insert_format(&mut self, format: MediaFormat) -> bool {
        self.formats.insert(format)
    }

    pub fn with_start_offset(mut self, start_offset: Time) -> Self {
        self.start_offset = start_offset;
        self
    }

    pub fn with_end_offset(mut self, end_offset: Option<Time>) -> Self {
        self.end_offset = end_offset;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_seek_accuracy(mut self, seek_accuracy: Time) -> Self {
        self.seek_accuracy = seek_accuracy;
        self
    }

    pub fn with_header_only(mut self, header_only: bool) -> Self {
        self.header_only = header_only;
        self
    }

    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity.max(1);
        self
    }
}
