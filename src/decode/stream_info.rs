//! Stream headers and the matching of requested formats against the
//! container's streams.

use std::collections::BTreeSet;

use ffmpeg_next::format::stream::Stream;
use ffmpeg_next::media;
use tracing::debug;

use crate::core::format::MediaFormat;
use crate::core::media::{MediaType, ALL_STREAMS, FIRST_STREAM};
use crate::core::time::{self, Time};
use crate::decode::decoder::DecodeError;

/// Container-reported description of one opened stream
#[derive(Debug, Clone)]
pub struct StreamHeader {
    /// Requested format with `stream` resolved to the container index
    pub format: MediaFormat,
    /// Frames per second for video, sample rate for audio, 0 for text
    pub fps: f64,
    /// Duration in microseconds, 0 when unknown
    pub duration: Time,
    pub time_base_num: i32,
    pub time_base_den: i32,
    pub codec_name: String,
}

impl StreamHeader {
    /// Build the header for `stream`. `container_duration` (µs) is used when
    /// the stream does not report its own duration.
    pub fn from_stream(stream: &Stream, format: MediaFormat, container_duration: Time) -> Self {
        let parameters = stream.parameters();
        let time_base = stream.time_base();
        let (num, den) = (time_base.numerator(), time_base.denominator());

        let fps = match parameters.medium() {
            media::Type::Video => {
                let avg = stream.avg_frame_rate();
                if avg.numerator() > 0 && avg.denominator() > 0 {
                    f64::from(avg)
                } else {
                    let r = stream.rate();
                    if r.numerator() > 0 && r.denominator() > 0 {
                        f64::from(r)
                    } else {
                        0.0
                    }
                }
            }
            media::Type::Audio => unsafe { (*parameters.as_ptr()).sample_rate.max(0) as f64 },
            _ => 0.0,
        };

        let duration = if stream.duration() > 0 && num > 0 && den > 0 {
            time::stream_to_micros(stream.duration(), num, den)
        } else {
            container_duration.max(0)
        };

        Self {
            format,
            fps,
            duration,
            time_base_num: num,
            time_base_den: den,
            codec_name: parameters.id().name().to_string(),
        }
    }

    pub fn media_type(&self) -> MediaType {
        self.format.media_type
    }

    /// Container index of the stream
    pub fn index(&self) -> usize {
        self.format.stream as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        time::to_seconds(self.duration)
    }
}

/// Resolve `formats` against the container streams listed in `available`
/// as `(container index, type)` pairs.
///
/// Explicit indices must name a stream of the right type, `FIRST_STREAM`
/// needs at least one stream of the type and `ALL_STREAMS` takes whatever
/// exists. The result is in container order with one entry per stream;
/// the format listed first wins when several select the same stream.
pub fn match_streams(
    available: &[(usize, MediaType)],
    formats: &BTreeSet<MediaFormat>,
) -> Result<Vec<(usize, MediaFormat)>, DecodeError> {
    let mut matched: Vec<(usize, MediaFormat)> = Vec::new();
    let mut take = |index: usize, format: &MediaFormat| {
        if matched.iter().all(|(i, _)| *i != index) {
            let mut resolved = *format;
            resolved.stream = index as i64;
            matched.push((index, resolved));
        }
    };

    for format in formats {
        let of_type = available.iter().filter(|(_, t)| *t == format.media_type);
        match format.stream {
            ALL_STREAMS => of_type.for_each(|(i, _)| take(*i, format)),
            FIRST_STREAM => {
                let (index, _) = of_type.min_by_key(|(i, _)| *i).ok_or_else(|| {
                    DecodeError::NoMatchingStream(format!("no {} stream", format.media_type))
                })?;
                take(*index, format);
            }
            index if index >= 0 => {
                let found = available.iter().find(|(i, _)| *i as i64 == index);
                match found {
                    Some((i, t)) if *t == format.media_type => take(*i, format),
                    Some((_, t)) => {
                        return Err(DecodeError::NoMatchingStream(format!(
                            "stream {index} is {t}, not {}",
                            format.media_type
                        )))
                    }
                    None => return Err(DecodeError::InvalidStreamIndex(index)),
                }
            }
            index => return Err(DecodeError::InvalidStreamIndex(index)),
        }
    }

    if matched.is_empty() {
        return Err(DecodeError::NoMatchingStream("no requested stream found".to_string()));
    }
    matched.sort_by_key(|(i, _)| *i);
    debug!("matched streams {:?}", matched.iter().map(|(i, _)| *i).collect::<Vec<_>>());
    Ok(matched)
}
