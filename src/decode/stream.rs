//! Per-stream decode state owned by the worker: the opened FFmpeg decoder,
//! its sampler and the reusable frame.

use std::collections::VecDeque;

use ffmpeg_next::codec::subtitle::{Rect, Subtitle};
use ffmpeg_next::codec::{self, decoder};
use ffmpeg_next::format::stream::Stream;
use ffmpeg_next::frame;
use ffmpeg_next::media;
use ffmpeg_next::packet::Packet;
use tracing::debug;

use crate::core::format::{FormatDetail, MediaFormat};
use crate::core::media::MediaType;
use crate::core::time::{self, Time};
use crate::decode::decoder::DecodeError;
use crate::decode::message::{DecoderOutputMessage, MessageHeader};
use crate::sampler::{AudioSampler, MediaSampler, VideoSampler};

/// Media kind of a container stream, `None` for data and attachments
pub fn classify(medium: media::Type, codec: codec::Id) -> Option<MediaType> {
    match medium {
        media::Type::Video => Some(MediaType::Video),
        media::Type::Audio => Some(MediaType::Audio),
        media::Type::Subtitle if codec == codec::Id::EIA_608 => Some(MediaType::ClosedCaption),
        media::Type::Subtitle => Some(MediaType::Subtitle),
        _ => None,
    }
}

enum Kind {
    Video {
        decoder: decoder::Video,
        sampler: VideoSampler,
        frame: frame::Video,
    },
    Audio {
        decoder: decoder::Audio,
        sampler: AudioSampler,
        frame: frame::Audio,
        flushed: bool,
    },
    Text {
        decoder: decoder::Subtitle,
        pending: VecDeque<(Time, Vec<u8>)>,
    },
}

/// One matched stream being decoded
pub(crate) struct OpenStream {
    pub index: usize,
    format: MediaFormat,
    time_base: (i32, i32),
    /// Expected pts of the next frame, for frames without a timestamp
    next_pts: Time,
    /// Set once the stream passed the end offset
    pub finished: bool,
    kind: Kind,
}

impl OpenStream {
    /// Open a decoder for `stream`, sampling into `format`
    pub fn open(stream: &Stream, format: MediaFormat) -> Result<Self, DecodeError> {
        let parameters = stream.parameters();
        let codec_id = parameters.id();
        let unsupported = |_: ffmpeg_next::Error| DecodeError::UnsupportedCodec {
            stream: stream.index(),
            codec: codec_id.name().to_string(),
        };
        let context = codec::context::Context::from_parameters(parameters).map_err(unsupported)?;

        let kind = match &format.detail {
            FormatDetail::Video(requested) => Kind::Video {
                decoder: context.decoder().video().map_err(unsupported)?,
                sampler: VideoSampler::new(*requested),
                frame: frame::Video::empty(),
            },
            FormatDetail::Audio(requested) => Kind::Audio {
                decoder: context.decoder().audio().map_err(unsupported)?,
                sampler: AudioSampler::new(*requested),
                frame: frame::Audio::empty(),
                flushed: false,
            },
            FormatDetail::Text => Kind::Text {
                decoder: context.decoder().subtitle().map_err(unsupported)?,
                pending: VecDeque::new(),
            },
        };

        let time_base = stream.time_base();
        debug!("opened {} decoder for stream {}", codec_id.name(), stream.index());
        Ok(Self {
            index: stream.index(),
            format,
            time_base: (time_base.numerator(), time_base.denominator()),
            next_pts: 0,
            finished: false,
            kind,
        })
    }

    pub fn media_type(&self) -> MediaType {
        self.format.media_type
    }

    fn to_micros(&self, pts: i64) -> Time {
        time::stream_to_micros(pts, self.time_base.0, self.time_base.1)
    }

    /// Hand one packet to the decoder
    pub fn feed(&mut self, packet: &Packet) -> Result<(), DecodeError> {
        let packet_pts = packet.pts().map(|p| self.to_micros(p));
        match &mut self.kind {
            Kind::Video { decoder, .. } => decoder.send_packet(packet)?,
            Kind::Audio { decoder, .. } => decoder.send_packet(packet)?,
            Kind::Text { decoder, pending } => {
                let mut subtitle = Subtitle::new();
                if decoder.decode(packet, &mut subtitle)? {
                    // subtitle pts is in AV_TIME_BASE units, display start in ms
                    let base = subtitle.pts().or(packet_pts).unwrap_or(self.next_pts);
                    let pts = base + time::from_millis(subtitle.start() as i64);
                    let text = subtitle_text(&subtitle);
                    if text.is_empty() {
                        debug!("stream {}: skipping subtitle without text", self.index);
                    } else {
                        pending.push_back((pts, text.into_bytes()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Signal end of input so buffered frames can be drained
    pub fn send_eof(&mut self) -> Result<(), DecodeError> {
        match &mut self.kind {
            Kind::Video { decoder, .. } => decoder.send_eof()?,
            Kind::Audio { decoder, .. } => decoder.send_eof()?,
            Kind::Text { .. } => {}
        }
        Ok(())
    }

    /// Next decoded and sampled message, `Ok(None)` when the decoder needs
    /// more input or is fully drained.
    ///
    /// A `Conversion` error only affects the frame it was raised for.
    pub fn receive(&mut self) -> Result<Option<DecoderOutputMessage>, DecodeError> {
        let index = self.index;
        let (num, den) = self.time_base;

        match &mut self.kind {
            Kind::Video {
                decoder,
                sampler,
                frame,
            } => loop {
                if receive_frame(decoder.receive_frame(frame))? != Received::Frame {
                    return Ok(None);
                }
                let pts = frame
                    .timestamp()
                    .map(|p| time::stream_to_micros(p, num, den))
                    .unwrap_or(self.next_pts);
                self.next_pts = pts;

                let mut payload = Vec::new();
                if sampler.sample(frame, &mut payload)? == 0 {
                    continue;
                }
                let output = sampler.output_format().unwrap_or(*sampler.requested());
                return Ok(Some(DecoderOutputMessage {
                    header: MessageHeader {
                        format: MediaFormat::video(index as i64, output),
                        pts,
                        key_frame: frame.is_key(),
                    },
                    payload,
                }));
            },
            Kind::Audio {
                decoder,
                sampler,
                frame,
                flushed,
            } => loop {
                let mut payload = Vec::new();
                let mut pts = self.next_pts;

                match receive_frame(decoder.receive_frame(frame))? {
                    Received::Again => return Ok(None),
                    Received::Drained if *flushed => return Ok(None),
                    Received::Drained => {
                        // resampler tail after the last decoded frame
                        *flushed = true;
                        if sampler.flush(&mut payload)? == 0 {
                            return Ok(None);
                        }
                    }
                    Received::Frame => {
                        pts = frame
                            .timestamp()
                            .map(|p| time::stream_to_micros(p, num, den))
                            .unwrap_or(pts);
                        if frame.rate() > 0 {
                            self.next_pts = pts
                                + frame.samples() as Time * time::constants::MICROS_PER_SECOND
                                    / frame.rate() as Time;
                        }
                        if sampler.sample(frame, &mut payload)? == 0 {
                            continue;
                        }
                    }
                }

                let output = sampler.output_format().unwrap_or(*sampler.requested());
                return Ok(Some(DecoderOutputMessage {
                    header: MessageHeader {
                        format: MediaFormat::audio(index as i64, output),
                        pts,
                        key_frame: true,
                    },
                    payload,
                }));
            },
            Kind::Text { pending, .. } => Ok(pending.pop_front().map(|(pts, payload)| {
                self.next_pts = pts;
                DecoderOutputMessage {
                    header: MessageHeader {
                        format: self.format,
                        pts,
                        key_frame: true,
                    },
                    payload,
                }
            })),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Received {
    Frame,
    /// Decoder needs more input
    Again,
    /// Every frame was returned after end of input
    Drained,
}

fn receive_frame(result: Result<(), ffmpeg_next::Error>) -> Result<Received, DecodeError> {
    match result {
        Ok(()) => Ok(Received::Frame),
        Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => {
            Ok(Received::Again)
        }
        Err(ffmpeg_next::Error::Eof) => Ok(Received::Drained),
        Err(e) => Err(e.into()),
    }
}

fn subtitle_text(subtitle: &Subtitle) -> String {
    subtitle
        .rects()
        .filter_map(|rect| match rect {
            Rect::Text(text) => Some(text.get().to_string()),
            Rect::Ass(ass) => Some(ass_event_text(ass.get())),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plain text of an ASS event line as produced by FFmpeg's text subtitle
/// decoders: `ReadOrder,Layer,Style,Name,MarginL,MarginR,MarginV,Effect,Text`,
/// or the older `Dialogue: Layer,Start,End,...` form.
fn ass_event_text(event: &str) -> String {
    let (fields, rest) = match event.strip_prefix("Dialogue:") {
        Some(rest) => (10, rest),
        None => (9, event),
    };
    let text = rest.splitn(fields, ',').nth(fields - 1).unwrap_or(rest);
    text.trim_end_matches(['\r', '\n'])
        .replace("\\N", "\n")
        .replace("\\n", "\n")
}
