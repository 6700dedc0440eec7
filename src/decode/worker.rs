//! Decode worker: owns the demuxer and every opened decoder for one
//! session. Runs on its own thread; all FFmpeg handles are created and
//! dropped here.

use crossbeam::channel::Sender;
use ffmpeg_next::format;
use ffmpeg_next::packet::Packet;
use tracing::{debug, trace, warn};

use crate::core::format::DecoderParameters;
use crate::core::time::{self, Time};
use crate::decode::decoder::DecodeError;
use crate::decode::message::MessageSender;
use crate::decode::stream::{classify, OpenStream};
use crate::decode::stream_info::{match_streams, StreamHeader};

pub(crate) type InitResult = Result<Vec<StreamHeader>, DecodeError>;

/// Result of draining one stream's decoder
enum Drain {
    Continue,
    /// Consumer is gone or the session was cancelled
    Stop,
}

pub(crate) fn run(params: DecoderParameters, init_tx: Sender<InitResult>, sender: MessageSender) {
    let (mut input, mut streams) = match open(&params) {
        Ok((input, streams, headers)) => {
            if init_tx.send(Ok(headers)).is_err() {
                debug!("decoder gave up waiting for init");
                return;
            }
            if params.header_only {
                return;
            }
            (input, streams)
        }
        Err(e) => {
            let _ = init_tx.send(Err(e));
            return;
        }
    };
    drop(init_tx);

    if params.start_offset > 0 {
        let target = (params.start_offset - params.seek_accuracy).max(0);
        match input.seek(target, ..target) {
            Ok(()) => debug!("seeked to {}", time::format_time(target)),
            // decoding from the start still yields the right frames
            Err(e) => warn!("seek to {} failed: {}", time::format_time(target), e),
        }
    }

    decode_loop(&params, &mut input, &mut streams, &sender);
    debug!("decode worker for {:?} exiting", params.uri);
}

/// Open the source, match streams and collect headers. Decoders are only
/// opened outside header-only mode.
fn open(
    params: &DecoderParameters,
) -> Result<(format::context::Input, Vec<OpenStream>, Vec<StreamHeader>), DecodeError> {
    ffmpeg_next::init()?;
    let input = format::input(&params.uri).map_err(|source| DecodeError::OpenFailed {
        path: params.uri.clone(),
        source,
    })?;

    let available: Vec<_> = input
        .streams()
        .filter_map(|s| {
            let parameters = s.parameters();
            classify(parameters.medium(), parameters.id()).map(|t| (s.index(), t))
        })
        .collect();
    let matched = match_streams(&available, &params.formats)?;

    let container_duration = input.duration().max(0);
    let mut headers = Vec::with_capacity(matched.len());
    let mut streams = Vec::new();
    for (index, format) in matched {
        let stream = input
            .stream(index)
            .ok_or(DecodeError::InvalidStreamIndex(index as i64))?;
        headers.push(StreamHeader::from_stream(&stream, format, container_duration));
        if !params.header_only {
            streams.push(OpenStream::open(&stream, format)?);
        }
    }

    Ok((input, streams, headers))
}

fn decode_loop(
    params: &DecoderParameters,
    input: &mut format::context::Input,
    streams: &mut [OpenStream],
    sender: &MessageSender,
) {
    let mut packet = Packet::empty();
    loop {
        if sender.is_cancelled() {
            return;
        }

        match packet.read(input) {
            Ok(()) => {
                let Some(stream) = streams.iter_mut().find(|s| s.index == packet.stream()) else {
                    continue;
                };
                if stream.finished {
                    continue;
                }
                if let Err(e) = stream.feed(&packet) {
                    warn!("stream {}: dropping packet: {}", stream.index, e);
                    continue;
                }
                if let Drain::Stop = drain(params, stream, sender) {
                    return;
                }
                if streams.iter().all(|s| s.finished) {
                    debug!("all streams reached the end offset");
                    return;
                }
            }
            Err(ffmpeg_next::Error::Eof) => break,
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => {}
            Err(e) => {
                sender.send(Err(DecodeError::FFmpeg(e)));
                return;
            }
        }
    }

    for stream in streams.iter_mut().filter(|s| !s.finished) {
        if let Err(e) = stream.send_eof() {
            warn!("stream {}: flush failed: {}", stream.index, e);
            continue;
        }
        if let Drain::Stop = drain(params, stream, sender) {
            return;
        }
    }
}

/// Forward every frame the decoder has ready, applying the start and end
/// offsets
fn drain(params: &DecoderParameters, stream: &mut OpenStream, sender: &MessageSender) -> Drain {
    loop {
        let message = match stream.receive() {
            Ok(Some(message)) => message,
            Ok(None) => return Drain::Continue,
            Err(DecodeError::Conversion(e)) => {
                warn!("stream {}: skipping frame: {}", stream.index, e);
                continue;
            }
            Err(e) => {
                warn!("stream {}: decode error: {}", stream.index, e);
                return Drain::Continue;
            }
        };

        let pts: Time = message.header.pts;
        if !time::reached(pts, params.start_offset) {
            trace!("stream {}: dropping {} before start", stream.index, pts);
            continue;
        }
        if let Some(end) = params.end_offset {
            if time::past_end(pts, end) {
                debug!("{} stream {} passed end offset", stream.media_type(), stream.index);
                stream.finished = true;
                return Drain::Continue;
            }
        }
        if !sender.send(Ok(message)) {
            return Drain::Stop;
        }
    }
}
