mod common;

use std::thread;
use std::time::Duration;

use common::{Fixtures, HEIGHT, WIDTH};
use video_reader::core::format::FormatDetail;
use video_reader::{
    DecodeError, DecoderCore, DecoderParameters, DecoderState, MediaType, StreamSpec, VideoFormat,
    AudioFormat,
};

fn video_params(fixtures: &Fixtures) -> DecoderParameters {
    DecoderParameters::new(fixtures.y4m()).with_stream(
        StreamSpec::first(MediaType::Video),
        VideoFormat::default(),
        AudioFormat::default(),
    )
}

#[test]
fn test_header_only_reports_streams() {
    let fixtures = Fixtures::new();
    let mut core = DecoderCore::new();
    let params = DecoderParameters::new(fixtures.y4m())
        .with_all_streams()
        .with_header_only(true);

    let headers = core.init(params).unwrap();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].format.stream, 0);
    assert_eq!(headers[0].time_base_num, 1);
    assert_eq!(headers[0].time_base_den, 30);
    assert_eq!(core.state(), DecoderState::Ready);

    // nothing is decoded in header-only mode
    assert!(core.decode(1_000).unwrap().is_none());
}

#[test]
fn test_messages_match_header_geometry() {
    let fixtures = Fixtures::new();
    let mut core = DecoderCore::new();
    core.init(video_params(&fixtures)).unwrap();

    let message = core.decode(5_000).unwrap().unwrap();
    assert_eq!(core.state(), DecoderState::Decoding);
    assert_eq!(message.header.pts, 0);
    assert!(message.header.key_frame);
    match message.header.format.detail {
        FormatDetail::Video(v) => {
            assert_eq!((v.width, v.height), (WIDTH as u32, HEIGHT as u32));
        }
        other => panic!("unexpected format {other:?}"),
    }
    assert_eq!(
        message.header.expected_bytes(message.payload.len()),
        message.payload.len()
    );
    assert_eq!(message.payload.len(), WIDTH * HEIGHT * 3);
}

#[test]
fn test_end_offset_stops_stream() {
    let fixtures = Fixtures::new();
    let mut core = DecoderCore::new();
    core.init(video_params(&fixtures).with_end_offset(Some(1_000_000)))
        .unwrap();

    let mut count = 0;
    let mut last = -1;
    while let Some(message) = core.decode(5_000).unwrap() {
        assert!(message.header.pts > last);
        last = message.header.pts;
        count += 1;
    }
    // frames 0..=30, the last one exactly at 1 s
    assert_eq!(count, 31);
    assert_eq!(last, 1_000_000);
}

#[test]
fn test_seek_restarts_worker() {
    let fixtures = Fixtures::new();
    let mut core = DecoderCore::new();
    core.init(video_params(&fixtures)).unwrap();
    core.decode(5_000).unwrap().unwrap();

    core.seek(3_000_000).unwrap();
    assert_eq!(core.params().unwrap().start_offset, 3_000_000);
    let message = core.decode(5_000).unwrap().unwrap();
    assert!(message.header.pts + 100 >= 3_000_000);
    assert!(message.header.pts < 3_000_000 + 33_334);
}

#[test]
fn test_small_channel_preserves_order() {
    let fixtures = Fixtures::new();
    let mut core = DecoderCore::new();
    core.init(video_params(&fixtures).with_channel_capacity(1))
        .unwrap();

    let mut expected = 0i64;
    for _ in 0..60 {
        let message = core.decode(5_000).unwrap().unwrap();
        let frame = (message.header.pts as f64 * 30.0 / 1e6).round() as i64;
        assert_eq!(frame, expected);
        expected += 1;
    }
}

#[test]
fn test_shutdown_from_another_thread() {
    let fixtures = Fixtures::new();
    let mut core = DecoderCore::new();
    core.init(video_params(&fixtures).with_channel_capacity(1))
        .unwrap();
    let handle = core.shutdown_handle().unwrap();

    // let the worker fill the channel and block on it
    thread::sleep(Duration::from_millis(50));
    let canceller = thread::spawn(move || handle.shutdown());
    canceller.join().unwrap();

    assert!(core.decode(60_000).unwrap().is_none());
    core.shutdown();
    assert!(core.state().is_shutdown());
    assert!(matches!(core.decode(10), Err(DecodeError::NotInitialized)));
}

#[test]
fn test_reinit_after_shutdown() {
    let fixtures = Fixtures::new();
    let mut core = DecoderCore::new();
    core.init(video_params(&fixtures)).unwrap();
    core.shutdown();

    core.init(video_params(&fixtures)).unwrap();
    assert!(core.state().is_ready());
    assert!(core.decode(5_000).unwrap().is_some());
}

#[test]
fn test_explicit_missing_stream() {
    let fixtures = Fixtures::new();
    let mut core = DecoderCore::new();
    let params = DecoderParameters::new(fixtures.y4m()).with_stream(
        StreamSpec::new(MediaType::Video, 3),
        VideoFormat::default(),
        AudioFormat::default(),
    );
    assert!(matches!(core.init(params), Err(DecodeError::InvalidStreamIndex(3))));

    let params = DecoderParameters::new(fixtures.y4m()).with_stream(
        StreamSpec::first(MediaType::Audio),
        VideoFormat::default(),
        AudioFormat::default(),
    );
    assert!(matches!(core.init(params), Err(DecodeError::NoMatchingStream(_))));
}

#[cfg(unix)]
#[test]
fn test_init_times_out_on_stalled_source() {
    use std::fs::OpenOptions;
    use std::process::Command;
    use std::time::Instant;

    let fixtures = Fixtures::new();
    let fifo = fixtures.path("stalled.y4m");
    let created = Command::new("mkfifo").arg(&fifo).status();
    if !created.is_ok_and(|s| s.success()) {
        eprintln!("mkfifo unavailable, skipping");
        return;
    }

    let mut core = DecoderCore::new();
    let params = DecoderParameters::new(&fifo)
        .with_all_streams()
        .with_timeout_ms(200);
    let started = Instant::now();
    let result = core.init(params);
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(DecodeError::Timeout(200))), "{result:?}");
    assert!(elapsed < Duration::from_secs(2), "init took {elapsed:?}");
    assert_eq!(core.state(), DecoderState::Uninitialized);
    assert!(core.shutdown_handle().is_none());

    // open the writer side so the detached worker wakes up and exits
    drop(OpenOptions::new().write(true).open(&fifo));
}
