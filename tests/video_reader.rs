mod common;

use common::{Fixtures, CUES, FRAMES, HEIGHT, SAMPLES, SAMPLE_RATE, WIDTH};
use video_reader::{
    ElementType, FrameBuffer, HostBuffer, MediaType, OutputPixel, SessionError, StreamSpec, Video,
    VideoFormat, VideoOptions,
};

fn pts_seconds(pts: &HostBuffer) -> f32 {
    pts.to_f32().unwrap()[0]
}

#[test]
fn test_decodes_every_frame_in_order() {
    let fixtures = Fixtures::new();
    let mut video = Video::open(fixtures.y4m(), "video").unwrap();

    let mut last = -1.0f32;
    for i in 0..FRAMES {
        let (frame, pts) = video.next("").unwrap().unwrap_or_else(|| panic!("frame {i} missing"));
        assert_eq!(frame.shape(), &[HEIGHT, WIDTH, 3]);
        assert_eq!(frame.element_type(), ElementType::U8);
        assert_eq!(frame.as_bytes().len(), HEIGHT * WIDTH * 3);
        assert_eq!(pts.shape(), &[1]);

        let t = pts_seconds(&pts);
        assert!(t > last, "frame {i} at {t} after {last}");
        last = t;
    }
    assert!(video.next("").unwrap().is_none());
    assert!((last - 299.0 / 30.0).abs() < 1e-3);
}

#[test]
fn test_metadata() {
    let fixtures = Fixtures::new();
    let video = Video::open(fixtures.y4m(), "").unwrap();

    assert_eq!(video.current_stream(), StreamSpec::first(MediaType::Video));
    let fps = video.get_fps("").unwrap();
    assert_eq!(fps.len(), 1);
    assert!((fps[0] - 30.0).abs() < 1e-6);

    let duration = video.get_duration("video").unwrap();
    assert!((duration[0] - 10.0).abs() < 0.05, "duration {}", duration[0]);

    let headers = video.stream_headers();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].media_type(), MediaType::Video);
    assert_eq!(headers[0].index(), 0);
    assert_eq!(headers[0].codec_name, "rawvideo");
}

#[test]
fn test_lookup_of_absent_type() {
    let fixtures = Fixtures::new();
    let mut video = Video::open(fixtures.y4m(), "video").unwrap();

    assert!(matches!(video.get_fps("audio"), Err(SessionError::Lookup(MediaType::Audio))));
    assert!(matches!(
        video.get_duration("cc"),
        Err(SessionError::Lookup(MediaType::ClosedCaption))
    ));
    assert!(matches!(
        video.set_current_stream("subtitle"),
        Err(SessionError::Lookup(MediaType::Subtitle))
    ));
    assert!(matches!(video.get_fps("vid"), Err(SessionError::Parse(_))));

    // the session keeps decoding the first stream
    assert!(video.next("").unwrap().is_some());
}

#[test]
fn test_open_absent_stream_type() {
    let fixtures = Fixtures::new();
    assert!(matches!(
        Video::open(fixtures.y4m(), "audio"),
        Err(SessionError::Lookup(MediaType::Audio))
    ));
}

#[test]
fn test_next_on_other_stream_is_rejected() {
    let fixtures = Fixtures::new();
    let mut video = Video::open(fixtures.y4m(), "video").unwrap();
    assert!(matches!(video.next("audio"), Err(SessionError::StreamMismatch { .. })));
    assert!(video.next("video").unwrap().is_some());
}

#[test]
fn test_seek_lands_on_target() {
    let fixtures = Fixtures::new();
    let mut video = Video::open(fixtures.y4m(), "video").unwrap();

    assert_eq!(video.seek(5.0, "", false).unwrap(), 0);
    let (_, pts) = video.next("").unwrap().unwrap();
    let t = pts_seconds(&pts);
    assert!((4.9997..=5.033).contains(&t), "landed at {t}");

    // decoding continues from there
    let (_, pts) = video.next("").unwrap().unwrap();
    assert!(pts_seconds(&pts) > t);
}

#[test]
fn test_seek_keyframe_mode() {
    let fixtures = Fixtures::new();
    let mut video = Video::open(fixtures.y4m(), "video").unwrap();

    assert_eq!(video.seek(2.5, "video", true).unwrap(), 0);
    let (frame, pts) = video.next("").unwrap().unwrap();
    let t = pts_seconds(&pts);
    assert!((2.4999..=2.5334).contains(&t), "landed at {t}");
    assert_eq!(frame.shape(), &[HEIGHT, WIDTH, 3]);
}

#[test]
fn test_seek_backwards_after_reading() {
    let fixtures = Fixtures::new();
    let mut video = Video::open(fixtures.y4m(), "").unwrap();
    for _ in 0..200 {
        video.next("").unwrap().unwrap();
    }

    assert_eq!(video.seek(1.0, "", false).unwrap(), 0);
    let (_, pts) = video.next("").unwrap().unwrap();
    let t = pts_seconds(&pts);
    assert!((0.9999..=1.0334).contains(&t), "landed at {t}");
}

#[test]
fn test_seek_past_end() {
    let fixtures = Fixtures::new();
    let mut video = Video::open(fixtures.y4m(), "video").unwrap();
    assert_eq!(video.seek(20.0, "", false).unwrap(), 0);
    assert!(video.next("").unwrap().is_none());
}

#[test]
fn test_frames_carry_source_content() {
    let fixtures = Fixtures::new();
    let mut video = Video::open(fixtures.y4m(), "video").unwrap();

    let (first, _) = video.next("").unwrap().unwrap();
    for _ in 1..10 {
        video.next("").unwrap().unwrap();
    }
    let (tenth, _) = video.next("").unwrap().unwrap();

    // flat frames: every pixel of a frame is identical, frames differ
    let bytes = first.as_bytes();
    assert!(bytes.chunks_exact(3).all(|px| px == &bytes[..3]));
    assert_ne!(first.as_bytes()[0], tenth.as_bytes()[0]);
}

#[test]
fn test_resized_output() {
    let fixtures = Fixtures::new();
    let options = VideoOptions {
        video: VideoFormat::new(32, 0),
        ..Default::default()
    };
    let mut video = Video::open_with_options(fixtures.y4m(), "video", options).unwrap();
    let (frame, _) = video.next("").unwrap().unwrap();
    assert_eq!(frame.shape(), &[24, 32, 3]);
}

#[test]
fn test_cropped_gray_output() {
    let fixtures = Fixtures::new();
    let options = VideoOptions {
        video: VideoFormat {
            crop_image: true,
            pixel: OutputPixel::Gray8,
            ..VideoFormat::new(20, 20)
        },
        ..Default::default()
    };
    let mut video = Video::open_with_options(fixtures.y4m(), "video", options).unwrap();
    let (frame, _) = video.next("").unwrap().unwrap();
    assert_eq!(frame.shape(), &[20, 20, 1]);
    assert_eq!(frame.as_bytes().len(), 400);
}

#[test]
fn test_audio_stream() {
    let fixtures = Fixtures::new();
    let mut video = Video::open(fixtures.wav(), "audio").unwrap();

    let fps = video.get_fps("audio").unwrap();
    assert_eq!(fps, &[SAMPLE_RATE as f64]);
    let duration = video.get_duration("").unwrap();
    assert!((duration[0] - 1.0).abs() < 0.01, "duration {}", duration[0]);
    assert!(matches!(video.get_fps("video"), Err(SessionError::Lookup(MediaType::Video))));

    let mut total = 0;
    let mut last = -1.0f32;
    while let Some((samples, pts)) = video.next("").unwrap() {
        assert_eq!(samples.element_type(), ElementType::F32);
        assert_eq!(samples.shape()[1], 1);
        let values = samples.to_f32().unwrap();
        assert!(values.iter().all(|v| (v.abs() - 0.5).abs() < 1e-3));
        total += samples.shape()[0];

        let t = pts_seconds(&pts);
        assert!(t > last);
        last = t;
    }
    assert_eq!(total, SAMPLES);
}

#[test]
fn test_audio_seek() {
    let fixtures = Fixtures::new();
    let mut video = Video::open(fixtures.wav(), "audio").unwrap();
    assert_eq!(video.seek(0.5, "audio", false).unwrap(), 0);

    let (_, pts) = video.next("").unwrap().unwrap();
    let t = pts_seconds(&pts);
    // whole packets are returned, the first one starting at or after the target
    assert!((0.4999..=0.8).contains(&t), "landed at {t}");
}

#[test]
fn test_shutdown_ends_stream() {
    let fixtures = Fixtures::new();
    let mut video = Video::open(fixtures.y4m(), "video").unwrap();
    let handle = video.shutdown_handle().unwrap();

    std::thread::spawn(move || handle.shutdown()).join().unwrap();
    assert!(video.next("").unwrap().is_none());

    video.shutdown();
    video.shutdown();
}

#[test]
fn test_subtitle_stream() {
    let fixtures = Fixtures::new();
    let mut video = Video::open(fixtures.srt(), "subtitle").unwrap();

    let headers = video.stream_headers();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].media_type(), MediaType::Subtitle);
    assert_eq!(headers[0].codec_name, "subrip");
    assert!(matches!(video.get_fps("video"), Err(SessionError::Lookup(MediaType::Video))));

    for (start, text) in CUES {
        let (payload, pts) = video.next("").unwrap().unwrap();
        assert_eq!(payload.element_type(), ElementType::U8);
        assert_eq!(payload.shape(), &[text.len()]);
        assert_eq!(payload.as_bytes(), text.as_bytes());
        assert!((pts_seconds(&pts) as f64 - start).abs() < 1e-3, "cue at {}", pts_seconds(&pts));
    }
    assert!(video.next("").unwrap().is_none());
}
