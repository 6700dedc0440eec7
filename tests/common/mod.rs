//! Generated media fixtures shared by the integration tests.

#![allow(dead_code)]

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 48;
pub const FPS: usize = 30;
pub const FRAMES: usize = 300;

pub const SAMPLE_RATE: u32 = 16_000;
pub const SAMPLES: usize = 16_000;

/// Route library logs through the test harness; `RUST_LOG` picks the level
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A temporary directory holding the fixtures, removed on drop
pub struct Fixtures {
    dir: TempDir,
}

impl Fixtures {
    pub fn new() -> Self {
        init_logging();
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// 10 s of 64x48 4:2:0 video at 30 fps, every frame a flat grey level
    pub fn y4m(&self) -> PathBuf {
        let path = self.path("clip.y4m");
        write_y4m(&path, FRAMES).expect("write y4m");
        path
    }

    /// 1 s of 16 kHz mono 16-bit PCM
    pub fn wav(&self) -> PathBuf {
        let path = self.path("tone.wav");
        write_wav(&path, SAMPLE_RATE, SAMPLES).expect("write wav");
        path
    }

    /// SubRip file with the cues in [`CUES`], each shown for one second
    pub fn srt(&self) -> PathBuf {
        let path = self.path("captions.srt");
        write_srt(&path).expect("write srt");
        path
    }
}

/// Cues of the subtitle fixture: start (s) and text
pub const CUES: [(f64, &str); 2] = [(1.0, "Hello world"), (2.5, "Second cue")];

/// Luma level of frame `index`
pub fn luma(index: usize) -> u8 {
    (16 + (index * 7) % 220) as u8
}

pub fn write_y4m(path: &Path, frames: usize) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "YUV4MPEG2 W{WIDTH} H{HEIGHT} F{FPS}:1 Ip A1:1 C420jpeg\n")?;
    let chroma = vec![128u8; (WIDTH / 2) * (HEIGHT / 2) * 2];
    for i in 0..frames {
        out.write_all(b"FRAME\n")?;
        out.write_all(&vec![luma(i); WIDTH * HEIGHT])?;
        out.write_all(&chroma)?;
    }
    out.flush()
}

pub fn write_wav(path: &Path, rate: u32, samples: usize) -> std::io::Result<()> {
    let data_len = (samples * 2) as u32;
    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(b"RIFF")?;
    out.write_all(&(36 + data_len).to_le_bytes())?;
    out.write_all(b"WAVEfmt ")?;
    out.write_all(&16u32.to_le_bytes())?;
    out.write_all(&1u16.to_le_bytes())?; // PCM
    out.write_all(&1u16.to_le_bytes())?; // mono
    out.write_all(&rate.to_le_bytes())?;
    out.write_all(&(rate * 2).to_le_bytes())?;
    out.write_all(&2u16.to_le_bytes())?;
    out.write_all(&16u16.to_le_bytes())?;
    out.write_all(b"data")?;
    out.write_all(&data_len.to_le_bytes())?;
    for i in 0..samples {
        // 500 Hz square wave at half scale
        let value: i16 = if (i / 16) % 2 == 0 { 16384 } else { -16384 };
        out.write_all(&value.to_le_bytes())?;
    }
    out.flush()
}

fn srt_time(seconds: f64) -> String {
    let millis = (seconds * 1000.0).round() as u64;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        millis / 3_600_000,
        (millis / 60_000) % 60,
        (millis / 1000) % 60,
        millis % 1000
    )
}

pub fn write_srt(path: &Path) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for (i, (start, text)) in CUES.iter().enumerate() {
        write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            srt_time(*start),
            srt_time(start + 1.0),
            text
        )?;
    }
    out.flush()
}
