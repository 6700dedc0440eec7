//! Audio sampler: sample format, rate and channel count conversion into
//! packed (interleaved) output.
//! The swresample context is driven through the raw API; it is owned by
//! [`Resampler`] and freed on drop.

use std::ptr;

use ffmpeg_next::ffi;
use ffmpeg_next::format::Sample;
use ffmpeg_next::frame::Audio as AudioFrame;
use tracing::debug;

use crate::core::format::{AudioFormat, OutputSample};
use crate::core::media::MediaType;
use crate::sampler::{ConversionError, MediaSampler};

/// Geometry of a decoded audio frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInput {
    pub sample: Sample,
    pub rate: u32,
    pub channels: u16,
}

impl AudioInput {
    pub fn of(frame: &AudioFrame) -> Self {
        Self {
            sample: frame.format(),
            rate: frame.rate(),
            channels: frame.channels(),
        }
    }
}

fn to_ffmpeg_sample(sample: OutputSample) -> ffi::AVSampleFormat {
    match sample {
        OutputSample::F32 => ffi::AVSampleFormat::AV_SAMPLE_FMT_FLT,
        OutputSample::I16 => ffi::AVSampleFormat::AV_SAMPLE_FMT_S16,
    }
}

/// Owned `AVChannelLayout`
struct Layout(ffi::AVChannelLayout);

impl Layout {
    fn default_for(channels: u16) -> Self {
        unsafe {
            let mut layout: ffi::AVChannelLayout = std::mem::zeroed();
            ffi::av_channel_layout_default(&mut layout, channels as i32);
            Layout(layout)
        }
    }

    /// Layout of `frame`, falling back to the default order for its channel count
    fn of(frame: &AudioFrame) -> Self {
        unsafe {
            let src = &(*frame.as_ptr()).ch_layout;
            if src.order == ffi::AVChannelOrder::AV_CHANNEL_ORDER_UNSPEC {
                return Layout::default_for(src.nb_channels.max(0) as u16);
            }
            let mut layout: ffi::AVChannelLayout = std::mem::zeroed();
            if ffi::av_channel_layout_copy(&mut layout, src) < 0 {
                return Layout::default_for(src.nb_channels.max(0) as u16);
            }
            Layout(layout)
        }
    }
}

impl Drop for Layout {
    fn drop(&mut self) {
        unsafe { ffi::av_channel_layout_uninit(&mut self.0) }
    }
}

struct Resampler {
    ptr: *mut ffi::SwrContext,
}

impl Resampler {
    fn new(input: AudioInput, in_layout: &Layout, output: AudioFormat) -> Result<Self, ConversionError> {
        let out_layout = Layout::default_for(output.channels);
        let mut ptr: *mut ffi::SwrContext = ptr::null_mut();

        unsafe {
            let ret = ffi::swr_alloc_set_opts2(
                &mut ptr,
                &out_layout.0,
                to_ffmpeg_sample(output.sample),
                output.sample_rate as i32,
                &in_layout.0,
                ffi::AVSampleFormat::from(input.sample),
                input.rate as i32,
                0,
                ptr::null_mut(),
            );
            if ret < 0 {
                ffi::swr_free(&mut ptr);
                return Err(ConversionError::Resampler(ret));
            }

            let ret = ffi::swr_init(ptr);
            if ret < 0 {
                ffi::swr_free(&mut ptr);
                return Err(ConversionError::Resampler(ret));
            }
        }

        Ok(Self { ptr })
    }

    /// Convert `in_samples` samples from `planes` (null to drain) into `out`
    fn convert(
        &mut self,
        planes: *mut *const u8,
        in_samples: usize,
        output: &AudioFormat,
        out: &mut Vec<u8>,
    ) -> Result<usize, ConversionError> {
        let max_out = unsafe { ffi::swr_get_out_samples(self.ptr, in_samples as i32) };
        if max_out < 0 {
            return Err(ConversionError::Resampler(max_out));
        }
        if max_out == 0 {
            return Ok(0);
        }

        out.resize(output.bytes_for(max_out as usize), 0);
        let mut out_planes: [*mut u8; 1] = [out.as_mut_ptr()];
        let converted = unsafe {
            ffi::swr_convert(
                self.ptr,
                out_planes.as_mut_ptr(),
                max_out,
                planes,
                in_samples as i32,
            )
        };
        if converted < 0 {
            out.clear();
            return Err(ConversionError::Resampler(converted));
        }

        out.truncate(output.bytes_for(converted as usize));
        Ok(out.len())
    }
}

impl Drop for Resampler {
    fn drop(&mut self) {
        unsafe { ffi::swr_free(&mut self.ptr) }
    }
}

struct Configured {
    input: AudioInput,
    requested: AudioFormat,
    output: AudioFormat,
    resampler: Resampler,
}

pub struct AudioSampler {
    requested: AudioFormat,
    configured: Option<Configured>,
    contexts_built: usize,
}

impl AudioSampler {
    pub fn new(requested: AudioFormat) -> Self {
        Self {
            requested,
            configured: None,
            contexts_built: 0,
        }
    }

    pub fn requested(&self) -> &AudioFormat {
        &self.requested
    }

    fn configure_layout(
        &mut self,
        input: AudioInput,
        requested: AudioFormat,
        layout: &Layout,
    ) -> Result<bool, ConversionError> {
        if let Some(c) = &self.configured {
            if c.input == input && c.requested == requested {
                return Ok(false);
            }
        }
        if input.channels == 0 || input.rate == 0 {
            return Err(ConversionError::InvalidAudio(format!(
                "{} channels at {} Hz",
                input.channels, input.rate
            )));
        }

        let output = AudioFormat {
            sample_rate: if requested.sample_rate == 0 { input.rate } else { requested.sample_rate },
            channels: if requested.channels == 0 { input.channels } else { requested.channels },
            sample: requested.sample,
        };

        self.configured = None;
        let resampler = Resampler::new(input, layout, output)?;
        self.contexts_built += 1;
        debug!(
            "audio sampler: {:?} {} Hz x{} -> {:?} {} Hz x{}",
            input.sample, input.rate, input.channels, output.sample, output.sample_rate, output.channels
        );

        self.requested = requested;
        self.configured = Some(Configured {
            input,
            requested,
            output,
            resampler,
        });
        Ok(true)
    }

    /// Drain samples still buffered in the resampler
    pub fn flush(&mut self, out: &mut Vec<u8>) -> Result<usize, ConversionError> {
        out.clear();
        match self.configured.as_mut() {
            Some(c) => c.resampler.convert(ptr::null_mut(), 0, &c.output, out),
            None => Ok(0),
        }
    }
}

impl MediaSampler for AudioSampler {
    type Frame = AudioFrame;
    type Input = AudioInput;
    type Output = AudioFormat;

    fn media_type(&self) -> MediaType {
        MediaType::Audio
    }

    fn configure(&mut self, input: AudioInput, output: AudioFormat) -> Result<bool, ConversionError> {
        let layout = Layout::default_for(input.channels);
        self.configure_layout(input, output, &layout)
    }

    fn sample(&mut self, frame: &AudioFrame, out: &mut Vec<u8>) -> Result<usize, ConversionError> {
        out.clear();
        if frame.samples() == 0 || frame.channels() == 0 {
            return Ok(0);
        }

        let layout = Layout::of(frame);
        self.configure_layout(AudioInput::of(frame), self.requested, &layout)?;
        let Some(c) = self.configured.as_mut() else {
            return Ok(0);
        };

        let planes = unsafe { (*frame.as_ptr()).extended_data as *mut *const u8 };
        c.resampler.convert(planes, frame.samples(), &c.output, out)
    }

    fn output_format(&self) -> Option<AudioFormat> {
        self.configured.as_ref().map(|c| c.output)
    }

    fn contexts_built(&self) -> usize {
        self.contexts_built
    }

    fn shutdown(&mut self) {
        self.configured = None;
    }
}
