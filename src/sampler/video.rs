//! Video sampler: pixel format conversion, scaling and centre cropping.
//!
//! Plain format/size changes go through one scaling context. Cropping is a
//! second stage: the first context scales the source (aspect preserved) to
//! cover the target, the second one converts the centred sub-rectangle.

use ffmpeg_next::ffi;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};
use tracing::debug;

use crate::core::format::{OutputPixel, VideoFormat};
use crate::core::media::MediaType;
use crate::sampler::geometry;
use crate::sampler::{ConversionError, MediaSampler};

/// Geometry of a decoded video frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoInput {
    pub pixel: Pixel,
    pub width: u32,
    pub height: u32,
}

impl VideoInput {
    pub fn of(frame: &VideoFrame) -> Self {
        Self {
            pixel: frame.format(),
            width: frame.width(),
            height: frame.height(),
        }
    }
}

pub fn to_ffmpeg_pixel(pixel: OutputPixel) -> Pixel {
    match pixel {
        OutputPixel::Rgb24 => Pixel::RGB24,
        OutputPixel::Gray8 => Pixel::GRAY8,
    }
}

struct CropStage {
    context: ScalingContext,
    frame: VideoFrame,
    offset: (u32, u32),
}

struct Configured {
    input: VideoInput,
    requested: VideoFormat,
    output: VideoFormat,
    scale: ScalingContext,
    scaled: VideoFrame,
    crop: Option<CropStage>,
}

pub struct VideoSampler {
    requested: VideoFormat,
    flags: ScalingFlags,
    configured: Option<Configured>,
    contexts_built: usize,
}

impl VideoSampler {
    pub fn new(requested: VideoFormat) -> Self {
        Self::with_flags(requested, ScalingFlags::AREA)
    }

    pub fn with_flags(requested: VideoFormat, flags: ScalingFlags) -> Self {
        Self {
            requested,
            flags,
            configured: None,
            contexts_built: 0,
        }
    }

    /// Requested (unresolved) output format
    pub fn requested(&self) -> &VideoFormat {
        &self.requested
    }

    fn build(&mut self, input: VideoInput, requested: VideoFormat) -> Result<Configured, ConversionError> {
        let (width, height) = geometry::output_dimensions(&requested, input.width, input.height);
        if width == 0 || height == 0 {
            return Err(ConversionError::ZeroArea { width, height });
        }
        let output = VideoFormat {
            width,
            height,
            min_dimension: 0,
            max_dimension: 0,
            ..requested
        };
        let pixel = to_ffmpeg_pixel(requested.pixel);

        if !requested.crop_image {
            let scale = ScalingContext::get(
                input.pixel,
                input.width,
                input.height,
                pixel,
                width,
                height,
                self.flags,
            )?;
            self.contexts_built += 1;
            return Ok(Configured {
                input,
                requested,
                output,
                scale,
                scaled: VideoFrame::new(pixel, width, height),
                crop: None,
            });
        }

        let (cover_w, cover_h) = geometry::cover_dimensions(input.width, input.height, width, height);
        let scale = ScalingContext::get(
            input.pixel,
            input.width,
            input.height,
            pixel,
            cover_w,
            cover_h,
            self.flags,
        )?;
        let context = ScalingContext::get(pixel, width, height, pixel, width, height, self.flags)?;
        self.contexts_built += 2;

        Ok(Configured {
            input,
            requested,
            output,
            scale,
            scaled: VideoFrame::new(pixel, cover_w, cover_h),
            crop: Some(CropStage {
                context,
                frame: VideoFrame::new(pixel, width, height),
                offset: geometry::centre_offset(cover_w, cover_h, width, height),
            }),
        })
    }
}

impl MediaSampler for VideoSampler {
    type Frame = VideoFrame;
    type Input = VideoInput;
    type Output = VideoFormat;

    fn media_type(&self) -> MediaType {
        MediaType::Video
    }

    fn configure(&mut self, input: VideoInput, output: VideoFormat) -> Result<bool, ConversionError> {
        if let Some(c) = &self.configured {
            if c.input == input && c.requested == output {
                return Ok(false);
            }
        }
        if input.width == 0 || input.height == 0 {
            return Err(ConversionError::ZeroArea {
                width: input.width,
                height: input.height,
            });
        }

        // old contexts go before new ones are allocated
        self.configured = None;
        let configured = self.build(input, output)?;
        debug!(
            "video sampler: {:?} {}x{} -> {:?} {}x{} (crop: {})",
            input.pixel,
            input.width,
            input.height,
            configured.output.pixel,
            configured.output.width,
            configured.output.height,
            configured.output.crop_image
        );
        self.requested = output;
        self.configured = Some(configured);
        Ok(true)
    }

    fn sample(&mut self, frame: &VideoFrame, out: &mut Vec<u8>) -> Result<usize, ConversionError> {
        out.clear();
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(0);
        }
        self.configure(VideoInput::of(frame), self.requested)?;
        let Some(Configured {
            output,
            scale,
            scaled,
            crop,
            ..
        }) = self.configured.as_mut()
        else {
            return Ok(0);
        };

        scale.run(frame, scaled)?;
        let result = match crop {
            None => &*scaled,
            Some(stage) => {
                run_crop(scaled, stage, output.pixel.channels())?;
                &stage.frame
            }
        };

        Ok(copy_packed(result, output, out))
    }

    fn output_format(&self) -> Option<VideoFormat> {
        self.configured.as_ref().map(|c| c.output)
    }

    fn contexts_built(&self) -> usize {
        self.contexts_built
    }

    fn shutdown(&mut self) {
        self.configured = None;
    }
}

/// Convert the centred window of `src` into `stage.frame`
fn run_crop(src: &VideoFrame, stage: &mut CropStage, channels: usize) -> Result<(), ConversionError> {
    let (x, y) = stage.offset;
    let stride = src.stride(0);
    let offset = y as usize * stride + x as usize * channels;
    let plane = src.data(0);

    let null = std::ptr::null();
    let mut src_planes: [*const u8; 4] = [plane[offset..].as_ptr(), null, null, null];
    let src_strides: [i32; 4] = [stride as i32, 0, 0, 0];
    let height = stage.frame.height() as i32;

    let ret = unsafe {
        let dst = stage.frame.as_mut_ptr();
        ffi::sws_scale(
            stage.context.as_mut_ptr(),
            src_planes.as_mut_ptr(),
            src_strides.as_ptr(),
            0,
            height,
            (*dst).data.as_mut_ptr(),
            (*dst).linesize.as_mut_ptr(),
        )
    };
    if ret < 0 {
        return Err(ConversionError::FFmpeg(ffmpeg_next::Error::from(ret)));
    }
    Ok(())
}

/// Copy a packed single-plane frame into `out` without row padding
fn copy_packed(frame: &VideoFrame, format: &VideoFormat, out: &mut Vec<u8>) -> usize {
    let row = format.width as usize * format.pixel.channels();
    let stride = frame.stride(0);
    let data = frame.data(0);

    out.reserve(format.frame_bytes());
    for y in 0..format.height as usize {
        let start = y * stride;
        out.extend_from_slice(&data[start..start + row]);
    }
    out.len()
}
