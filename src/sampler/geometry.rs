//! Output size resolution for the video sampler.

use crate::core::format::VideoFormat;

/// Round half up, the way pixel sizes are derived from aspect ratios
fn round_div(num: u64, den: u64) -> u32 {
    ((num as f64 / den as f64) + 0.5) as u32
}

/// Resolve the output width and height for a `src_w x src_h` source.
///
/// Rules, in order:
/// - both `width` and `height` set: used as is
/// - one of them set: the other follows the source aspect ratio
/// - neither set, `min_dimension` and/or `max_dimension` set: the shorter
///   (resp. longer) side is pinned and the other follows the aspect ratio;
///   both set pins both sides
/// - nothing set: source size
///
/// The result is never smaller than 1x1 unless the source itself is empty.
pub fn output_dimensions(format: &VideoFormat, src_w: u32, src_h: u32) -> (u32, u32) {
    if src_w == 0 || src_h == 0 {
        return (0, 0);
    }
    let (sw, sh) = (src_w as u64, src_h as u64);
    let landscape = src_w > src_h;

    let (w, h) = match (format.width, format.height) {
        (0, 0) => match (format.min_dimension, format.max_dimension) {
            (0, 0) => (src_w, src_h),
            (min, 0) => {
                if landscape {
                    (round_div(sw * min as u64, sh), min)
                } else {
                    (min, round_div(sh * min as u64, sw))
                }
            }
            (0, max) => {
                if landscape {
                    (max, round_div(sh * max as u64, sw))
                } else {
                    (round_div(sw * max as u64, sh), max)
                }
            }
            (min, max) => {
                if landscape {
                    (max, min)
                } else {
                    (min, max)
                }
            }
        },
        (w, 0) => (w, round_div(sh * w as u64, sw)),
        (0, h) => (round_div(sw * h as u64, sh), h),
        (w, h) => (w, h),
    };

    (w.max(1), h.max(1))
}

/// Intermediate size for crop sampling: the source scaled, aspect preserved,
/// so that it covers `out_w x out_h` on both axes.
pub fn cover_dimensions(src_w: u32, src_h: u32, out_w: u32, out_h: u32) -> (u32, u32) {
    let (sw, sh) = (src_w as u64, src_h as u64);
    let (ow, oh) = (out_w as u64, out_h as u64);
    // compare ow/sw against oh/sh without floats
    if ow * sh >= oh * sw {
        (out_w, round_div(sh * ow, sw).max(out_h))
    } else {
        (round_div(sw * oh, sh).max(out_w), out_h)
    }
}

/// Top-left corner of a centred `out_w x out_h` window inside `w x h`
pub fn centre_offset(w: u32, h: u32, out_w: u32, out_h: u32) -> (u32, u32) {
    ((w.saturating_sub(out_w)) / 2, (h.saturating_sub(out_h)) / 2)
}
