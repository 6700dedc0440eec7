//! Time representation in microseconds.
//! Every timestamp reported outside the decoder is microseconds (i64);
//! stream time bases are converted on the way in and out.

/// Time in microseconds since stream start
pub type Time = i64;

/// Time constants for conversions
pub mod constants {
    use super::Time;

    pub const MICROS_PER_SECOND: Time = 1_000_000;
    pub const MICROS_PER_MILLI: Time = 1_000;
}

/// Added at range boundaries to absorb rounding error from repeated
/// time base conversions. Small enough to never select the next frame.
pub const JITTER_US: Time = 100;

/// Convert seconds (f64) to microseconds, truncating
#[inline]
pub fn from_seconds(seconds: f64) -> Time {
    (seconds * constants::MICROS_PER_SECOND as f64) as Time
}

/// Convert microseconds to seconds (f64)
#[inline]
pub fn to_seconds(micros: Time) -> f64 {
    micros as f64 / constants::MICROS_PER_SECOND as f64
}

/// Convert milliseconds to microseconds
#[inline]
pub fn from_millis(millis: i64) -> Time {
    millis * constants::MICROS_PER_MILLI
}

/// Convert a timestamp in stream time base units to microseconds.
/// `pts * num / den` seconds, rounded half away from zero.
pub fn stream_to_micros(pts: i64, num: i32, den: i32) -> Time {
    if den == 0 {
        return 0;
    }
    // i128 so that pts * num * 1e6 cannot overflow
    let scaled = pts as i128 * num as i128 * constants::MICROS_PER_SECOND as i128;
    div_round(scaled, den as i128) as Time
}

/// Convert microseconds to stream time base units (reverse of `stream_to_micros`)
pub fn micros_to_stream(micros: Time, num: i32, den: i32) -> i64 {
    if num == 0 {
        return 0;
    }
    let scaled = micros as i128 * den as i128;
    div_round(scaled, num as i128 * constants::MICROS_PER_SECOND as i128) as i64
}

fn div_round(n: i128, d: i128) -> i128 {
    let (n, d) = if d < 0 { (-n, -d) } else { (n, d) };
    if n >= 0 {
        (n + d / 2) / d
    } else {
        -((-n + d / 2) / d)
    }
}

/// True when `pts` reached `target` once jitter is accounted for
#[inline]
pub fn reached(pts: Time, target: Time) -> bool {
    pts.saturating_add(JITTER_US) >= target
}

/// True when `pts` lies past `end` once jitter is accounted for
#[inline]
pub fn past_end(pts: Time, end: Time) -> bool {
    pts > end.saturating_add(JITTER_US)
}

/// Format time as HH:MM:SS.mmm
pub fn format_time(micros: Time) -> String {
    let total_millis = micros / constants::MICROS_PER_MILLI;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis / 60_000) % 60;
    let seconds = (total_millis / 1000) % 60;
    let millis = total_millis % 1000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}
