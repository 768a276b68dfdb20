//! Bitrate parsing with explicit fallbacks.
//!
//! Bitrates travel as ffmpeg-style strings (`800k`, `1.5M`, `2500000`). Every
//! conversion to a number goes through [`parse_bitrate`], and every place that
//! needs a number no matter what goes through one of the documented fallback
//! chains below.

/// Bitrate assumed for a source when neither the stream nor the container reports one.
pub const DEFAULT_SOURCE_BITRATE_BPS: u64 = 5_000_000;

/// Bandwidth advertised for a rendition whose target bitrate cannot be parsed.
pub const DEFAULT_BANDWIDTH_BPS: u64 = 128_000;

/// Parses an ffmpeg-style bitrate into bits per second.
///
/// Accepts a plain number or a number with a `k`, `m` or `g` suffix
/// (case-insensitive, optionally followed by `bps`). Returns `None` for
/// anything unparseable, non-finite or not strictly positive.
pub fn parse_bitrate(value: &str) -> Option<u64> {
    let value = value.trim().to_ascii_lowercase();
    let value = value.strip_suffix("bps").unwrap_or(&value);

    let (number, multiplier) = match value.chars().last()? {
        'k' => (&value[..value.len() - 1], 1_000.0),
        'm' => (&value[..value.len() - 1], 1_000_000.0),
        'g' => (&value[..value.len() - 1], 1_000_000_000.0),
        _ => (value, 1.0),
    };

    let parsed: f64 = number.trim().parse().ok()?;
    let bps = parsed * multiplier;
    if !bps.is_finite() || bps < 1.0 {
        return None;
    }
    Some(bps.round() as u64)
}

/// Resolves a source bitrate: stream bitrate, then container bitrate, then
/// [`DEFAULT_SOURCE_BITRATE_BPS`]. Never fails.
pub fn resolve_source_bitrate(stream: Option<&str>, container: Option<&str>) -> u64 {
    stream
        .and_then(parse_bitrate)
        .or_else(|| container.and_then(parse_bitrate))
        .unwrap_or(DEFAULT_SOURCE_BITRATE_BPS)
}

/// Bandwidth to advertise for a target bitrate, floored at
/// [`DEFAULT_BANDWIDTH_BPS`] when the target cannot be parsed. Never zero.
pub fn bandwidth_for(target_bitrate: &str) -> u64 {
    parse_bitrate(target_bitrate).unwrap_or(DEFAULT_BANDWIDTH_BPS)
}
