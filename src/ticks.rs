//! Date tick subsampling for the shared x-axis.

pub const DEFAULT_MAX_TICKS: usize = 10;

/// At most `max_ticks` evenly spaced indices over `[0, len - 1]`.
///
/// Positions come from a linear interpolation across the index range,
/// rounded to the nearest index; duplicates collapse. Series of length 0 or
/// 1 produce no ticks.
pub fn sample_ticks(len: usize, max_ticks: usize) -> Vec<usize> {
    if len <= 1 || max_ticks == 0 {
        return Vec::new();
    }
    let count = len.min(max_ticks);
    if count == 1 {
        return vec![0];
    }

    let last = (len - 1) as f64;
    let step = last / (count - 1) as f64;
    let mut ticks: Vec<usize> = (0..count)
        .map(|i| ((i as f64 * step).round() as usize).min(len - 1))
        .collect();
    ticks.dedup();
    ticks
}
