//! Max/min callouts for the rating trend panel.

/// Vertical offset of a callout, as a fraction of the series' value range.
const CALLOUT_OFFSET_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremumKind {
    Max,
    Min,
}

/// A callout pointing from `(index, text_y)` back to `(index, value)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Callout {
    pub kind: ExtremumKind,
    pub index: usize,
    pub value: f64,
    pub text_y: f64,
}

impl Callout {
    pub fn text(&self) -> String {
        format_value(self.value)
    }
}

/// Whole numbers print without a fraction, everything else with one decimal.
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}

/// Locate the first maximum and first minimum and offset their callouts
/// away from the line. Empty for one point or fewer and for a constant
/// series.
pub fn annotate_extrema(values: &[f64]) -> Vec<Callout> {
    if values.len() <= 1 {
        return Vec::new();
    }

    let mut max_idx = 0;
    let mut min_idx = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[max_idx] {
            max_idx = i;
        }
        if v < values[min_idx] {
            min_idx = i;
        }
    }

    let range = values[max_idx] - values[min_idx];
    if range <= 0.0 || !range.is_finite() {
        return Vec::new();
    }
    let offset = range * CALLOUT_OFFSET_FRACTION;

    vec![
        Callout {
            kind: ExtremumKind::Max,
            index: max_idx,
            value: values[max_idx],
            text_y: values[max_idx] + offset,
        },
        Callout {
            kind: ExtremumKind::Min,
            index: min_idx,
            value: values[min_idx],
            text_y: values[min_idx] - offset,
        },
    ]
}
