//! Choice and placement of the numeric labels drawn on change bars.

/// Fraction of a bar's height by which its label is pulled inside the bar.
const INSET_FRACTION: f64 = 0.15;
/// Fraction of the visible y-span kept free at the top and bottom.
const SAFE_MARGIN: f64 = 0.05;
/// Axis padding added around the bar extent, as a fraction of the extent.
const AXIS_PADDING: f64 = 0.05;

const MIN_FONT_PT: f64 = 8.0;
const MAX_FONT_PT: f64 = 14.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAnchor {
    /// The text hangs below its anchor point.
    Top,
    /// The text sits on its anchor point.
    Bottom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarLabel {
    pub index: usize,
    pub value: f64,
    pub text: String,
    pub y: f64,
    pub anchor: VerticalAnchor,
}

/// Label interval for a series of `len` bars under a label budget.
pub fn label_stride(len: usize, max_bar_labels: usize) -> usize {
    if max_bar_labels == 0 {
        return 1;
    }
    (len / max_bar_labels).max(1)
}

/// Visible y-range of the bar panel: the bar extent including zero, padded.
pub fn bar_axis_range(deltas: &[f64]) -> (f64, f64) {
    let (lo, hi) = deltas
        .iter()
        .copied()
        .filter(|d| d.is_finite())
        .fold((0.0f64, 0.0f64), |(lo, hi), d| (lo.min(d), hi.max(d)));
    let span = hi - lo;
    if span <= 0.0 {
        return (-1.0, 1.0);
    }
    (lo - span * AXIS_PADDING, hi + span * AXIS_PADDING)
}

/// Pick the bars to label and where to put each label.
///
/// Bars are visited at a regular stride; a bar whose displayed value was
/// already used by an earlier label is skipped. Series of length 0 or 1 get
/// no labels.
pub fn declutter(deltas: &[f64], max_bar_labels: usize, y_range: (f64, f64)) -> Vec<BarLabel> {
    if deltas.len() <= 1 || max_bar_labels == 0 {
        return Vec::new();
    }

    let stride = label_stride(deltas.len(), max_bar_labels);
    let mut seen: Vec<String> = Vec::new();
    let mut labels = Vec::new();

    for (index, &value) in deltas.iter().enumerate().step_by(stride) {
        let text = format!("{:.1}", value);
        if seen.contains(&text) {
            continue;
        }

        let (y, anchor) = if value > 0.0 {
            (value - value.abs() * INSET_FRACTION, VerticalAnchor::Top)
        } else {
            (value + value.abs() * INSET_FRACTION, VerticalAnchor::Bottom)
        };

        labels.push(BarLabel {
            index,
            value,
            text: text.clone(),
            y: clamp_to_safe_band(y, y_range),
            anchor,
        });
        seen.push(text);
    }

    tracing::debug!(stride, placed = labels.len(), "bar labels placed");
    labels
}

fn clamp_to_safe_band(y: f64, (y_min, y_max): (f64, f64)) -> f64 {
    if y_min == y_max {
        return y;
    }
    let margin = SAFE_MARGIN * (y_max - y_min);
    y.clamp(y_min + margin, y_max - margin)
}

/// Label font size in points: shrinks with series length, grows with
/// figure width, bounded to `[8, 14]`.
pub fn label_font_size(len: usize, figure_width_in: f64) -> f64 {
    if len == 0 {
        return MAX_FONT_PT;
    }
    (72.0 * figure_width_in / (len as f64 * 0.6)).clamp(MIN_FONT_PT, MAX_FONT_PT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_from_budget() {
        assert_eq!(label_stride(23, 5), 4);
        assert_eq!(label_stride(3, 15), 1);
        assert_eq!(label_stride(100, 15), 6);
    }

    #[test]
    fn test_labels_at_regular_stride() {
        let deltas: Vec<f64> = (0..23).map(|i| i as f64).collect();
        let labels = declutter(&deltas, 5, bar_axis_range(&deltas));
        let indices: Vec<usize> = labels.iter().map(|l| l.index).collect();
        assert_eq!(indices, vec![0, 4, 8, 12, 16, 20]);
    }

    #[test]
    fn test_repeated_values_are_not_relabeled() {
        let deltas = [0.0, 5.0, 5.0, 5.0, -3.0, 5.0];
        let labels = declutter(&deltas, 10, bar_axis_range(&deltas));
        let texts: Vec<&str> = labels.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["0.0", "5.0", "-3.0"]);
        assert!(labels.windows(2).all(|w| w[0].text != w[1].text));
    }

    #[test]
    fn test_short_series_has_no_labels() {
        assert!(declutter(&[], 15, (-1.0, 1.0)).is_empty());
        assert!(declutter(&[0.0], 15, (-1.0, 1.0)).is_empty());
        assert!(declutter(&[0.0, 3.0], 0, (-1.0, 1.0)).is_empty());
    }

    #[test]
    fn test_anchor_follows_sign() {
        let deltas = [0.0, 40.0, -40.0];
        let labels = declutter(&deltas, 10, bar_axis_range(&deltas));
        assert_eq!(labels[1].anchor, VerticalAnchor::Top);
        assert!((labels[1].y - 34.0).abs() < 1e-9);
        assert_eq!(labels[2].anchor, VerticalAnchor::Bottom);
        assert!((labels[2].y + 34.0).abs() < 1e-9);
    }

    #[test]
    fn test_label_clamped_into_safe_band() {
        let labels = declutter(&[0.0, 100.0], 10, (0.0, 50.0));
        assert!((labels[1].y - 47.5).abs() < 1e-9);
        let labels = declutter(&[0.0, 1.0], 10, (0.0, 100.0));
        assert!((labels[1].y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_axis_range_includes_zero() {
        assert_eq!(bar_axis_range(&[10.0, 20.0]), (-1.0, 21.0));
        assert_eq!(bar_axis_range(&[0.0, 0.0]), (-1.0, 1.0));
    }

    #[test]
    fn test_font_size_bounds() {
        assert_eq!(label_font_size(1000, 18.0), 8.0);
        assert_eq!(label_font_size(5, 18.0), 14.0);
        let mid = label_font_size(200, 18.0);
        assert!((mid - 10.8).abs() < 1e-9);
    }
}
