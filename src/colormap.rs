//! Diverging colormaps and the mode-anchored normalization used to color
//! rating changes.

use plotters::style::RGBColor;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::stats;

const RD_YL_GN: &[(u8, u8, u8)] = &[
    (165, 0, 38),
    (215, 48, 39),
    (244, 109, 67),
    (253, 174, 97),
    (254, 224, 139),
    (255, 255, 191),
    (217, 239, 139),
    (166, 217, 106),
    (102, 189, 99),
    (26, 152, 80),
    (0, 104, 55),
];

const RD_BU_R: &[(u8, u8, u8)] = &[
    (5, 48, 97),
    (33, 102, 172),
    (67, 147, 195),
    (146, 197, 222),
    (209, 229, 240),
    (247, 247, 247),
    (253, 219, 199),
    (244, 165, 130),
    (214, 96, 77),
    (178, 24, 43),
    (103, 0, 31),
];

const COOLWARM: &[(u8, u8, u8)] = &[
    (59, 76, 192),
    (98, 130, 234),
    (141, 176, 254),
    (184, 208, 249),
    (221, 221, 221),
    (245, 196, 173),
    (244, 154, 123),
    (222, 96, 77),
    (180, 4, 38),
];

const VIRIDIS: &[(u8, u8, u8)] = &[
    (68, 1, 84),
    (72, 40, 120),
    (62, 74, 137),
    (49, 104, 142),
    (38, 130, 142),
    (31, 158, 137),
    (53, 183, 121),
    (109, 205, 89),
    (180, 222, 44),
    (253, 231, 37),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Colormap {
    RdYlGn,
    RdBuR,
    Coolwarm,
    Viridis,
}

impl Colormap {
    fn stops(self) -> &'static [(u8, u8, u8)] {
        match self {
            Colormap::RdYlGn => RD_YL_GN,
            Colormap::RdBuR => RD_BU_R,
            Colormap::Coolwarm => COOLWARM,
            Colormap::Viridis => VIRIDIS,
        }
    }

    /// Color at position `t` in `[0, 1]`; out-of-range input saturates.
    pub fn color_at(self, t: f64) -> RGBColor {
        let stops = self.stops();
        let t = if t.is_nan() { 0.5 } else { t.clamp(0.0, 1.0) };
        let scaled = t * (stops.len() - 1) as f64;
        let lo = (scaled.floor() as usize).min(stops.len() - 1);
        let hi = (lo + 1).min(stops.len() - 1);
        let frac = scaled - lo as f64;
        let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;
        let (a, b) = (stops[lo], stops[hi]);
        RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
    }
}

impl FromStr for Colormap {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rdylgn" => Ok(Colormap::RdYlGn),
            "rdbu_r" | "rdbur" => Ok(Colormap::RdBuR),
            "coolwarm" => Ok(Colormap::Coolwarm),
            "viridis" => Ok(Colormap::Viridis),
            other => Err(format!(
                "unknown colormap '{}', expected one of: RdYlGn, RdBu_r, coolwarm, viridis",
                other
            )),
        }
    }
}

impl TryFrom<String> for Colormap {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Colormap::RdYlGn => "RdYlGn",
            Colormap::RdBuR => "RdBu_r",
            Colormap::Coolwarm => "coolwarm",
            Colormap::Viridis => "viridis",
        };
        f.write_str(name)
    }
}

/// Zero-centered scale endpoints derived from the typical size of gains and
/// losses rather than from the extremes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorNormalization {
    pub negative_reference: f64,
    pub positive_reference: f64,
}

impl ColorNormalization {
    /// Derive the references from a delta column.
    ///
    /// Each signed subset (zero excluded) is summarized by its mode, or its
    /// median when nothing repeats. A sign with no members falls back to the
    /// global minimum (negative side) or maximum (positive side).
    pub fn from_deltas(deltas: &[f64]) -> Self {
        let positives: Vec<f64> = deltas.iter().copied().filter(|d| *d > 0.0).collect();
        let negatives: Vec<f64> = deltas.iter().copied().filter(|d| *d < 0.0).collect();
        let (global_min, global_max) = stats::min_max(deltas).unwrap_or((0.0, 0.0));

        let negative_reference = stats::mode_or_median(&negatives).unwrap_or(global_min);
        let positive_reference = stats::mode_or_median(&positives).unwrap_or(global_max);

        Self {
            negative_reference,
            positive_reference,
        }
    }

    /// True when no non-zero delta can be told apart from zero.
    pub fn is_degenerate(&self) -> bool {
        self.negative_reference >= 0.0 && self.positive_reference <= 0.0
    }

    /// Position of `delta` on the `[0, 1]` scale, `0.5` being zero.
    pub fn normalize(&self, delta: f64) -> f64 {
        if delta.is_nan() || self.is_degenerate() {
            return 0.5;
        }
        let t = if delta > 0.0 && self.positive_reference > 0.0 {
            0.5 + 0.5 * delta / self.positive_reference
        } else if delta < 0.0 && self.negative_reference < 0.0 {
            0.5 - 0.5 * delta / self.negative_reference
        } else {
            0.5
        };
        t.clamp(0.0, 1.0)
    }

    pub fn color(&self, delta: f64, colormap: Colormap) -> RGBColor {
        colormap.color_at(self.normalize(delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_use_subset_mode() {
        let norm = ColorNormalization::from_deltas(&[0.0, 20.0, -40.0, 0.0]);
        assert_eq!(norm.negative_reference, -40.0);
        assert_eq!(norm.positive_reference, 20.0);
    }

    #[test]
    fn test_outlier_does_not_stretch_scale() {
        let deltas = [0.0, 15.0, 15.0, 15.0, 300.0, -20.0, -20.0, -500.0];
        let norm = ColorNormalization::from_deltas(&deltas);
        assert_eq!(norm.positive_reference, 15.0);
        assert_eq!(norm.negative_reference, -20.0);
        assert_eq!(norm.normalize(300.0), 1.0);
        assert_eq!(norm.normalize(-500.0), 0.0);
        assert_eq!(norm.normalize(15.0), 1.0);
        assert!((norm.normalize(-10.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_median_used_when_nothing_repeats() {
        let norm = ColorNormalization::from_deltas(&[0.0, 10.0, 30.0, 20.0, -5.0, -15.0]);
        assert_eq!(norm.positive_reference, 20.0);
        assert_eq!(norm.negative_reference, -10.0);
    }

    #[test]
    fn test_missing_sign_falls_back_to_global_extreme() {
        let norm = ColorNormalization::from_deltas(&[0.0, 12.0, 12.0, 30.0]);
        assert_eq!(norm.negative_reference, 0.0);
        assert_eq!(norm.positive_reference, 12.0);

        let norm = ColorNormalization::from_deltas(&[0.0, -8.0, -3.0]);
        assert_eq!(norm.positive_reference, 0.0);
        assert_eq!(norm.negative_reference, -5.5);
        assert!(norm.normalize(-8.0) < 0.5);
    }

    #[test]
    fn test_all_zero_is_neutral() {
        let norm = ColorNormalization::from_deltas(&[0.0, 0.0, 0.0]);
        assert!(norm.is_degenerate());
        assert_eq!(norm.normalize(0.0), 0.5);

        let empty = ColorNormalization::from_deltas(&[]);
        assert!(empty.is_degenerate());
        assert_eq!(empty.color(0.0, Colormap::RdYlGn), Colormap::RdYlGn.color_at(0.5));
    }

    #[test]
    fn test_colormap_endpoints() {
        assert_eq!(Colormap::RdYlGn.color_at(0.0), RGBColor(165, 0, 38));
        assert_eq!(Colormap::RdYlGn.color_at(1.0), RGBColor(0, 104, 55));
        assert_eq!(Colormap::RdYlGn.color_at(0.5), RGBColor(255, 255, 191));
        assert_eq!(Colormap::Viridis.color_at(7.0), RGBColor(253, 231, 37));
    }

    #[test]
    fn test_colormap_parse() {
        assert_eq!("rdylgn".parse::<Colormap>(), Ok(Colormap::RdYlGn));
        assert_eq!("RdBu_r".parse::<Colormap>(), Ok(Colormap::RdBuR));
        assert_eq!(Colormap::Coolwarm.to_string(), "coolwarm");
        assert!("jet".parse::<Colormap>().is_err());
    }
}
