//! Rendering configuration, with defaults and optional TOML loading.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::canvas::MAX_PIXELS;
use crate::colormap::Colormap;
use crate::correlation::{CorrelationMethod, MaskOptions};
use crate::error::{ChartError, Result};
use crate::ticks::DEFAULT_MAX_TICKS;

/// Rate change chart configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateChartConfig {
    /// Player name shown in the title (omitted when empty)
    pub player_name: String,
    /// Figure width in inches
    pub width_in: f64,
    /// Figure height in inches
    pub height_in: f64,
    pub dpi: f64,
    /// Multiplier on the 10pt base font
    pub font_scale: f64,
    pub font_family: String,
    /// Maximum number of bar labels
    pub max_bar_labels: usize,
    /// Maximum number of date ticks on the shared axis
    pub max_ticks: usize,
    pub colormap: Colormap,
    /// Rating before the first game; first delta is measured against it
    pub baseline: Option<f64>,
    /// When set, the rendered PNG is also written here
    pub output_file: Option<PathBuf>,
}

impl Default for RateChartConfig {
    fn default() -> Self {
        Self {
            player_name: String::new(),
            width_in: 18.0,
            height_in: 12.0,
            dpi: 100.0,
            font_scale: 2.5,
            font_family: "sans-serif".to_string(),
            max_bar_labels: 15,
            max_ticks: DEFAULT_MAX_TICKS,
            colormap: Colormap::RdYlGn,
            baseline: None,
            output_file: None,
        }
    }
}

impl RateChartConfig {
    pub fn validate(&self) -> Result<()> {
        validate_figure(self.width_in, self.height_in, self.dpi)?;
        if !(self.font_scale.is_finite() && self.font_scale > 0.0) {
            return Err(ChartError::InvalidConfig(format!(
                "font scale must be positive, got {}",
                self.font_scale
            )));
        }
        if self.max_ticks == 0 {
            return Err(ChartError::InvalidConfig("max ticks must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Correlation heatmap configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    pub title: String,
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: f64,
    pub font_family: String,
    pub colormap: Colormap,
    /// Print the coefficient inside each visible cell
    pub annotate: bool,
    /// Hide entries strictly above the diagonal
    pub mask_upper: bool,
    pub show_diagonal: bool,
    pub methods: Vec<CorrelationMethod>,
    /// Restrict the table to these columns before correlating
    pub variables: Option<Vec<String>>,
    /// Output prefix; artifacts go to `{prefix}_{method}.png` and
    /// `{prefix}_combined.png`
    pub output_prefix: Option<PathBuf>,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            title: "Metric correlation".to_string(),
            width_in: 14.0,
            height_in: 12.0,
            dpi: 150.0,
            font_family: "sans-serif".to_string(),
            colormap: Colormap::RdBuR,
            annotate: true,
            mask_upper: true,
            show_diagonal: true,
            methods: vec![CorrelationMethod::Pearson, CorrelationMethod::Spearman],
            variables: None,
            output_prefix: None,
        }
    }
}

impl HeatmapConfig {
    pub fn mask(&self) -> MaskOptions {
        MaskOptions {
            mask_upper: self.mask_upper,
            show_diagonal: self.show_diagonal,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_figure(self.width_in, self.height_in, self.dpi)?;
        if self.methods.is_empty() {
            return Err(ChartError::InvalidConfig(
                "at least one correlation method is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Output path of one artifact under the configured prefix.
    pub fn output_path(&self, key: &str) -> Option<PathBuf> {
        self.output_prefix.as_ref().map(|prefix| {
            let mut name = prefix.as_os_str().to_owned();
            name.push(format!("_{}.png", key));
            PathBuf::from(name)
        })
    }
}

/// Both chart families, as loaded from a TOML file:
///
/// ```toml
/// [rate]
/// player_name = "alice"
/// max_bar_labels = 20
///
/// [heatmap]
/// methods = ["pearson", "kendall"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub rate: RateChartConfig,
    pub heatmap: HeatmapConfig,
}

impl ReportConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ReportConfig = toml::from_str(text)?;
        config.rate.validate()?;
        config.heatmap.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

fn validate_figure(width_in: f64, height_in: f64, dpi: f64) -> Result<()> {
    let positive = |v: f64| v.is_finite() && v > 0.0;
    if !positive(width_in) || !positive(height_in) {
        return Err(ChartError::InvalidConfig(format!(
            "figure size must be positive, got {}x{} in",
            width_in, height_in
        )));
    }
    if !positive(dpi) {
        return Err(ChartError::InvalidConfig(format!("dpi must be positive, got {}", dpi)));
    }
    let pixels = (width_in * dpi).round() * (height_in * dpi).round();
    if pixels > MAX_PIXELS as f64 {
        return Err(ChartError::InvalidConfig(format!(
            "figure {}x{} in at {} dpi exceeds the {} pixel limit",
            width_in, height_in, dpi, MAX_PIXELS
        )));
    }
    Ok(())
}
