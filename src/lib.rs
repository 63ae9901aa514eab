//! Rating-change and correlation-matrix charts for player game records.
//!
//! Two pipelines share one rendering core:
//!
//! - [`plot::render_rate_chart`] turns a rating history into a two-panel
//!   chart of per-game changes and the rating trend;
//! - [`heatmap::compose_heatmaps`] turns a snapshot of metric columns into
//!   per-method correlation heatmaps and a side-by-side composite.
//!
//! Both return [`canvas::ImageBlob`] PNGs that can be saved or embedded as
//! data URIs.

pub mod canvas;
pub mod colormap;
pub mod config;
pub mod correlation;
pub mod error;
pub mod extrema;
pub mod heatmap;
pub mod input;
pub mod labels;
pub mod plot;
pub mod series;
pub mod stats;
pub mod ticks;

pub use canvas::ImageBlob;
pub use config::{HeatmapConfig, RateChartConfig, ReportConfig};
pub use error::{ChartError, Result};
