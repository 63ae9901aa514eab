//! Correlation heatmaps, one per method plus a side-by-side composite.

use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use std::collections::BTreeMap;
use std::fmt;

use crate::canvas::{Canvas, ChartStyle, ImageBlob, Surface};
use crate::colormap::Colormap;
use crate::config::HeatmapConfig;
use crate::correlation::{
    correlate, CorrelationMethod, CorrelationOutcome, MaskOptions, MaskedView, MetricTable,
};
use crate::error::{ChartError, Result};

const COLOR_BAR_STEPS: usize = 100;
const SINGLE_TITLE_PT: f64 = 16.0;
const PANEL_TITLE_PT: f64 = 14.0;
const SINGLE_ANNOTATION_PT: f64 = 10.0;
const PANEL_ANNOTATION_PT: f64 = 8.0;
/// Coefficients beyond this magnitude get light annotation text.
const DARK_CELL_THRESHOLD: f64 = 0.6;

/// Composite panels always hide the redundant upper triangle and diagonal.
const COMBINED_MASK: MaskOptions = MaskOptions {
    mask_upper: true,
    show_diagonal: false,
};

/// Identifies one artifact of a heatmap set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PanelKey {
    Method(CorrelationMethod),
    Combined,
}

impl fmt::Display for PanelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelKey::Method(method) => f.write_str(method.as_str()),
            PanelKey::Combined => f.write_str("combined"),
        }
    }
}

/// Everything produced by [`compose_heatmaps`].
#[derive(Debug, Default)]
pub struct HeatmapSet {
    pub images: BTreeMap<PanelKey, ImageBlob>,
    pub outcomes: BTreeMap<CorrelationMethod, CorrelationOutcome>,
    /// Artifacts that could not be rendered or written.
    pub failures: Vec<(PanelKey, ChartError)>,
}

impl HeatmapSet {
    pub fn get(&self, key: PanelKey) -> Option<&ImageBlob> {
        self.images.get(&key)
    }

    /// Methods whose matrix is a placeholder.
    pub fn fallbacks(&self) -> impl Iterator<Item = CorrelationMethod> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_fallback())
            .map(|(method, _)| *method)
    }

    /// Base64 PNG per artifact name (`pearson`, ..., `combined`).
    pub fn to_base64_map(&self) -> BTreeMap<String, String> {
        self.images
            .iter()
            .map(|(key, blob)| (key.to_string(), blob.to_base64()))
            .collect()
    }
}

/// Correlate `table` with `method` and render the masked heatmap.
///
/// Returns `Ok(None)` when the table has no columns. With an output prefix
/// configured the image is also written to `{prefix}_{method}.png`.
pub fn render_heatmap(
    table: &MetricTable,
    method: CorrelationMethod,
    config: &HeatmapConfig,
) -> Result<Option<ImageBlob>> {
    config.validate()?;
    let table = selected_table(table, config);
    if table.num_columns() == 0 {
        return Ok(None);
    }
    let outcome = correlate(&table, method);
    let blob = render_outcome(&outcome, method, config)?;
    persist(blob, config, PanelKey::Method(method)).map(Some)
}

/// Render one correlation result on its own, with a color bar.
pub fn render_outcome(
    outcome: &CorrelationOutcome,
    method: CorrelationMethod,
    config: &HeatmapConfig,
) -> Result<ImageBlob> {
    let canvas = Canvas::from_inches(config.width_in, config.height_in, config.dpi)?;
    let style = ChartStyle::new(config.font_family.clone(), 1.0, config.dpi);
    let view = outcome.matrix().masked(config.mask());
    let title = panel_title(&format!("{} ({})", config.title, method.as_str()), outcome);
    let annotation_pt = config.annotate.then_some(SINGLE_ANNOTATION_PT);

    canvas.render(|root| {
        let body = root.titled(&title, style.font(SINGLE_TITLE_PT))?;
        let (cells, bar) = split_color_bar(&body);
        let panel = PanelStyle {
            colormap: config.colormap,
            annotation_pt,
            style: &style,
        };
        draw_matrix_panel(root, &cells, &view, None, &panel)?;
        draw_color_bar(&bar, config.colormap, &style)
    })
}

/// Side-by-side panels sharing one color scale and one color bar.
pub fn render_combined(
    panels: &[(CorrelationMethod, &CorrelationOutcome)],
    config: &HeatmapConfig,
) -> Result<ImageBlob> {
    if panels.is_empty() {
        return Err(ChartError::InvalidConfig(
            "combined heatmap needs at least one panel".to_string(),
        ));
    }
    let canvas = Canvas::from_inches(config.width_in, config.height_in, config.dpi)?;
    let style = ChartStyle::new(config.font_family.clone(), 1.0, config.dpi);

    canvas.render(|root| {
        let (cells, bar) = split_color_bar(root);
        let areas = cells.split_evenly((1, panels.len()));
        let panel = PanelStyle {
            colormap: config.colormap,
            annotation_pt: Some(PANEL_ANNOTATION_PT),
            style: &style,
        };
        for (area, (method, outcome)) in areas.iter().zip(panels) {
            let view = outcome.matrix().masked(COMBINED_MASK);
            let caption = panel_title(&format!("{} correlation", method.title()), outcome);
            draw_matrix_panel(root, area, &view, Some(&caption), &panel)?;
        }
        draw_color_bar(&bar, config.colormap, &style)
    })
}

/// Render every configured method and, for two or more methods, the
/// composite. A failed artifact is recorded in `failures` and does not
/// stop the others.
///
/// Returns `Ok(None)` when the (selected) table has no columns.
pub fn compose_heatmaps(table: &MetricTable, config: &HeatmapConfig) -> Result<Option<HeatmapSet>> {
    config.validate()?;
    let table = selected_table(table, config);
    if table.num_columns() == 0 {
        return Ok(None);
    }
    let methods = distinct_methods(&config.methods);

    let mut set = HeatmapSet::default();
    for &method in &methods {
        let outcome = correlate(&table, method);
        let key = PanelKey::Method(method);
        let rendered =
            render_outcome(&outcome, method, config).and_then(|blob| persist(blob, config, key));
        record(&mut set, key, rendered);
        set.outcomes.insert(method, outcome);
    }

    if methods.len() > 1 {
        let panels: Vec<(CorrelationMethod, &CorrelationOutcome)> = methods
            .iter()
            .filter_map(|method| set.outcomes.get(method).map(|outcome| (*method, outcome)))
            .collect();
        let rendered = render_combined(&panels, config)
            .and_then(|blob| persist(blob, config, PanelKey::Combined));
        match rendered {
            Ok(blob) => {
                set.images.insert(PanelKey::Combined, blob);
            }
            Err(err) => {
                tracing::warn!(key = "combined", %err, "heatmap artifact failed");
                set.failures.push((PanelKey::Combined, err));
            }
        }
    }

    tracing::debug!(
        images = set.images.len(),
        failures = set.failures.len(),
        "heatmap set composed"
    );
    Ok(Some(set))
}

fn record(set: &mut HeatmapSet, key: PanelKey, rendered: Result<ImageBlob>) {
    match rendered {
        Ok(blob) => {
            set.images.insert(key, blob);
        }
        Err(err) => {
            tracing::warn!(%key, %err, "heatmap artifact failed");
            set.failures.push((key, err));
        }
    }
}

fn selected_table(table: &MetricTable, config: &HeatmapConfig) -> MetricTable {
    match &config.variables {
        Some(variables) => table.select(variables),
        None => table.clone(),
    }
}

/// Requested methods in order, repeats removed.
fn distinct_methods(methods: &[CorrelationMethod]) -> Vec<CorrelationMethod> {
    let mut distinct = Vec::with_capacity(methods.len());
    for &method in methods {
        if !distinct.contains(&method) {
            distinct.push(method);
        }
    }
    distinct
}

fn persist(blob: ImageBlob, config: &HeatmapConfig, key: PanelKey) -> Result<ImageBlob> {
    if let Some(path) = config.output_path(&key.to_string()) {
        blob.save(&path)?;
        tracing::debug!(path = %path.display(), "heatmap written");
    }
    Ok(blob)
}

fn panel_title(base: &str, outcome: &CorrelationOutcome) -> String {
    if outcome.is_fallback() {
        format!("{} [placeholder]", base)
    } else {
        base.to_string()
    }
}

/// Position of a coefficient on the `-1..1` scale, zero at the center.
fn coefficient_position(value: f64) -> f64 {
    ((value + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Lower-left corner of cell `(row, col)`; row 0 is drawn at the top.
fn cell_origin(size: usize, row: usize, col: usize) -> (f64, f64) {
    (col as f64, (size - 1 - row) as f64)
}

fn split_color_bar<'a>(area: &Surface<'a>) -> (Surface<'a>, Surface<'a>) {
    let (width, _) = area.dim_in_pixel();
    area.split_horizontally(width - width / 10)
}

struct PanelStyle<'s> {
    colormap: Colormap,
    annotation_pt: Option<f64>,
    style: &'s ChartStyle,
}

/// Pixels reserved for the row and column names.
fn name_area_px(names: &[String], style: &ChartStyle) -> u32 {
    let longest = names.iter().map(|n| n.chars().count()).max().unwrap_or(0) as f64;
    let glyph = style.px((style.base_font_pt - 2.0).max(8.0)) as f64 * 0.6;
    (longest * glyph).ceil() as u32 + style.px(6.0)
}

fn draw_matrix_panel(
    root: &Surface<'_>,
    area: &Surface<'_>,
    view: &MaskedView<'_>,
    caption: Option<&str>,
    panel: &PanelStyle<'_>,
) -> Result<()> {
    let style = panel.style;
    let n = view.size();
    let extent = n as f64;
    let names_px = name_area_px(view.names(), style);

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(style.px(6.0))
        .x_label_area_size(names_px)
        .y_label_area_size(names_px);
    if let Some(caption) = caption {
        builder.caption(caption, style.font(PANEL_TITLE_PT));
    }
    let mut chart = builder.build_cartesian_2d(0.0..extent, 0.0..extent)?;

    chart.draw_series(view.visible_cells().map(|(row, col, value)| {
        let (x, y) = cell_origin(n, row, col);
        let color = panel.colormap.color_at(coefficient_position(value));
        Rectangle::new([(x, y), (x + 1.0, y + 1.0)], color.filled())
    }))?;
    chart.draw_series(view.visible_cells().map(|(row, col, _)| {
        let (x, y) = cell_origin(n, row, col);
        Rectangle::new([(x, y), (x + 1.0, y + 1.0)], WHITE.stroke_width(1))
    }))?;

    if let Some(points) = panel.annotation_pt {
        let font = style.font(points);
        chart.draw_series(view.visible_cells().map(|(row, col, value)| {
            let (x, y) = cell_origin(n, row, col);
            let ink = if value.abs() > DARK_CELL_THRESHOLD { WHITE } else { BLACK };
            Text::new(
                format!("{:.2}", value),
                (x + 0.5, y + 0.5),
                font.clone().color(&ink).pos(Pos::new(HPos::Center, VPos::Center)),
            )
        }))?;
    }

    let name_font = style.tick_font();
    let gap = style.px(3.0) as i32;
    for (k, name) in view.names().iter().enumerate() {
        let (px, py) = chart.backend_coord(&(0.0, extent - k as f64 - 0.5));
        root.draw(&Text::new(
            name.as_str(),
            (px - gap, py),
            name_font.clone().color(&BLACK).pos(Pos::new(HPos::Right, VPos::Center)),
        ))?;

        let (px, py) = chart.backend_coord(&(k as f64 + 0.5, 0.0));
        root.draw(&Text::new(
            name.as_str(),
            (px, py + gap),
            name_font
                .clone()
                .transform(FontTransform::Rotate90)
                .color(&BLACK)
                .pos(Pos::new(HPos::Left, VPos::Center)),
        ))?;
    }
    Ok(())
}

fn draw_color_bar(area: &Surface<'_>, colormap: Colormap, style: &ChartStyle) -> Result<()> {
    let (_, height) = area.dim_in_pixel();
    let inset = height / 10;
    let area = area.margin(inset, inset, 0, 0);

    let mut chart = ChartBuilder::on(&area)
        .margin(style.px(4.0))
        .right_y_label_area_size(style.px(style.base_font_pt * 3.0))
        .build_cartesian_2d(0.0..1.0, -1.0..1.0)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_labels(5)
        .y_label_formatter(&|v| format!("{:.1}", v))
        .label_style(style.tick_font())
        .draw()?;

    let step = 2.0 / COLOR_BAR_STEPS as f64;
    chart.draw_series((0..COLOR_BAR_STEPS).map(|k| {
        let lo = -1.0 + step * k as f64;
        let color = colormap.color_at(coefficient_position(lo + step / 2.0));
        Rectangle::new([(0.0, lo), (1.0, lo + step)], color.filled())
    }))?;
    Ok(())
}
