//! Two-panel rate change chart: colored change bars above, rating trend below.

use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;

use crate::canvas::{Canvas, ChartStyle, ImageBlob, Surface};
use crate::colormap::ColorNormalization;
use crate::config::RateChartConfig;
use crate::error::Result;
use crate::extrema::{annotate_extrema, ExtremumKind};
use crate::labels::{bar_axis_range, declutter, label_font_size, VerticalAnchor};
use crate::series::{IntoInstant, Series};
use crate::stats;
use crate::ticks::sample_ticks;

/// Above this many games bars are drawn edge to edge without outlines.
const DENSE_THRESHOLD: usize = 200;

const TREND_COLOR: RGBColor = RGBColor(0x21, 0x96, 0xF3);

/// Vertical headroom around the trend line, as a fraction of its range.
const TREND_PADDING: f64 = 0.2;

struct BarStyle {
    half_width: f64,
    alpha: f64,
    outlined: bool,
}

impl BarStyle {
    fn for_len(len: usize) -> Self {
        if len > DENSE_THRESHOLD {
            Self {
                half_width: 0.5,
                alpha: 0.7,
                outlined: false,
            }
        } else {
            Self {
                half_width: 0.4,
                alpha: 0.8,
                outlined: true,
            }
        }
    }
}

/// Build a series from raw `(timestamp, value)` rows and render it.
///
/// The configured baseline, if any, sets the first change.
pub fn render_rate_points<I, T>(points: I, config: &RateChartConfig) -> Result<Option<ImageBlob>>
where
    I: IntoIterator<Item = (T, f64)>,
    T: IntoInstant,
{
    let series = Series::from_points(points, config.baseline);
    render_rate_chart(&series, config)
}

/// Render the change chart of `series`.
///
/// Returns `Ok(None)` for an empty series. When `config.output_file` is set
/// the PNG is also written there, byte for byte the returned blob.
pub fn render_rate_chart(series: &Series, config: &RateChartConfig) -> Result<Option<ImageBlob>> {
    if series.is_empty() {
        tracing::debug!("empty series, no rate chart");
        return Ok(None);
    }
    config.validate()?;

    let canvas = Canvas::from_inches(config.width_in, config.height_in, config.dpi)?;
    let style = ChartStyle::new(config.font_family.clone(), config.font_scale, config.dpi);
    let blob = canvas.render(|root| draw_rate_chart(root, series, config, &style))?;

    if let Some(path) = &config.output_file {
        blob.save(path)?;
        tracing::debug!(path = %path.display(), "rate chart written");
    }
    Ok(Some(blob))
}

fn chart_title(player_name: &str, games: usize) -> String {
    if player_name.is_empty() {
        format!("Rate change analysis ({} games)", games)
    } else {
        format!("{} - Rate change analysis ({} games)", player_name, games)
    }
}

fn draw_rate_chart(
    root: &Surface<'_>,
    series: &Series,
    config: &RateChartConfig,
    style: &ChartStyle,
) -> Result<()> {
    let n = series.len();
    let deltas = series.deltas();
    let values = series.values();
    let x_range = -0.5..(n as f64 - 0.5);

    let margin = style.px(style.base_font_pt * 0.5);
    let panels = root.margin(margin, margin, margin, margin).split_evenly((2, 1));
    let (bar_area, trend_area) = (&panels[0], &panels[1]);
    let y_label_size = style.px(style.base_font_pt * 5.0);

    // Upper panel: one bar per game, colored on the adaptive scale
    let (bar_lo, bar_hi) = bar_axis_range(deltas);
    let mut bars = ChartBuilder::on(bar_area)
        .caption(chart_title(&config.player_name, n), style.title_font())
        .margin(margin)
        .x_label_area_size(style.px(style.base_font_pt))
        .y_label_area_size(y_label_size)
        .build_cartesian_2d(x_range.clone(), bar_lo..bar_hi)?;

    bars.configure_mesh()
        .disable_x_mesh()
        .light_line_style(WHITE.mix(0.0))
        .bold_line_style(BLACK.mix(0.15))
        .x_label_formatter(&|_| String::new())
        .y_desc("Rate change")
        .axis_desc_style(style.axis_label_font())
        .label_style(style.tick_font())
        .draw()?;

    let norm = ColorNormalization::from_deltas(deltas);
    let bar_style = BarStyle::for_len(n);
    bars.draw_series(deltas.iter().enumerate().map(|(i, &delta)| {
        let x = i as f64;
        let color = norm.color(delta, config.colormap);
        Rectangle::new(
            [(x - bar_style.half_width, 0.0), (x + bar_style.half_width, delta)],
            color.mix(bar_style.alpha).filled(),
        )
    }))?;
    if bar_style.outlined {
        bars.draw_series(deltas.iter().enumerate().map(|(i, &delta)| {
            let x = i as f64;
            Rectangle::new(
                [(x - bar_style.half_width, 0.0), (x + bar_style.half_width, delta)],
                BLACK.stroke_width(1),
            )
        }))?;
    }
    bars.draw_series(LineSeries::new(
        vec![(x_range.start, 0.0), (x_range.end, 0.0)],
        BLACK.stroke_width(1),
    ))?;

    let label_font = style.font(label_font_size(n, config.width_in));
    let labels = declutter(deltas, config.max_bar_labels, (bar_lo, bar_hi));
    bars.draw_series(labels.into_iter().map(|label| {
        let vpos = match label.anchor {
            VerticalAnchor::Top => VPos::Top,
            VerticalAnchor::Bottom => VPos::Bottom,
        };
        let text_style = label_font
            .clone()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, vpos));
        Text::new(label.text, (label.index as f64, label.y), text_style)
    }))?;

    // Lower panel: rating after each game
    let (v_min, v_max) = stats::min_max(&values).unwrap_or((0.0, 0.0));
    let pad = ((v_max - v_min) * TREND_PADDING).max(1.0);
    let mut trend = ChartBuilder::on(trend_area)
        .caption("Rate trend", style.title_font())
        .margin(margin)
        .x_label_area_size(style.px(style.base_font_pt * 3.0))
        .y_label_area_size(y_label_size)
        .build_cartesian_2d(x_range.clone(), (v_min - pad)..(v_max + pad))?;

    trend
        .configure_mesh()
        .light_line_style(WHITE.mix(0.0))
        .bold_line_style(BLACK.mix(0.15))
        .x_label_formatter(&|_| String::new())
        .y_desc("Current rate")
        .axis_desc_style(style.axis_label_font())
        .label_style(style.tick_font())
        .draw()?;

    let line_width = (2.0 * config.font_scale).round().max(1.0) as u32;
    trend.draw_series(LineSeries::new(
        values.iter().enumerate().map(|(i, &v)| (i as f64, v)),
        TREND_COLOR.mix(0.8).stroke_width(line_width),
    ))?;

    let callout_font = style.font(style.base_font_pt * 0.9);
    for callout in annotate_extrema(&values) {
        let (color, vpos) = match callout.kind {
            ExtremumKind::Max => (RED, VPos::Bottom),
            ExtremumKind::Min => (BLUE, VPos::Top),
        };
        let x = callout.index as f64;
        trend.draw_series(std::iter::once(PathElement::new(
            vec![(x, callout.text_y), (x, callout.value)],
            color.stroke_width(line_width.max(2) - 1),
        )))?;
        let marker = Circle::new((x, callout.value), line_width + 2, color.filled());
        trend.draw_series(std::iter::once(marker))?;
        trend.draw_series(std::iter::once(Text::new(
            callout.text(),
            (x, callout.text_y),
            callout_font.clone().color(&color).pos(Pos::new(HPos::Center, vpos)),
        )))?;
    }

    // Shared date axis, labelled under the trend panel only
    let tick_font = style.tick_font().transform(FontTransform::Rotate90);
    let tick_offset = style.px(style.base_font_pt * 0.5) as i32;
    for idx in sample_ticks(n, config.max_ticks) {
        let Some(label) = series.date_label(idx) else {
            continue;
        };
        let (px, py) = trend.backend_coord(&(idx as f64, v_min - pad));
        root.draw(&Text::new(
            label,
            (px, py + tick_offset),
            tick_font.clone().color(&BLACK).pos(Pos::new(HPos::Left, VPos::Center)),
        ))?;
    }

    tracing::debug!(games = n, dropped = series.dropped(), "rate chart drawn");
    Ok(())
}
