use clap::Args;
use rayon::prelude::*;
use rating_viz::colormap::Colormap;
use rating_viz::config::RateChartConfig;
use rating_viz::error::ChartError;
use rating_viz::input::load_series_csv;
use rating_viz::plot::render_rate_chart;
use rating_viz::series::Series;
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Args, Debug)]
pub struct RateArgs {
    /// Game record CSV files (comma-separated)
    #[arg(short = 'i', long = "input", value_delimiter = ',', required = true)]
    pub input: Vec<String>,
    /// Output directory
    #[arg(short = 'o', long = "output", default_value = "rate_charts")]
    pub output: String,
    /// Name of the date column
    #[arg(long = "date-col", default_value = "date")]
    pub date_col: String,
    /// Name of the rating column
    #[arg(long = "rate-col", default_value = "rate")]
    pub rate_col: String,
    /// Player name for the chart title (defaults to the file name)
    #[arg(short = 'p', long = "player")]
    pub player: Option<String>,
    /// Maximum number of bar labels
    #[arg(long = "max-labels")]
    pub max_labels: Option<usize>,
    /// Maximum number of date ticks
    #[arg(long = "max-ticks")]
    pub max_ticks: Option<usize>,
    /// Colormap (RdYlGn, RdBu_r, coolwarm, viridis)
    #[arg(long = "colormap")]
    pub colormap: Option<String>,
    /// Rating before the first game
    #[arg(long = "baseline")]
    pub baseline: Option<f64>,
    /// Also write a base64 data URI (.b64) next to each chart
    #[arg(long = "data-uri", default_value_t = false)]
    pub data_uri: bool,
    /// Number of parallel threads
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,
    /// TOML configuration file
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,
    /// Log file path (optional)
    #[arg(short = 'l', long = "log")]
    pub log: Option<String>,
}

/// Validate rate command arguments
pub fn validate_rate_args(args: &RateArgs) -> Result<(), Box<dyn Error>> {
    if args.input.is_empty() {
        return Err("Error: At least one input file is required".into());
    }
    for input in &args.input {
        if input.trim().is_empty() {
            return Err("Error: Input file path cannot be empty".into());
        }
        if !Path::new(input).exists() {
            return Err(format!("Error: Input file does not exist: {}", input).into());
        }
        if !input.ends_with(".csv") {
            return Err(format!("Error: Input file path must end with .csv: {}", input).into());
        }
    }
    if args.output.trim().is_empty() {
        return Err("Error: Output directory cannot be empty".into());
    }
    if args.date_col.trim().is_empty() || args.rate_col.trim().is_empty() {
        return Err("Error: Date and rate column names cannot be empty".into());
    }
    if let Some(colormap) = &args.colormap {
        colormap.parse::<Colormap>()?;
    }
    if args.max_ticks == Some(0) {
        return Err("Error: Maximum tick count must be at least 1".into());
    }
    if args.threads == Some(0) {
        return Err("Error: Thread count must be at least 1".into());
    }
    Ok(())
}

/// Command line values override the configuration file.
fn apply_overrides(
    mut config: RateChartConfig,
    args: &RateArgs,
) -> Result<RateChartConfig, Box<dyn Error>> {
    if let Some(player) = &args.player {
        config.player_name = player.clone();
    }
    if let Some(max_labels) = args.max_labels {
        config.max_bar_labels = max_labels;
    }
    if let Some(max_ticks) = args.max_ticks {
        config.max_ticks = max_ticks;
    }
    if let Some(colormap) = &args.colormap {
        config.colormap = colormap.parse()?;
    }
    if args.baseline.is_some() {
        config.baseline = args.baseline;
    }
    config.validate()?;
    Ok(config)
}

fn file_stem(input: &str) -> String {
    Path::new(input)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rate".to_string())
}

/// What became of one input file.
enum ChartResult {
    Written { png: PathBuf, games: usize, dropped: usize },
    Empty { dropped: usize },
}

fn render_one(
    input: &str,
    base: &RateChartConfig,
    args: &RateArgs,
) -> Result<ChartResult, ChartError> {
    let rows = load_series_csv(input, &args.date_col, &args.rate_col)?;
    let series = Series::from_points(rows, base.baseline);

    let stem = file_stem(input);
    let png = Path::new(&args.output).join(format!("{}_rate.png", stem));
    let mut config = base.clone();
    if config.player_name.is_empty() && args.input.len() > 1 {
        config.player_name = stem;
    }
    config.output_file = Some(png.clone());

    match render_rate_chart(&series, &config)? {
        Some(blob) => {
            if args.data_uri {
                super::write_data_uri(&png, &blob)?;
            }
            Ok(ChartResult::Written {
                png,
                games: series.len(),
                dropped: series.dropped(),
            })
        }
        None => Ok(ChartResult::Empty {
            dropped: series.dropped(),
        }),
    }
}

pub fn run_rate(args: &RateArgs, logger: &mut crate::Logger) -> Result<(), Box<dyn Error>> {
    validate_rate_args(args)?;
    let start_time = Instant::now();

    let report = super::load_report_config(args.config.as_deref())?;
    let config = apply_overrides(report.rate, args)?;

    logger.log("=== rating-viz Rate Function Log ===")?;
    logger.log(&format!("Software Version: v{}", crate::VERSION))?;
    logger.log(&format!(
        "Runtime: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
    ))?;
    logger.log(&format!("Input Files: {}", args.input.join(",")))?;
    logger.log(&format!("Output Directory: {}", args.output))?;
    logger.log(&format!("Columns: date={}, rate={}", args.date_col, args.rate_col))?;
    logger.log(&format!(
        "Figure: {}x{} in, {} dpi, font scale {}",
        config.width_in, config.height_in, config.dpi, config.font_scale
    ))?;
    logger.log(&format!(
        "Max Labels: {}, Max Ticks: {}, Colormap: {}",
        config.max_bar_labels, config.max_ticks, config.colormap
    ))?;

    println!("[Params]");
    println!("    Inputs: {} file(s).", args.input.len());
    println!("    Colormap: {}.", config.colormap);
    println!();

    std::fs::create_dir_all(&args.output)?;

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .unwrap_or_else(|_| {
                println!("Warning: Unable to set thread count, using default settings")
            });
    }

    let total = args.input.len();
    let completed = AtomicUsize::new(0);
    let results: Vec<(String, Result<ChartResult, ChartError>)> = args
        .input
        .par_iter()
        .map(|input| {
            let result = render_one(input, &config, args);
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            let percent = done as f64 * 100.0 / total as f64;
            print!("\r[Progressing] Rendering {}/{} ({:.1}%)", done, total, percent);
            std::io::stdout().flush().ok();
            (input.clone(), result)
        })
        .collect();

    let mut success_count = 0;
    let mut empty_count = 0;
    let mut error_count = 0;
    for (input, result) in &results {
        match result {
            Ok(ChartResult::Written { png, games, dropped }) => {
                success_count += 1;
                logger.log(&format!(
                    "{}: {} games, {} dropped rows -> {}",
                    input,
                    games,
                    dropped,
                    png.display()
                ))?;
            }
            Ok(ChartResult::Empty { dropped }) => {
                empty_count += 1;
                logger.log(&format!("{}: no usable rows ({} dropped), no chart", input, dropped))?;
            }
            Err(e) => {
                error_count += 1;
                eprintln!("\nRendering error for {}: {}", input, e);
                logger.log(&format!("{}: rendering failed: {}", input, e))?;
            }
        }
    }

    let elapsed = start_time.elapsed();
    println!(
        "\r[Outputs]  Success: {}. Empty: {}. Failed: {}.",
        success_count, empty_count, error_count
    );
    println!("    rate charts: {}/", args.output);
    println!("{}", crate::progress::format_time_used(elapsed));
    logger.log(&format!(
        "Rate charts completed: {} written, {} empty, {} failed",
        success_count, empty_count, error_count
    ))?;

    if success_count == 0 && error_count > 0 {
        return Err(format!("Error: All {} input file(s) failed to render", error_count).into());
    }
    Ok(())
}
