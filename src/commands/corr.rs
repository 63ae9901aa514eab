use clap::Args;
use rating_viz::colormap::Colormap;
use rating_viz::config::HeatmapConfig;
use rating_viz::correlation::CorrelationMethod;
use rating_viz::heatmap::compose_heatmaps;
use rating_viz::input::load_metric_table;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Args, Debug)]
pub struct CorrArgs {
    /// Metric snapshot CSV (one numeric column per metric)
    #[arg(short = 'i', long = "input")]
    pub input: String,
    /// Output prefix; writes <prefix>_<method>.png and <prefix>_combined.png
    #[arg(short = 'o', long = "output", default_value = "correlation")]
    pub output: String,
    /// Target columns (comma-separated, default all numeric columns)
    #[arg(long = "vars", value_delimiter = ',')]
    pub vars: Option<Vec<String>>,
    /// Correlation methods (comma-separated: pearson, spearman, kendall)
    #[arg(short = 'm', long = "methods", value_delimiter = ',')]
    pub methods: Option<Vec<String>>,
    /// Heatmap title
    #[arg(long = "title")]
    pub title: Option<String>,
    /// Colormap (RdYlGn, RdBu_r, coolwarm, viridis)
    #[arg(long = "colormap")]
    pub colormap: Option<String>,
    /// Show the full matrix instead of the lower triangle
    #[arg(long = "full", default_value_t = false)]
    pub full: bool,
    /// Hide the diagonal of single-method heatmaps
    #[arg(long = "hide-diagonal", default_value_t = false)]
    pub hide_diagonal: bool,
    /// Do not print coefficients inside the cells
    #[arg(long = "no-annotate", default_value_t = false)]
    pub no_annotate: bool,
    /// Also write a base64 data URI (.b64) next to each heatmap
    #[arg(long = "data-uri", default_value_t = false)]
    pub data_uri: bool,
    /// TOML configuration file
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,
    /// Log file path (optional)
    #[arg(short = 'l', long = "log")]
    pub log: Option<String>,
}

/// Validate corr command arguments
pub fn validate_corr_args(args: &CorrArgs) -> Result<(), Box<dyn Error>> {
    if args.input.trim().is_empty() {
        return Err("Error: Input file path cannot be empty".into());
    }
    if !Path::new(&args.input).exists() {
        return Err(format!("Error: Input file does not exist: {}", args.input).into());
    }
    if !args.input.ends_with(".csv") {
        return Err(format!("Error: Input file path must end with .csv: {}", args.input).into());
    }
    if args.output.trim().is_empty() {
        return Err("Error: Output prefix cannot be empty".into());
    }
    if let Some(methods) = &args.methods {
        if methods.is_empty() {
            return Err("Error: At least one correlation method is required".into());
        }
        for method in methods {
            method.parse::<CorrelationMethod>()?;
        }
    }
    if let Some(vars) = &args.vars {
        if vars.iter().any(|v| v.trim().is_empty()) {
            return Err("Error: Target variable names cannot be empty".into());
        }
    }
    if let Some(colormap) = &args.colormap {
        colormap.parse::<Colormap>()?;
    }
    Ok(())
}

/// Command line values override the configuration file.
fn apply_overrides(
    mut config: HeatmapConfig,
    args: &CorrArgs,
) -> Result<HeatmapConfig, Box<dyn Error>> {
    if let Some(methods) = &args.methods {
        config.methods = methods
            .iter()
            .map(|m| m.parse::<CorrelationMethod>())
            .collect::<Result<Vec<_>, _>>()?;
    }
    if let Some(vars) = &args.vars {
        config.variables = Some(vars.iter().map(|v| v.trim().to_string()).collect());
    }
    if let Some(title) = &args.title {
        config.title = title.clone();
    }
    if let Some(colormap) = &args.colormap {
        config.colormap = colormap.parse()?;
    }
    if args.full {
        config.mask_upper = false;
    }
    if args.hide_diagonal {
        config.show_diagonal = false;
    }
    if args.no_annotate {
        config.annotate = false;
    }
    config.output_prefix = Some(PathBuf::from(&args.output));
    config.validate()?;
    Ok(config)
}

pub fn run_corr(args: &CorrArgs, logger: &mut crate::Logger) -> Result<(), Box<dyn Error>> {
    validate_corr_args(args)?;
    let start_time = Instant::now();

    let report = super::load_report_config(args.config.as_deref())?;
    let config = apply_overrides(report.heatmap, args)?;
    let methods: Vec<&str> = config.methods.iter().map(|m| m.as_str()).collect();

    logger.log("=== rating-viz Corr Function Log ===")?;
    logger.log(&format!("Software Version: v{}", crate::VERSION))?;
    logger.log(&format!(
        "Runtime: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
    ))?;
    logger.log(&format!("Input File: {}", args.input))?;
    logger.log(&format!("Output Prefix: {}", args.output))?;
    logger.log(&format!("Methods: {}", methods.join(",")))?;
    logger.log(&format!(
        "Mask Upper: {}, Show Diagonal: {}, Annotate: {}",
        config.mask_upper, config.show_diagonal, config.annotate
    ))?;

    println!("[Loading data]");
    println!("    metrics: {}", args.input);
    println!();

    logger.log_and_progress("Loading metric table...")?;
    let table = load_metric_table(&args.input)?;
    logger.finish_progress()?;
    logger.log(&format!(
        "Metric table: {} columns x {} rows",
        table.num_columns(),
        table.num_rows()
    ))?;

    println!("[Data info]");
    println!("    Columns: {}. Rows: {}.", table.num_columns(), table.num_rows());
    println!("    Methods: {}.", methods.join(", "));
    println!();

    if let Some(parent) = Path::new(&args.output).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let Some(set) = compose_heatmaps(&table, &config)? else {
        logger.log("No metric columns selected, no heatmap rendered")?;
        println!("[Outputs]  No metric columns selected, nothing rendered.");
        return Ok(());
    };

    for method in set.fallbacks() {
        let reason = set
            .outcomes
            .get(&method)
            .and_then(|outcome| outcome.fallback_reason())
            .map(|reason| reason.to_string())
            .unwrap_or_default();
        logger.log(&format!(
            "{}: correlation failed ({}), placeholder matrix rendered",
            method, reason
        ))?;
        eprintln!("Warning: {} correlation used placeholder data: {}", method, reason);
    }

    for (key, blob) in &set.images {
        let png = config
            .output_path(&key.to_string())
            .unwrap_or_else(|| PathBuf::from(format!("{}_{}.png", args.output, key)));
        logger.log(&format!(
            "{}: {}x{} -> {}",
            key,
            blob.width(),
            blob.height(),
            png.display()
        ))?;
        if args.data_uri {
            let uri = super::write_data_uri(&png, blob)?;
            logger.log(&format!("{}: data URI -> {}", key, uri.display()))?;
        }
    }
    for (key, err) in &set.failures {
        eprintln!("Rendering error for {}: {}", key, err);
        logger.log(&format!("{}: rendering failed: {}", key, err))?;
    }

    let elapsed = start_time.elapsed();
    println!(
        "[Outputs]  Success: {}. Failed: {}. Placeholder: {}.",
        set.images.len(),
        set.failures.len(),
        set.fallbacks().count()
    );
    println!("    heatmaps: {}_*.png", args.output);
    println!("{}", crate::progress::format_time_used(elapsed));
    logger.log(&format!(
        "Heatmaps completed: {} written, {} failed",
        set.images.len(),
        set.failures.len()
    ))?;

    if set.images.is_empty() && !set.failures.is_empty() {
        return Err("Error: No heatmap could be rendered".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CorrArgs {
        CorrArgs {
            input: "metrics.csv".to_string(),
            output: "out/corr".to_string(),
            vars: Some(vec![" win_rate".to_string(), "deal_in".to_string()]),
            methods: Some(vec!["kendall".to_string(), "Pearson".to_string()]),
            title: None,
            colormap: None,
            full: true,
            hide_diagonal: false,
            no_annotate: true,
            data_uri: false,
            config: None,
            log: None,
        }
    }

    #[test]
    fn test_overrides_apply_on_top_of_config() {
        let config = apply_overrides(HeatmapConfig::default(), &args()).unwrap();
        assert_eq!(
            config.methods,
            vec![CorrelationMethod::Kendall, CorrelationMethod::Pearson]
        );
        assert_eq!(
            config.variables,
            Some(vec!["win_rate".to_string(), "deal_in".to_string()])
        );
        assert!(!config.mask_upper);
        assert!(config.show_diagonal);
        assert!(!config.annotate);
        assert_eq!(config.output_path("combined"), Some(PathBuf::from("out/corr_combined.png")));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let mut bad = args();
        bad.methods = Some(vec!["cosine".to_string()]);
        assert!(apply_overrides(HeatmapConfig::default(), &bad).is_err());
    }
}
