// Version information constants
const VERSION: &str = env!("CARGO_PKG_VERSION");

use clap::{Parser, Subcommand};
use std::error::Error;
use std::io::{BufWriter, Write};
use tracing_subscriber::EnvFilter;

mod commands;
mod progress;

/// Logger manager supporting dynamic progress display and detailed logging
pub struct Logger {
    writer: BufWriter<std::fs::File>,
    last_progress: String,
}

impl Logger {
    pub fn new(file: std::fs::File) -> Self {
        Self {
            writer: BufWriter::new(file),
            last_progress: String::new(),
        }
    }

    /// Create the run log at `path`, or at `default` when none is given
    pub fn create(path: Option<&str>, default: &str) -> std::io::Result<Self> {
        let file = std::fs::File::create(path.unwrap_or(default))?;
        Ok(Self::new(file))
    }

    /// Record detailed log information
    pub fn log(&mut self, message: &str) -> std::io::Result<()> {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.writer, "[{}] {}", timestamp, message)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Display dynamic progress information (overwrite previous line)
    pub fn progress(&mut self, message: &str) -> std::io::Result<()> {
        if !self.last_progress.is_empty() {
            print!("\r{}", " ".repeat(self.last_progress.len()));
        }
        print!("\r{}", message);
        std::io::stdout().flush()?;

        self.last_progress = message.to_string();
        Ok(())
    }

    /// Finish progress display
    pub fn finish_progress(&mut self) -> std::io::Result<()> {
        if !self.last_progress.is_empty() {
            println!();
            self.last_progress.clear();
        }
        Ok(())
    }

    /// Record log and display progress simultaneously
    pub fn log_and_progress(&mut self, message: &str) -> std::io::Result<()> {
        self.log(message)?;
        self.progress(message)?;
        Ok(())
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render rating change charts from game record CSVs
    Rate(commands::rate::RateArgs),
    /// Render correlation heatmaps from a metric snapshot CSV
    Corr(commands::corr::CorrArgs),
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the default `warn` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Rate(args) => {
            let mut logger = Logger::create(args.log.as_deref(), "rate.log")?;
            let result = commands::rate::run_rate(&args, &mut logger);
            if let Err(e) = &result {
                logger.log(&format!("Rate command failed: {}", e))?;
            }
            result
        }
        Commands::Corr(args) => {
            let mut logger = Logger::create(args.log.as_deref(), "corr.log")?;
            let result = commands::corr::run_corr(&args, &mut logger);
            if let Err(e) = &result {
                logger.log(&format!("Corr command failed: {}", e))?;
            }
            result
        }
    }
}
