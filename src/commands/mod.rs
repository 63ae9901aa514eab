pub mod corr;
pub mod rate;

use rating_viz::config::ReportConfig;
use std::error::Error;

/// Configuration file values, or defaults when no file is given.
pub fn load_report_config(path: Option<&str>) -> Result<ReportConfig, Box<dyn Error>> {
    match path {
        Some(path) => {
            if !std::path::Path::new(path).exists() {
                return Err(format!("Error: Config file does not exist: {}", path).into());
            }
            Ok(ReportConfig::load(path)?)
        }
        None => Ok(ReportConfig::default()),
    }
}

/// Write a chart's data URI next to its PNG, as `<stem>.b64`.
pub fn write_data_uri(
    png_path: &std::path::Path,
    blob: &rating_viz::ImageBlob,
) -> std::io::Result<std::path::PathBuf> {
    let uri_path = png_path.with_extension("b64");
    std::fs::write(&uri_path, blob.to_data_uri())?;
    Ok(uri_path)
}
