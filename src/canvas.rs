//! Per-call rendering surfaces and the PNG blobs they produce.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::io::Cursor;
use std::path::Path;

use crate::error::{ChartError, Result};

pub type Surface<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Largest surface a single render may allocate (width times height).
pub const MAX_PIXELS: u64 = 100_000_000;

/// An encoded PNG image, ready to embed or persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    png: Vec<u8>,
    width: u32,
    height: u32,
}

impl ImageBlob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.png
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.png)
    }

    /// `data:image/png;base64,...` form for direct embedding in HTML.
    pub fn to_data_uri(&self) -> String {
        format!("data:image/png;base64,{}", self.to_base64())
    }

    /// Write the PNG bytes unchanged to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.png)?;
        Ok(())
    }
}

/// A pixel surface that lives for exactly one render call.
#[derive(Debug, Clone, Copy)]
pub struct Canvas {
    width: u32,
    height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ChartError::InvalidConfig(format!(
                "canvas size must be non-zero, got {}x{}",
                width, height
            )));
        }
        if u64::from(width) * u64::from(height) > MAX_PIXELS {
            return Err(ChartError::InvalidConfig(format!(
                "canvas {}x{} exceeds the {} pixel limit",
                width, height, MAX_PIXELS
            )));
        }
        Ok(Self { width, height })
    }

    /// Size from figure inches and dots per inch.
    pub fn from_inches(width_in: f64, height_in: f64, dpi: f64) -> Result<Self> {
        let px = |inches: f64| (inches * dpi).round();
        let (w, h) = (px(width_in), px(height_in));
        if !(w >= 1.0 && h >= 1.0 && w <= u32::MAX as f64 && h <= u32::MAX as f64) {
            return Err(ChartError::InvalidConfig(format!(
                "figure {}x{} in at {} dpi gives no drawable pixels",
                width_in, height_in, dpi
            )));
        }
        Self::new(w as u32, h as u32)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Allocate a fresh white surface, run `draw` on it and encode the
    /// result. The surface is released on every exit path.
    pub fn render<F>(&self, draw: F) -> Result<ImageBlob>
    where
        F: FnOnce(&Surface<'_>) -> Result<()>,
    {
        let mut buffer = vec![0u8; self.width as usize * self.height as usize * 3];
        {
            let size = (self.width, self.height);
            let root = BitMapBackend::with_buffer(&mut buffer, size).into_drawing_area();
            root.fill(&WHITE)?;
            draw(&root)?;
            root.present()?;
        }
        encode_png(buffer, self.width, self.height)
    }
}

fn encode_png(buffer: Vec<u8>, width: u32, height: u32) -> Result<ImageBlob> {
    let image = image::RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| ChartError::Drawing("pixel buffer does not match canvas size".to_string()))?;
    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, image::ImageFormat::Png)?;
    Ok(ImageBlob {
        png: png.into_inner(),
        width,
        height,
    })
}

/// Font sizes and family for one render, derived from configuration.
#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub font_family: String,
    /// Base text size in points.
    pub base_font_pt: f64,
    pub dpi: f64,
}

impl ChartStyle {
    pub fn new(font_family: impl Into<String>, font_scale: f64, dpi: f64) -> Self {
        Self {
            font_family: font_family.into(),
            base_font_pt: 10.0 * font_scale,
            dpi,
        }
    }

    /// Pixel size of a point size at this style's dpi.
    pub fn px(&self, points: f64) -> u32 {
        (points * self.dpi / 72.0).round().max(1.0) as u32
    }

    pub fn font(&self, points: f64) -> FontDesc<'_> {
        (self.font_family.as_str(), self.px(points) as f64).into_font()
    }

    pub fn title_font(&self) -> FontDesc<'_> {
        self.font(self.base_font_pt + 4.0)
    }

    pub fn axis_label_font(&self) -> FontDesc<'_> {
        self.font(self.base_font_pt + 1.0)
    }

    pub fn tick_font(&self) -> FontDesc<'_> {
        self.font((self.base_font_pt - 2.0).max(8.0))
    }
}
