use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageError, RgbaImage};
use rayon::prelude::*;
use rfd::FileDialog;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::canvas::{CellPos, GridState, MAX_GRID_DIM, MIN_GRID_DIM};
use crate::components::colors::Color;

pub const GRID_FILE_VERSION: &str = "1.0";

/// Pixels per cell at resolution 1.
pub const BASE_CELL_PX: u32 = 20;
pub const MAX_EXPORT_RESOLUTION: u32 = 8;
pub const JPEG_QUALITY: u8 = 90;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum GridFileError {
    Io(std::io::Error),
    Json(serde_json::Error),
    InvalidFormat(String),
}

impl std::fmt::Display for GridFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridFileError::Io(e) => write!(f, "I/O error: {}", e),
            GridFileError::Json(e) => write!(f, "Malformed grid file: {}", e),
            GridFileError::InvalidFormat(e) => write!(f, "Invalid grid file: {}", e),
        }
    }
}

impl std::error::Error for GridFileError {}

impl From<std::io::Error> for GridFileError {
    fn from(e: std::io::Error) -> Self {
        GridFileError::Io(e)
    }
}

impl From<serde_json::Error> for GridFileError {
    fn from(e: serde_json::Error) -> Self {
        GridFileError::Json(e)
    }
}

#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Image(ImageError),
    InvalidOptions(String),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Io(e) => write!(f, "I/O error: {}", e),
            ExportError::Image(e) => write!(f, "Image encoding failed: {}", e),
            ExportError::InvalidOptions(e) => write!(f, "Invalid export options: {}", e),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

impl From<ImageError> for ExportError {
    fn from(e: ImageError) -> Self {
        ExportError::Image(e)
    }
}

// ============================================================================
// GRID FILE (.json)
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CellRecord {
    pub row: i64,
    pub col: i64,
    /// Missing colors leave the cell at background.
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridFile {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
    pub rows: i64,
    pub cols: i64,
    pub cells: Vec<CellRecord>,
    #[serde(default)]
    pub palette: Vec<String>,
}

fn default_version() -> String {
    GRID_FILE_VERSION.to_string()
}

/// Result of a successful, fully validated load.
#[derive(Clone, Debug)]
pub struct LoadedGrid {
    pub name: Option<String>,
    pub grid: GridState,
    pub palette: Vec<Color>,
}

impl GridFile {
    /// Every cell, row-major, plus the palette in display order.
    pub fn from_grid(name: &str, grid: &GridState, palette: &[Color]) -> Self {
        Self {
            version: default_version(),
            name: name.to_string(),
            created_at: Some(chrono::Local::now().to_rfc3339()),
            rows: grid.rows() as i64,
            cols: grid.cols() as i64,
            cells: grid
                .positions()
                .zip(grid.cells())
                .map(|(pos, color)| CellRecord {
                    row: pos.row as i64,
                    col: pos.col as i64,
                    color: Some(color.to_hex()),
                })
                .collect(),
            palette: palette.iter().map(|c| c.to_hex()).collect(),
        }
    }

    /// Check everything before building anything, so a bad file never
    /// produces a half-applied grid.
    pub fn validate(&self) -> Result<LoadedGrid, GridFileError> {
        let bounds = MIN_GRID_DIM as i64..=MAX_GRID_DIM as i64;
        if !bounds.contains(&self.rows) || !bounds.contains(&self.cols) {
            return Err(GridFileError::InvalidFormat(format!(
                "grid size {}x{} outside {}..={}",
                self.rows, self.cols, MIN_GRID_DIM, MAX_GRID_DIM
            )));
        }

        let mut grid = GridState::new(self.rows as usize, self.cols as usize);
        let mut skipped = 0usize;
        for cell in &self.cells {
            let Some(hex) = cell.color.as_deref() else { continue };
            let color = Color::parse(hex)
                .map_err(|e| GridFileError::InvalidFormat(format!("cell ({}, {}): {}", cell.row, cell.col, e)))?;
            if cell.row < 0 || cell.col < 0 {
                skipped += 1;
                continue;
            }
            let pos = CellPos::new(cell.row as usize, cell.col as usize);
            if !grid.in_bounds(pos) {
                skipped += 1;
                continue;
            }
            grid.set(pos, color);
        }
        if skipped > 0 {
            crate::log_warn!("Grid file: ignored {} out-of-bounds cells", skipped);
        }

        let palette = self
            .palette
            .iter()
            .map(|hex| Color::parse(hex).map_err(|e| GridFileError::InvalidFormat(format!("palette: {}", e))))
            .collect::<Result<Vec<_>, _>>()?;

        let name = Some(self.name.trim().to_string()).filter(|n| !n.is_empty());
        Ok(LoadedGrid { name, grid, palette })
    }
}

pub fn parse_grid_file(json: &str) -> Result<LoadedGrid, GridFileError> {
    let file: GridFile = serde_json::from_str(json)?;
    file.validate()
}

pub fn load_grid_file(path: &Path) -> Result<LoadedGrid, GridFileError> {
    let reader = BufReader::new(File::open(path)?);
    let file: GridFile = serde_json::from_reader(reader)?;
    let loaded = file.validate();
    match &loaded {
        Ok(l) => crate::log_info!(
            "Loaded grid file {} ({}x{})",
            path.display(),
            l.grid.rows(),
            l.grid.cols()
        ),
        Err(e) => crate::log_warn!("Rejected grid file {}: {}", path.display(), e),
    }
    loaded
}

pub fn save_grid_file(path: &Path, file: &GridFile) -> Result<(), GridFileError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, file)?;
    crate::log_info!("Saved grid file {}", path.display());
    Ok(())
}

// ============================================================================
// IMAGE EXPORT
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    /// Multiplier on [`BASE_CELL_PX`], `1..=MAX_EXPORT_RESOLUTION`.
    pub resolution: u32,
    pub include_grid_lines: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            resolution: 1,
            include_grid_lines: false,
        }
    }
}

impl ExportOptions {
    pub fn cell_px(&self) -> u32 {
        BASE_CELL_PX * self.resolution
    }

    pub fn line_px(&self) -> u32 {
        (self.resolution / 2).max(1)
    }

    fn check(&self) -> Result<(), ExportError> {
        if !(1..=MAX_EXPORT_RESOLUTION).contains(&self.resolution) {
            return Err(ExportError::InvalidOptions(format!(
                "resolution {} outside 1..={}",
                self.resolution, MAX_EXPORT_RESOLUTION
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }

    /// Format implied by `path`'s extension, or an error naming the path.
    pub fn for_path(path: &Path) -> Result<Self, ExportError> {
        Self::from_path(path)
            .ok_or_else(|| ExportError::InvalidOptions(format!("unsupported file type: {}", path.display())))
    }
}

/// Rasterize the grid.  Grid lines sit on the leading edge of every cell,
/// plus a closing line on the right and bottom border.
pub fn render_grid_image(grid: &GridState, options: &ExportOptions) -> Result<RgbaImage, ExportError> {
    options.check()?;
    let cell = options.cell_px();
    let line = options.line_px();
    let width = grid.cols() as u32 * cell;
    let height = grid.rows() as u32 * cell;
    let on_line = |v: u32, extent: u32| options.include_grid_lines && (v % cell < line || v >= extent - line);

    let mut buf = vec![0u8; (width * height * 4) as usize];
    buf.par_chunks_mut((width * 4) as usize).enumerate().for_each(|(y, row_px)| {
        let y = y as u32;
        let row = (y / cell) as usize;
        let row_line = on_line(y, height);
        for (x, px) in row_px.chunks_exact_mut(4).enumerate() {
            let x = x as u32;
            let color = if row_line || on_line(x, width) {
                Color::GRID_LINE
            } else {
                grid.get(CellPos::new(row, (x / cell) as usize)).unwrap_or(Color::BACKGROUND)
            };
            px.copy_from_slice(&color.to_rgba().0);
        }
    });

    RgbaImage::from_raw(width, height, buf)
        .ok_or_else(|| ExportError::InvalidOptions(format!("image buffer {}x{} could not be built", width, height)))
}

/// Encode and write an image in `format`, whatever the path's extension says.
pub fn encode_and_write(image: &RgbaImage, path: &Path, format: ImageFormat) -> Result<(), ExportError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        ImageFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            #[allow(deprecated)]
            encoder.encode(image.as_raw(), image.width(), image.height(), image::ColorType::Rgba8)?;
        }
        ImageFormat::Jpeg => {
            // JPEG doesn't support alpha, convert to RGB
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
            encoder.encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                image::ColorType::Rgb8,
            )?;
        }
    }
    Ok(())
}

pub fn export_image(
    grid: &GridState,
    path: &Path,
    format: ImageFormat,
    options: &ExportOptions,
) -> Result<(), ExportError> {
    let image = render_grid_image(grid, options)?;
    match encode_and_write(&image, path, format) {
        Ok(()) => {
            crate::log_info!(
                "Exported {}x{} {:?} image to {} (resolution {}x, grid lines {})",
                image.width(),
                image.height(),
                format,
                path.display(),
                options.resolution,
                options.include_grid_lines
            );
            Ok(())
        }
        Err(e) => {
            crate::log_err!("Export to {} failed: {}", path.display(), e);
            Err(e)
        }
    }
}

// ============================================================================
// NATIVE DIALOGS
// ============================================================================

pub fn pick_open_path() -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("Crochet Pattern", &["json"])
        .add_filter("All Files", &["*"])
        .pick_file()
}

pub fn pick_save_path(default_name: &str) -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("Crochet Pattern", &["json"])
        .set_file_name(format!("{}.json", default_name))
        .save_file()
}

pub fn pick_export_path(default_name: &str) -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("PNG", &["png"])
        .add_filter("JPEG", &["jpg", "jpeg"])
        .set_file_name(format!("{}.png", default_name))
        .save_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    const RED: Color = Color::rgb(0xFF, 0, 0);

    fn temp_path(ext: &str) -> PathBuf {
        std::env::temp_dir().join(format!("crochetfe_io_{}.{}", uuid::Uuid::new_v4(), ext))
    }

    #[test]
    fn grid_file_round_trips() {
        let mut grid = GridState::new(6, 7);
        grid.set(CellPos::new(5, 6), RED);
        let file = GridFile::from_grid("scarf", &grid, &[RED, Color::BLACK]);
        let path = temp_path("json");
        save_grid_file(&path, &file).unwrap();

        let loaded = load_grid_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.name.as_deref(), Some("scarf"));
        assert_eq!(loaded.grid.cells(), grid.cells());
        assert_eq!(loaded.palette, vec![RED, Color::BLACK]);
    }

    #[test]
    fn saved_json_uses_camel_case_fields() {
        let file = GridFile::from_grid("x", &GridState::new(5, 5), &[]);
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["version"], "1.0");
        assert!(json["createdAt"].is_string());
        assert_eq!(json["cells"].as_array().map(Vec::len), Some(25));
        assert_eq!(json["cells"][0]["color"], "#FFFFFF");
    }

    #[test]
    fn missing_fields_are_rejected() {
        assert!(matches!(parse_grid_file(r#"{"rows": 5, "cols": 5}"#), Err(GridFileError::Json(_))));
        assert!(matches!(
            parse_grid_file(r#"{"rows": "5", "cols": 5, "cells": []}"#),
            Err(GridFileError::Json(_))
        ));
        assert!(parse_grid_file("not json").is_err());
    }

    #[test]
    fn bad_sizes_and_colors_are_rejected() {
        assert!(matches!(
            parse_grid_file(r#"{"rows": 4, "cols": 5, "cells": []}"#),
            Err(GridFileError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_grid_file(r##"{"rows": 5, "cols": 5, "cells": [{"row": 0, "col": 0, "color": "red"}]}"##),
            Err(GridFileError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_grid_file(r##"{"rows": 5, "cols": 5, "cells": [], "palette": ["#12"]}"##),
            Err(GridFileError::InvalidFormat(_))
        ));
    }

    #[test]
    fn out_of_bounds_cells_are_ignored() {
        let loaded = parse_grid_file(
            r##"{"rows": 5, "cols": 5, "cells": [
                {"row": 9, "col": 0, "color": "#FF0000"},
                {"row": -1, "col": 0, "color": "#FF0000"},
                {"row": 1, "col": 1, "color": "#ff0000"},
                {"row": 2, "col": 2}
            ]}"##,
        )
        .unwrap();
        assert_eq!(loaded.grid.non_background_count(), 1);
        assert_eq!(loaded.grid.get(CellPos::new(1, 1)), Some(RED));
        assert!(loaded.palette.is_empty());
        assert_eq!(loaded.name, None);
    }

    #[test]
    fn render_paints_cells_and_grid_lines() {
        let mut grid = GridState::new(5, 5);
        grid.set(CellPos::new(0, 1), RED);
        let plain = render_grid_image(&grid, &ExportOptions::default()).unwrap();
        assert_eq!(plain.dimensions(), (100, 100));
        assert_eq!(plain.get_pixel(25, 5).0, [0xFF, 0, 0, 255]);
        assert_eq!(plain.get_pixel(0, 0).0, [0xFF, 0xFF, 0xFF, 255]);

        let lined = render_grid_image(&grid, &ExportOptions { resolution: 4, include_grid_lines: true }).unwrap();
        assert_eq!(lined.dimensions(), (400, 400));
        assert_eq!(lined.get_pixel(80, 30).0, Color::GRID_LINE.to_rgba().0);
        assert_eq!(lined.get_pixel(81, 30).0, Color::GRID_LINE.to_rgba().0);
        assert_eq!(lined.get_pixel(82, 30).0, [0xFF, 0, 0, 255]);
        assert_eq!(lined.get_pixel(399, 200).0, Color::GRID_LINE.to_rgba().0);
    }

    #[test]
    fn invalid_resolution_and_extension_fail() {
        let grid = GridState::new(5, 5);
        let opts = ExportOptions { resolution: 0, include_grid_lines: false };
        assert!(matches!(render_grid_image(&grid, &opts), Err(ExportError::InvalidOptions(_))));
        assert!(matches!(
            ImageFormat::for_path(&temp_path("gif")),
            Err(ExportError::InvalidOptions(_))
        ));
    }

    #[test]
    fn export_writes_png_and_jpeg() {
        let grid = GridState::new(5, 5);
        for ext in ["png", "jpg"] {
            let path = temp_path(ext);
            let format = ImageFormat::for_path(&path).unwrap();
            export_image(&grid, &path, format, &ExportOptions::default()).unwrap();
            let decoded = image::open(&path).unwrap();
            let _ = std::fs::remove_file(&path);
            assert_eq!(decoded.dimensions(), (100, 100));
        }
    }

    #[test]
    fn explicit_format_overrides_extension() {
        let grid = GridState::new(5, 5);
        let path = temp_path("png");
        export_image(&grid, &path, ImageFormat::Jpeg, &ExportOptions::default()).unwrap();
        let guessed = image::io::Reader::open(&path).unwrap().with_guessed_format().unwrap().format();
        let _ = std::fs::remove_file(&path);
        assert_eq!(guessed, Some(image::ImageFormat::Jpeg));

        let bare = temp_path("out").with_extension("");
        export_image(&grid, &bare, ImageFormat::Png, &ExportOptions::default()).unwrap();
        let guessed = image::io::Reader::open(&bare).unwrap().with_guessed_format().unwrap().format();
        let _ = std::fs::remove_file(&bare);
        assert_eq!(guessed, Some(image::ImageFormat::Png));
    }
}
