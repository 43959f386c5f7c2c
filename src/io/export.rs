//! Raster product export
//!
//! Export failures use [`ExportError`], kept apart from computation errors.

use crate::core::composite::Statistic;
use crate::core::pipeline::{Product, ProductRaster};
use crate::types::{DateWindow, GeoTransform};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Errors raised while writing products or catalogs
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Canonical product base name:
/// `<area>_<PRODUCT>_<statistic>_<YYYYMMDD>_<YYYYMMDD>`.
/// The second date is the exclusive window end.
pub fn output_name(area: &str, product: Product, statistic: Statistic, window: &DateWindow) -> String {
    format!(
        "{}_{}_{}_{}_{}",
        area,
        product.name(),
        statistic.name(),
        window.start.format("%Y%m%d"),
        window.end.format("%Y%m%d")
    )
}

/// Sink for finished product rasters
pub trait RasterExporter {
    /// Write one product and return the path written
    fn export(&self, raster: &ProductRaster) -> Result<PathBuf, ExportError>;
}

/// Descriptive metadata written next to each product
#[derive(Debug, Clone, Serialize)]
pub struct ProductMetadata {
    pub name: String,
    pub product: String,
    pub statistic: String,
    pub start_date: String,
    pub end_date_exclusive: String,
    pub rows: usize,
    pub cols: usize,
    pub geo_transform: GeoTransform,
    pub valid_pixels: usize,
    pub min: Option<f32>,
    pub max: Option<f32>,
}

impl ProductMetadata {
    pub fn from_raster(raster: &ProductRaster) -> Self {
        let valid: Vec<f32> = raster.data.iter().copied().filter(|v| v.is_finite()).collect();
        let (rows, cols) = raster.data.dim();
        Self {
            name: raster.name.clone(),
            product: raster.product.name().to_string(),
            statistic: raster.statistic.name().to_string(),
            start_date: raster.window.start.to_string(),
            end_date_exclusive: raster.window.end.to_string(),
            rows,
            cols,
            geo_transform: raster.grid.transform,
            valid_pixels: valid.len(),
            min: valid.iter().copied().reduce(f32::min),
            max: valid.iter().copied().reduce(f32::max),
        }
    }
}

/// Writes `<name>.json` metadata files
#[derive(Debug, Clone)]
pub struct MetadataExporter {
    output_dir: PathBuf,
}

impl MetadataExporter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

impl RasterExporter for MetadataExporter {
    fn export(&self, raster: &ProductRaster) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{}.json", raster.name));
        let json = serde_json::to_string_pretty(&ProductMetadata::from_raster(raster))?;
        std::fs::write(&path, json)?;
        log::info!("Wrote product metadata {}", path.display());
        Ok(path)
    }
}

/// Single-band float32 GeoTIFF writer, NaN as nodata
#[cfg(feature = "gdal")]
#[derive(Debug, Clone)]
pub struct GeoTiffExporter {
    output_dir: PathBuf,
    epsg: u32,
    compression: Option<String>,
}

#[cfg(feature = "gdal")]
impl GeoTiffExporter {
    pub fn new<P: AsRef<Path>>(output_dir: P, epsg: u32) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            epsg,
            compression: Some("DEFLATE".to_string()),
        }
    }

    pub fn with_compression(mut self, compression: Option<&str>) -> Self {
        self.compression = compression.map(|c| c.to_string());
        self
    }
}

#[cfg(feature = "gdal")]
impl RasterExporter for GeoTiffExporter {
    fn export(&self, raster: &ProductRaster) -> Result<PathBuf, ExportError> {
        use gdal::raster::{Buffer, RasterCreationOption};
        use gdal::spatial_ref::SpatialRef;
        use gdal::DriverManager;

        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{}.tif", raster.name));
        let (height, width) = raster.data.dim();

        let mut options = vec![RasterCreationOption {
            key: "TILED",
            value: "YES",
        }];
        if let Some(comp) = self.compression.as_deref() {
            options.push(RasterCreationOption {
                key: "COMPRESS",
                value: comp,
            });
        }

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset = driver.create_with_band_type_with_options::<f32, _>(
            &path,
            width as isize,
            height as isize,
            1,
            &options,
        )?;

        dataset.set_geo_transform(&raster.grid.transform.as_array())?;
        dataset.set_spatial_ref(&SpatialRef::from_epsg(self.epsg)?)?;

        let mut band = dataset.rasterband(1)?;
        let flat: Vec<f32> = raster.data.iter().copied().collect();
        band.write((0, 0), (width, height), &Buffer::new((width, height), flat))?;
        band.set_no_data_value(Some(f64::NAN))?;

        log::info!("Wrote GeoTIFF {}", path.display());
        Ok(path)
    }
}
