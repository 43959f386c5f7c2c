use crate::core::collection::SceneCollection;
use crate::io::export::ExportError;
use chrono::{Datelike, Duration};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Local time zone used for the secondary acquisition time column
const LOCAL_OFFSET_HOURS: i64 = 8;

/// One row of the scene metadata catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogRow {
    #[serde(rename = "No")]
    pub sequence: usize,
    #[serde(rename = "SceneID")]
    pub scene_id: String,
    #[serde(rename = "CloudCover")]
    pub cloud_cover: f32,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "TimeUTC")]
    pub time_utc: String,
    #[serde(rename = "TimeUTC8")]
    pub time_utc8: String,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: u32,
    #[serde(rename = "Path")]
    pub path: u16,
    #[serde(rename = "Row")]
    pub row: u16,
}

/// Catalog rows ordered by acquisition time, numbered from 1
pub fn build_catalog(collection: &SceneCollection) -> Vec<CatalogRow> {
    let mut scenes: Vec<_> = collection.scenes().iter().collect();
    scenes.sort_by(|a, b| a.acquired.cmp(&b.acquired).then_with(|| a.product_id.cmp(&b.product_id)));

    scenes
        .into_iter()
        .enumerate()
        .map(|(i, scene)| {
            let local = scene.acquired.naive_utc() + Duration::hours(LOCAL_OFFSET_HOURS);
            CatalogRow {
                sequence: i + 1,
                scene_id: scene.product_id.clone(),
                cloud_cover: scene.cloud_cover,
                date: scene.acquired.format("%Y-%m-%d").to_string(),
                time_utc: scene.acquired.format("%H:%M:%S").to_string(),
                time_utc8: local.format("%H:%M:%S").to_string(),
                year: scene.acquired.year(),
                month: scene.acquired.month(),
                path: scene.path,
                row: scene.row,
            }
        })
        .collect()
}

/// Write catalog rows as CSV with a header line
pub fn write_catalog<W: Write>(rows: &[CatalogRow], writer: W) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_catalog_file<P: AsRef<Path>>(rows: &[CatalogRow], path: P) -> Result<(), ExportError> {
    let file = std::fs::File::create(path.as_ref())?;
    write_catalog(rows, file)?;
    log::info!("Wrote {} catalog row(s) to {}", rows.len(), path.as_ref().display());
    Ok(())
}
