use crate::core::sensor::Satellite;
use crate::types::{
    BoundingBox, CompositeError, CompositeResult, DnImage, QaImage, RasterGrid,
};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Fields encoded in a Landsat Collection 2 product identifier,
/// e.g. `LC08_L2SP_123032_20200115_20200823_02_T1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductId {
    pub satellite: Satellite,
    pub processing_level: String,
    pub path: u16,
    pub row: u16,
    pub acquisition_date: NaiveDate,
    pub processing_date: NaiveDate,
    pub collection: u8,
    pub tier: String,
}

impl ProductId {
    pub fn parse(product_id: &str) -> CompositeResult<Self> {
        let re = Regex::new(
            r"^(L[CTEO]0[4-9])_(L[12][A-Z]{2})_(\d{3})(\d{3})_(\d{8})_(\d{8})_(\d{2})_(T1|T2|RT)$",
        )
        .map_err(|e| CompositeError::Processing(format!("Regex error: {}", e)))?;

        let caps = re.captures(product_id.trim()).ok_or_else(|| {
            CompositeError::InvalidConfig(format!("Malformed Landsat product id: {}", product_id))
        })?;

        let parse_date = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|e| {
                CompositeError::InvalidConfig(format!("Bad date '{}' in {}: {}", s, product_id, e))
            })
        };
        let parse_num = |s: &str| {
            s.parse::<u16>().map_err(|e| {
                CompositeError::InvalidConfig(format!("Bad number '{}' in {}: {}", s, product_id, e))
            })
        };

        Ok(Self {
            satellite: caps[1].parse()?,
            processing_level: caps[2].to_string(),
            path: parse_num(&caps[3])?,
            row: parse_num(&caps[4])?,
            acquisition_date: parse_date(&caps[5])?,
            processing_date: parse_date(&caps[6])?,
            collection: parse_num(&caps[7])? as u8,
            tier: caps[8].to_string(),
        })
    }
}

/// One immutable satellite observation on the common grid
#[derive(Debug, Clone)]
pub struct Scene {
    pub product_id: String,
    pub satellite: Satellite,
    pub acquired: DateTime<Utc>,
    pub path: u16,
    pub row: u16,
    pub cloud_cover: f32,
    pub footprint: BoundingBox,
    pub grid: RasterGrid,
    bands: HashMap<String, DnImage>,
    qa: QaImage,
}

impl Scene {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        product_id: impl Into<String>,
        satellite: Satellite,
        acquired: DateTime<Utc>,
        path_row: (u16, u16),
        cloud_cover: f32,
        grid: RasterGrid,
        bands: HashMap<String, DnImage>,
        qa: QaImage,
    ) -> CompositeResult<Self> {
        let expected = grid.dim();
        for band in bands.values().chain(std::iter::once(&qa)) {
            if band.dim() != expected {
                return Err(CompositeError::DimensionMismatch {
                    expected,
                    found: band.dim(),
                });
            }
        }

        Ok(Self {
            product_id: product_id.into(),
            satellite,
            acquired,
            path: path_row.0,
            row: path_row.1,
            cloud_cover,
            footprint: grid.bounds(),
            grid,
            bands,
            qa,
        })
    }

    /// Build a scene whose satellite and path/row come from its product id.
    /// The acquisition date in the id must match `acquired`.
    pub fn from_product_id(
        product_id: &str,
        acquired: DateTime<Utc>,
        cloud_cover: f32,
        grid: RasterGrid,
        bands: HashMap<String, DnImage>,
        qa: QaImage,
    ) -> CompositeResult<Self> {
        let parsed = ProductId::parse(product_id)?;
        if parsed.acquisition_date != acquired.date_naive() {
            return Err(CompositeError::InvalidConfig(format!(
                "Product id {} is dated {} but acquisition time is {}",
                product_id, parsed.acquisition_date, acquired
            )));
        }
        Self::new(
            product_id,
            parsed.satellite,
            acquired,
            (parsed.path, parsed.row),
            cloud_cover,
            grid,
            bands,
            qa,
        )
    }

    /// Override the footprint (defaults to the grid bounds)
    pub fn with_footprint(mut self, footprint: BoundingBox) -> Self {
        self.footprint = footprint;
        self
    }

    pub fn band(&self, name: &str) -> CompositeResult<&DnImage> {
        self.bands.get(name).ok_or_else(|| CompositeError::MissingBand {
            scene: self.product_id.clone(),
            band: name.to_string(),
        })
    }

    pub fn band_names(&self) -> impl Iterator<Item = &str> {
        self.bands.keys().map(|k| k.as_str())
    }

    pub fn qa(&self) -> &QaImage {
        &self.qa
    }

    pub fn acquisition_date(&self) -> NaiveDate {
        self.acquired.date_naive()
    }
}

/// Source of scenes for one mission. Implementations must be shareable
/// across the worker threads that evaluate periods.
pub trait SceneArchive: Sync {
    fn scenes(&self, satellite: Satellite) -> CompositeResult<Vec<Arc<Scene>>>;
}

/// Archive holding scenes already materialized in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryArchive {
    scenes: Vec<Arc<Scene>>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, scene: Scene) {
        self.scenes.push(Arc::new(scene));
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

impl FromIterator<Scene> for InMemoryArchive {
    fn from_iter<I: IntoIterator<Item = Scene>>(iter: I) -> Self {
        Self {
            scenes: iter.into_iter().map(Arc::new).collect(),
        }
    }
}

impl SceneArchive for InMemoryArchive {
    fn scenes(&self, satellite: Satellite) -> CompositeResult<Vec<Arc<Scene>>> {
        Ok(self
            .scenes
            .iter()
            .filter(|s| s.satellite == satellite)
            .cloned()
            .collect())
    }
}
