use chrono::NaiveDate;
use geo::{BoundingRect, LineString};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Raw 16-bit digital numbers as stored in a Landsat Collection 2 band
pub type DnImage = Array2<u16>;

/// Bit-packed QA_PIXEL band
pub type QaImage = Array2<u16>;

/// Real-valued raster; NaN marks a pixel with no value
pub type RealImage = Array2<f32>;

/// Per-pixel validity mask (true = valid)
pub type ValidityMask = Array2<bool>;

/// Geospatial bounding box in the working CRS
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, max_x, min_y, max_y }
    }

    /// True when the two boxes share any area or edge
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Bounds of a polygon. A polygon without vertices yields an inverted
    /// box that intersects nothing.
    pub fn of_polygon(polygon: &Polygon) -> Self {
        match polygon.bounding_rect() {
            Some(rect) => Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y),
            None => Self::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Polygon covering exactly this box
    pub fn to_polygon(&self) -> Polygon {
        Polygon::new(
            LineString::from(vec![
                (self.min_x, self.min_y),
                (self.max_x, self.min_y),
                (self.max_x, self.max_y),
                (self.min_x, self.max_y),
            ]),
            vec![],
        )
    }
}

/// Geospatial transformation parameters (GDAL ordering)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform with square pixels
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_size: f64) -> Self {
        Self {
            top_left_x,
            pixel_width: pixel_size,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height: -pixel_size,
        }
    }

    /// Ground coordinate of a pixel centre
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let c = col as f64 + 0.5;
        let r = row as f64 + 0.5;
        (
            self.top_left_x + c * self.pixel_width + r * self.rotation_x,
            self.top_left_y + c * self.rotation_y + r * self.pixel_height,
        )
    }

    /// Fractional (row, col) position of a ground coordinate.
    /// Rotation terms are ignored; grids are assumed north-up.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let col = (x - self.top_left_x) / self.pixel_width;
        let row = (y - self.top_left_y) / self.pixel_height;
        (row, col)
    }

    pub fn as_array(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }
}

/// The common grid shared by every scene and derived raster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterGrid {
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
}

impl RasterGrid {
    pub fn new(transform: GeoTransform, rows: usize, cols: usize) -> Self {
        Self { transform, rows, cols }
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Pixel size in ground units (absolute value of the x resolution)
    pub fn pixel_size(&self) -> f64 {
        self.transform.pixel_width.abs()
    }

    pub fn bounds(&self) -> BoundingBox {
        let t = &self.transform;
        let x0 = t.top_left_x;
        let x1 = t.top_left_x + self.cols as f64 * t.pixel_width;
        let y0 = t.top_left_y;
        let y1 = t.top_left_y + self.rows as f64 * t.pixel_height;
        BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// Pixel containing a ground coordinate, if it lies on the grid
    pub fn pixel_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (row, col) = self.transform.to_pixel(x, y);
        if row < 0.0 || col < 0.0 {
            return None;
        }
        let (row, col) = (row.floor() as usize, col.floor() as usize);
        if row < self.rows && col < self.cols {
            Some((row, col))
        } else {
            None
        }
    }
}

/// Area geometry in the working CRS
pub type Polygon = geo::Polygon<f64>;

/// Region of interest with the identifier used for output names
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    pub id: String,
    pub polygon: Polygon,
}

impl AreaOfInterest {
    pub fn new(id: impl Into<String>, polygon: Polygon) -> Self {
        Self { id: id.into(), polygon }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::of_polygon(&self.polygon)
    }
}

/// Half-open acquisition window: `start` included, `end` excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> CompositeResult<Self> {
        if start >= end {
            return Err(CompositeError::InvalidConfig(format!(
                "Date window start {} must precede end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Scene-level cloud cover bounds in percent, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CloudCoverRange {
    pub min: f32,
    pub max: f32,
}

impl Default for CloudCoverRange {
    fn default() -> Self {
        Self { min: 0.0, max: 100.0 }
    }
}

impl CloudCoverRange {
    pub fn new(min: f32, max: f32) -> CompositeResult<Self> {
        if !(0.0..=100.0).contains(&min) || !(0.0..=100.0).contains(&max) || min > max {
            return Err(CompositeError::InvalidConfig(format!(
                "Cloud cover bounds must satisfy 0 <= min <= max <= 100, got [{}, {}]",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, cloud_cover: f32) -> bool {
        cloud_cover >= self.min && cloud_cover <= self.max
    }
}

/// Error types for index computation and compositing
#[derive(Debug, thiserror::Error)]
pub enum CompositeError {
    #[error("Unknown satellite: {0}")]
    UnknownSatellite(String),

    #[error("Unsupported statistic: {0} (expected 'mean' or 'max')")]
    UnsupportedStatistic(String),

    #[error("No scenes satisfy the filters for window {window}")]
    EmptyCollection { window: DateWindow },

    #[error("Threshold estimation failed: {0}")]
    ThresholdEstimationFailed(String),

    #[error("Degenerate FVC thresholds: soil ({soil}) equals vegetation ({veg})")]
    DegenerateThreshold { soil: f64, veg: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Raster dimension mismatch: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Scene {scene} is missing band {band}")]
    MissingBand { scene: String, band: String },

    #[error("Processing error: {0}")]
    Processing(String),
}

impl CompositeError {
    /// Soft conditions are reported and skipped, never abort a batch
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            CompositeError::EmptyCollection { .. } | CompositeError::ThresholdEstimationFailed(_)
        )
    }
}

/// Result type for compositing operations
pub type CompositeResult<T> = Result<T, CompositeError>;
