//! Two-phase processing: build an immutable [`PipelinePlan`], then
//! [`PipelinePlan::evaluate`] it against a scene archive.
//!
//! Periods are independent. An empty or failing period is recorded in its
//! own [`PeriodOutcome`] and never affects the others.

use crate::core::collection::{CollectionFilter, SceneCollection, SceneCollectionBuilder};
use crate::core::composite::{Statistic, TemporalAggregator, TemporalComposite};
use crate::core::fvc::FractionalCoverModel;
use crate::core::index::{compute_scene_indices, SpectralIndex, SpectralIndexRaster};
use crate::core::region_stats::{Reducer, RegionStats, RegionStatsParams, RegionStatsReducer};
use crate::core::sensor::Satellite;
use crate::core::threshold::{ThresholdEstimator, ThresholdOutcome};
use crate::io::export::{output_name, ExportError, RasterExporter};
use crate::io::scene::SceneArchive;
use crate::types::{
    AreaOfInterest, BoundingBox, CloudCoverRange, CompositeError, CompositeResult, DateWindow, Polygon,
    RasterGrid, RealImage,
};
use geo::{Contains, Point};
use ndarray::Zip;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::str::FromStr;

/// Output products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Product {
    Ndvi,
    Ndbi,
    Ndwi,
    Fvc,
}

impl Product {
    pub const ALL: [Product; 4] = [Product::Ndvi, Product::Ndbi, Product::Ndwi, Product::Fvc];

    pub fn name(&self) -> &'static str {
        match self {
            Product::Ndvi => "NDVI",
            Product::Ndbi => "NDBI",
            Product::Ndwi => "NDWI",
            Product::Fvc => "FVC",
        }
    }

    /// Index composite the product is derived from
    pub fn source_index(&self) -> SpectralIndex {
        match self {
            Product::Ndvi | Product::Fvc => SpectralIndex::Ndvi,
            Product::Ndbi => SpectralIndex::Ndbi,
            Product::Ndwi => SpectralIndex::Ndwi,
        }
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Product {
    type Err = CompositeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NDVI" => Ok(Product::Ndvi),
            "NDBI" => Ok(Product::Ndbi),
            "NDWI" => Ok(Product::Ndwi),
            "FVC" => Ok(Product::Fvc),
            other => Err(CompositeError::InvalidConfig(format!("Unknown product: {}", other))),
        }
    }
}

/// A finished product raster, clipped to the AOI
#[derive(Debug, Clone)]
pub struct ProductRaster {
    pub name: String,
    pub product: Product,
    pub statistic: Statistic,
    pub window: DateWindow,
    pub grid: RasterGrid,
    pub data: RealImage,
}

/// Mean and max of a product inside the AOI
#[derive(Debug, Clone)]
pub struct ProductSummary {
    pub name: String,
    pub mean: RegionStats,
    pub max: RegionStats,
}

/// Everything produced for one completed period
#[derive(Debug)]
pub struct PeriodProducts {
    pub window: DateWindow,
    pub collection: SceneCollection,
    pub rasters: Vec<ProductRaster>,
    pub summaries: Vec<ProductSummary>,
    pub thresholds: Option<ThresholdOutcome>,
    /// Products that failed while the rest of the period succeeded
    pub failures: Vec<(Product, CompositeError)>,
}

impl PeriodProducts {
    pub fn raster(&self, product: Product) -> Option<&ProductRaster> {
        self.rasters.iter().find(|r| r.product == product)
    }

    pub fn unique_path_rows(&self) -> BTreeSet<(u16, u16)> {
        self.collection.unique_path_rows()
    }
}

#[derive(Debug)]
pub enum PeriodOutcome {
    Completed(PeriodProducts),
    /// Soft condition, e.g. no scenes in the window
    Skipped { window: DateWindow, reason: CompositeError },
    Failed { window: DateWindow, error: CompositeError },
}

impl PeriodOutcome {
    pub fn window(&self) -> &DateWindow {
        match self {
            PeriodOutcome::Completed(p) => &p.window,
            PeriodOutcome::Skipped { window, .. } | PeriodOutcome::Failed { window, .. } => window,
        }
    }

    pub fn products(&self) -> Option<&PeriodProducts> {
        match self {
            PeriodOutcome::Completed(p) => Some(p),
            _ => None,
        }
    }
}

/// Results of evaluating a plan, in period order
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<PeriodOutcome>,
}

impl BatchReport {
    pub fn completed(&self) -> impl Iterator<Item = &PeriodProducts> {
        self.outcomes.iter().filter_map(|o| o.products())
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, PeriodOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, PeriodOutcome::Failed { .. }))
            .count()
    }

    pub fn rasters(&self) -> impl Iterator<Item = &ProductRaster> {
        self.completed().flat_map(|p| p.rasters.iter())
    }

    /// Hand every product raster to an exporter
    pub fn export_all(&self, exporter: &dyn RasterExporter) -> Result<Vec<PathBuf>, ExportError> {
        self.rasters().map(|r| exporter.export(r)).collect()
    }
}

/// Immutable description of the requested work
#[derive(Debug, Clone)]
pub struct PipelinePlan {
    aoi: AreaOfInterest,
    periods: Vec<DateWindow>,
    products: Vec<Product>,
    statistic: Statistic,
    cloud_cover: CloudCoverRange,
    satellites: BTreeSet<Satellite>,
    thresholds: ThresholdEstimator,
    region: RegionStatsParams,
}

/// Builder for [`PipelinePlan`]
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    aoi: AreaOfInterest,
    periods: Vec<DateWindow>,
    products: Vec<Product>,
    statistic: Statistic,
    cloud_cover: CloudCoverRange,
    satellites: BTreeSet<Satellite>,
    thresholds: ThresholdEstimator,
    region: RegionStatsParams,
}

impl PlanBuilder {
    pub fn period(mut self, window: DateWindow) -> Self {
        self.periods.push(window);
        self
    }

    pub fn periods(mut self, windows: impl IntoIterator<Item = DateWindow>) -> Self {
        self.periods.extend(windows);
        self
    }

    pub fn products(mut self, products: impl IntoIterator<Item = Product>) -> Self {
        self.products = products.into_iter().collect();
        self
    }

    pub fn statistic(mut self, statistic: Statistic) -> Self {
        self.statistic = statistic;
        self
    }

    pub fn cloud_cover(mut self, range: CloudCoverRange) -> Self {
        self.cloud_cover = range;
        self
    }

    pub fn satellites(mut self, satellites: impl IntoIterator<Item = Satellite>) -> Self {
        self.satellites = satellites.into_iter().collect();
        self
    }

    pub fn thresholds(mut self, estimator: ThresholdEstimator) -> Self {
        self.thresholds = estimator;
        self
    }

    pub fn region_stats(mut self, params: RegionStatsParams) -> Self {
        self.region = params;
        self
    }

    pub fn build(self) -> CompositeResult<PipelinePlan> {
        if self.periods.is_empty() {
            return Err(CompositeError::InvalidConfig("At least one period is required".to_string()));
        }
        if self.products.is_empty() {
            return Err(CompositeError::InvalidConfig("At least one product is required".to_string()));
        }
        if self.satellites.is_empty() {
            return Err(CompositeError::InvalidConfig("At least one satellite must be enabled".to_string()));
        }
        // Rings are stored closed, so a triangle has four coordinates
        if self.aoi.polygon.exterior().0.len() < 4 {
            return Err(CompositeError::InvalidConfig(format!(
                "AOI '{}' polygon needs at least 3 vertices",
                self.aoi.id
            )));
        }

        self.region.validate()?;
        self.thresholds.region.validate()?;

        let mut products = self.products;
        products.sort();
        products.dedup();

        Ok(PipelinePlan {
            aoi: self.aoi,
            periods: self.periods,
            products,
            statistic: self.statistic,
            cloud_cover: self.cloud_cover,
            satellites: self.satellites,
            thresholds: self.thresholds,
            region: self.region,
        })
    }
}

impl PipelinePlan {
    pub fn builder(aoi: AreaOfInterest) -> PlanBuilder {
        PlanBuilder {
            aoi,
            periods: Vec::new(),
            products: Product::ALL.to_vec(),
            statistic: Statistic::Mean,
            cloud_cover: CloudCoverRange::default(),
            satellites: Satellite::ALL.into_iter().collect(),
            thresholds: ThresholdEstimator::default(),
            region: RegionStatsParams::default(),
        }
    }

    pub fn aoi(&self) -> &AreaOfInterest {
        &self.aoi
    }

    pub fn periods(&self) -> &[DateWindow] {
        &self.periods
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn statistic(&self) -> Statistic {
        self.statistic
    }

    pub fn satellites(&self) -> &BTreeSet<Satellite> {
        &self.satellites
    }

    pub fn thresholds(&self) -> &ThresholdEstimator {
        &self.thresholds
    }

    /// Indices that must be computed per scene to serve the products
    pub fn required_indices(&self) -> Vec<SpectralIndex> {
        let mut indices: Vec<SpectralIndex> = Vec::new();
        for product in &self.products {
            let index = product.source_index();
            if !indices.contains(&index) {
                indices.push(index);
            }
        }
        indices
    }

    /// Base names of every raster the plan would produce
    pub fn output_names(&self) -> Vec<String> {
        self.periods
            .iter()
            .flat_map(|window| {
                self.products
                    .iter()
                    .map(move |&p| output_name(&self.aoi.id, p, self.statistic, window))
            })
            .collect()
    }

    fn collection_filter(&self, window: DateWindow) -> CollectionFilter {
        CollectionFilter {
            window,
            cloud_cover: self.cloud_cover,
            satellites: self.satellites.clone(),
        }
    }

    /// Execute the plan. Periods run independently; soft conditions
    /// become `Skipped`, hard errors `Failed`.
    pub fn evaluate(&self, archive: &dyn SceneArchive) -> BatchReport {
        log::info!(
            "Evaluating plan for '{}': {} period(s), products {:?}, statistic {}",
            self.aoi.id,
            self.periods.len(),
            self.products,
            self.statistic
        );

        let run = |window: &DateWindow| -> PeriodOutcome {
            match self.evaluate_period(archive, *window) {
                Ok(products) => PeriodOutcome::Completed(products),
                Err(e) if e.is_soft() => {
                    log::warn!("Skipping period {}: {}", window, e);
                    PeriodOutcome::Skipped {
                        window: *window,
                        reason: e,
                    }
                }
                Err(e) => {
                    log::error!("Period {} failed: {}", window, e);
                    PeriodOutcome::Failed {
                        window: *window,
                        error: e,
                    }
                }
            }
        };

        #[cfg(feature = "parallel")]
        let outcomes: Vec<PeriodOutcome> = {
            use rayon::prelude::*;
            self.periods.par_iter().map(run).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<PeriodOutcome> = self.periods.iter().map(run).collect();

        BatchReport { outcomes }
    }

    /// Run a single period through collection, masking, indices,
    /// compositing and FVC derivation.
    pub fn evaluate_period(&self, archive: &dyn SceneArchive, window: DateWindow) -> CompositeResult<PeriodProducts> {
        let collection = SceneCollectionBuilder::new(archive).build(&self.aoi, &self.collection_filter(window))?;
        let grid = common_grid(&collection)?;

        let indices = self.required_indices();
        let per_scene = compute_collection_indices(&collection, &indices)?;

        // Move each scene's rasters into its index stack
        let mut stacks: HashMap<SpectralIndex, Vec<SpectralIndexRaster>> = HashMap::new();
        for raster in per_scene.into_iter().flatten() {
            stacks.entry(raster.index).or_default().push(raster);
        }

        let aggregator = TemporalAggregator::new(self.statistic);
        let mut composites: HashMap<SpectralIndex, TemporalComposite> = HashMap::new();
        for &index in &indices {
            let stack = stacks.remove(&index).unwrap_or_default();
            composites.insert(index, aggregator.aggregate(&stack)?);
        }

        let mut rasters = Vec::new();
        let mut failures = Vec::new();
        let mut thresholds = None;

        for &product in &self.products {
            let index = product.source_index();
            let composite = composites
                .get(&index)
                .ok_or_else(|| CompositeError::Processing(format!("No {} composite computed", index)))?;
            let data = match product {
                Product::Fvc => {
                    let outcome = self.thresholds.resolve(&composite.data, &grid, &self.aoi);
                    thresholds = Some(outcome.clone());
                    match FractionalCoverModel::new(outcome.pair) {
                        Ok(model) => model.apply(&composite.data),
                        Err(e) => {
                            log::error!("FVC for period {} not computed: {}", window, e);
                            failures.push((product, e));
                            continue;
                        }
                    }
                }
                _ => composite.data.clone(),
            };

            rasters.push(ProductRaster {
                name: output_name(&self.aoi.id, product, self.statistic, &window),
                product,
                statistic: self.statistic,
                window,
                grid,
                data: clip_to_polygon(&data, &grid, &self.aoi.polygon),
            });
        }

        let reducer = RegionStatsReducer::new(self.region);
        let summaries = rasters
            .iter()
            .map(|r| {
                Ok(ProductSummary {
                    name: r.name.clone(),
                    mean: reducer.reduce(&r.data, &grid, &self.aoi.polygon, &Reducer::Mean)?,
                    max: reducer.reduce(&r.data, &grid, &self.aoi.polygon, &Reducer::Max)?,
                })
            })
            .collect::<CompositeResult<Vec<_>>>()?;

        log::info!(
            "Period {} complete: {} product(s), {} failure(s)",
            window,
            rasters.len(),
            failures.len()
        );

        Ok(PeriodProducts {
            window,
            collection,
            rasters,
            summaries,
            thresholds,
            failures,
        })
    }
}

/// All scenes of a collection must share one grid
fn common_grid(collection: &SceneCollection) -> CompositeResult<RasterGrid> {
    let first = collection
        .scenes()
        .first()
        .ok_or(CompositeError::EmptyCollection {
            window: *collection.window(),
        })?;
    let grid = first.grid;
    if let Some(other) = collection.scenes().iter().find(|s| s.grid != grid) {
        return Err(CompositeError::Processing(format!(
            "Scene {} is not on the grid of scene {}",
            other.product_id, first.product_id
        )));
    }
    Ok(grid)
}

/// Mask and compute indices for every scene; scenes are independent
fn compute_collection_indices(
    collection: &SceneCollection,
    indices: &[SpectralIndex],
) -> CompositeResult<Vec<Vec<SpectralIndexRaster>>> {
    #[cfg(feature = "parallel")]
    let results: CompositeResult<Vec<Vec<SpectralIndexRaster>>> = {
        use rayon::prelude::*;
        collection
            .scenes()
            .par_iter()
            .map(|scene| compute_scene_indices(scene, indices))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let results: CompositeResult<Vec<Vec<SpectralIndexRaster>>> = collection
        .scenes()
        .iter()
        .map(|scene| compute_scene_indices(scene, indices))
        .collect();

    results
}

/// Set pixels whose centre falls outside the polygon to no value
pub fn clip_to_polygon(data: &RealImage, grid: &RasterGrid, polygon: &Polygon) -> RealImage {
    let bbox = BoundingBox::of_polygon(polygon);
    let mut clipped = data.clone();
    Zip::indexed(&mut clipped).for_each(|(row, col), v| {
        let (x, y) = grid.transform.pixel_center(row, col);
        if !bbox.contains(x, y) || !polygon.contains(&Point::new(x, y)) {
            *v = f32::NAN;
        }
    });
    clipped
}
