use approx::assert_abs_diff_eq;
use chrono::{NaiveDate, TimeZone, Utc};
use landcomp::core::threshold::{ThresholdEstimator, ThresholdMode, ThresholdPair, ThresholdSource};
use landcomp::core::{PeriodOutcome, PipelinePlan, Product, Statistic};
use landcomp::io::{InMemoryArchive, Scene};
use landcomp::types::{AreaOfInterest, BoundingBox, CompositeError, DateWindow, GeoTransform, RasterGrid};
use ndarray::Array2;
use std::collections::HashMap;

const SIZE: usize = 4;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn grid() -> RasterGrid {
    RasterGrid::new(GeoTransform::north_up(0.0, 120.0, 30.0), SIZE, SIZE)
}

fn aoi() -> AreaOfInterest {
    AreaOfInterest::new("farm", BoundingBox::new(0.0, 0.0, 120.0, 120.0).to_polygon())
}

fn window(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateWindow {
    DateWindow::new(
        NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
        NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
    )
    .unwrap()
}

/// DN whose rescaled reflectance is `reflectance`
fn dn(reflectance: f32) -> u16 {
    ((reflectance + 0.2) / 0.000_027_5).round() as u16
}

fn band(reflectance: f32) -> Array2<u16> {
    Array2::from_elem((SIZE, SIZE), dn(reflectance))
}

/// Scene with uniform green/red/nir/swir1 reflectance under the band
/// names of its sensor generation
fn scene(id: &str, day: (i32, u32, u32), green: f32, red: f32, nir: f32, swir1: f32, qa: Array2<u16>) -> Scene {
    let legacy = id.starts_with("LT05") || id.starts_with("LE07");
    let names = if legacy {
        ["SR_B2", "SR_B3", "SR_B4", "SR_B5"]
    } else {
        ["SR_B3", "SR_B4", "SR_B5", "SR_B6"]
    };
    let mut bands = HashMap::new();
    for (name, value) in names.iter().zip([green, red, nir, swir1]) {
        bands.insert(name.to_string(), band(value));
    }
    let acquired = Utc.with_ymd_and_hms(day.0, day.1, day.2, 2, 58, 10).unwrap();
    Scene::from_product_id(id, acquired, 10.0, grid(), bands, qa).unwrap()
}

fn clear_qa() -> Array2<u16> {
    Array2::from_elem((SIZE, SIZE), 0b0_0001)
}

fn archive() -> InMemoryArchive {
    let mut cloudy = clear_qa();
    cloudy[[0, 0]] = 1 << 4;

    [
        scene(
            "LC08_L2SP_123032_20200705_20200721_02_T1",
            (2020, 7, 5),
            0.1,
            0.1,
            0.3,
            0.2,
            clear_qa(),
        ),
        scene(
            "LC08_L2SP_123032_20200721_20200807_02_T1",
            (2020, 7, 21),
            0.1,
            0.1,
            0.5,
            0.2,
            cloudy,
        ),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_empty_period_is_skipped_and_next_period_completes() {
    init_logging();

    let plan = PipelinePlan::builder(aoi())
        .period(window((2020, 1, 1), (2020, 2, 1)))
        .period(window((2020, 7, 1), (2020, 8, 1)))
        .build()
        .unwrap();

    let report = plan.evaluate(&archive());
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(report.failed_count(), 0);

    match &report.outcomes[0] {
        PeriodOutcome::Skipped { reason, .. } => {
            assert!(matches!(reason, CompositeError::EmptyCollection { .. }))
        }
        other => panic!("expected skipped period, got {:?}", other),
    }

    let products = report.outcomes[1].products().expect("second period completes");
    assert_eq!(products.collection.len(), 2);
    assert_eq!(products.unique_path_rows().len(), 1);
    assert!(products.failures.is_empty());
    assert_eq!(products.rasters.len(), 4);

    // NDVI 0.5 and 0.6667; the cloudy pixel only sees the first scene
    let ndvi = products.raster(Product::Ndvi).unwrap();
    assert_eq!(ndvi.name, "farm_NDVI_mean_20200701_20200801");
    assert_abs_diff_eq!(ndvi.data[[0, 0]], 0.5, epsilon = 1e-3);
    assert_abs_diff_eq!(ndvi.data[[2, 3]], (0.5 + 2.0 / 3.0) / 2.0, epsilon = 1e-3);

    let ndwi = products.raster(Product::Ndwi).unwrap();
    assert_abs_diff_eq!(ndwi.data[[0, 0]], -0.5, epsilon = 1e-3);

    let ndbi = products.raster(Product::Ndbi).unwrap();
    assert_abs_diff_eq!(ndbi.data[[1, 1]], (-0.2 + -3.0 / 7.0) / 2.0, epsilon = 1e-3);

    let fvc = products.raster(Product::Fvc).unwrap();
    assert_abs_diff_eq!(fvc.data[[0, 0]], (0.5 - 0.2) / 0.66, epsilon = 1e-3);
    assert_abs_diff_eq!(fvc.data[[3, 3]], ((0.5 + 2.0 / 3.0) / 2.0 - 0.2) / 0.66, epsilon = 1e-3);

    let thresholds = products.thresholds.as_ref().unwrap();
    assert_eq!(thresholds.source, ThresholdSource::Fixed);

    let summary = products.summaries.iter().find(|s| s.name == ndvi.name).unwrap();
    assert_abs_diff_eq!(summary.max.value().unwrap(), (0.5 + 2.0 / 3.0) / 2.0, epsilon = 1e-3);
}

#[test]
fn test_max_statistic() {
    init_logging();

    let plan = PipelinePlan::builder(aoi())
        .period(window((2020, 7, 1), (2020, 8, 1)))
        .products([Product::Ndvi])
        .statistic(Statistic::Max)
        .build()
        .unwrap();

    let report = plan.evaluate(&archive());
    let products = report.completed().next().unwrap();
    let ndvi = products.raster(Product::Ndvi).unwrap();
    assert_eq!(ndvi.name, "farm_NDVI_max_20200701_20200801");
    assert_abs_diff_eq!(ndvi.data[[0, 0]], 0.5, epsilon = 1e-3);
    assert_abs_diff_eq!(ndvi.data[[1, 2]], 2.0 / 3.0, epsilon = 1e-3);
}

#[test]
fn test_degenerate_fvc_keeps_other_products() {
    init_logging();

    let plan = PipelinePlan::builder(aoi())
        .period(window((2020, 7, 1), (2020, 8, 1)))
        .thresholds(ThresholdEstimator::fixed(ThresholdPair {
            ndvi_soil: 0.4,
            ndvi_veg: 0.4,
        }))
        .build()
        .unwrap();

    let report = plan.evaluate(&archive());
    let products = report.completed().next().unwrap();
    assert!(products.raster(Product::Fvc).is_none());
    assert!(products.raster(Product::Ndvi).is_some());
    assert_eq!(products.failures.len(), 1);
    assert!(matches!(
        products.failures[0],
        (Product::Fvc, CompositeError::DegenerateThreshold { .. })
    ));
}

#[test]
fn test_auto_thresholds_and_fallback() {
    init_logging();

    let mut estimator = ThresholdEstimator::automatic(Default::default());
    assert_eq!(estimator.mode, ThresholdMode::Auto);

    let plan = PipelinePlan::builder(aoi())
        .period(window((2020, 7, 1), (2020, 8, 1)))
        .products([Product::Fvc])
        .thresholds(estimator)
        .build()
        .unwrap();
    let report = plan.evaluate(&archive());
    let outcome = report.completed().next().unwrap().thresholds.clone().unwrap();
    assert_eq!(outcome.source, ThresholdSource::Estimated);
    // One pixel at 0.5, fifteen at 0.5833
    assert!(outcome.pair.ndvi_soil >= 0.5 - 1e-3);
    assert!(outcome.pair.ndvi_veg <= (0.5 + 2.0 / 3.0) / 2.0 + 1e-3);

    estimator.min_valid_pixels = 1000;
    let plan = PipelinePlan::builder(aoi())
        .period(window((2020, 7, 1), (2020, 8, 1)))
        .products([Product::Fvc])
        .thresholds(estimator)
        .build()
        .unwrap();
    let report = plan.evaluate(&archive());
    let outcome = report.completed().next().unwrap().thresholds.clone().unwrap();
    assert_eq!(outcome.source, ThresholdSource::Fallback);
    assert_eq!(outcome.pair, ThresholdPair::default());
}

#[test]
fn test_legacy_sensor_bands() {
    init_logging();

    let archive: InMemoryArchive = [scene(
        "LT05_L2SP_123032_20050610_20200902_02_T1",
        (2005, 6, 10),
        0.1,
        0.1,
        0.3,
        0.2,
        clear_qa(),
    )]
    .into_iter()
    .collect();

    let plan = PipelinePlan::builder(aoi())
        .period(window((2005, 6, 1), (2005, 7, 1)))
        .products([Product::Ndvi])
        .build()
        .unwrap();
    let report = plan.evaluate(&archive);
    let ndvi = report.completed().next().unwrap().raster(Product::Ndvi).unwrap();
    assert_abs_diff_eq!(ndvi.data[[2, 2]], 0.5, epsilon = 1e-3);
}

#[test]
fn test_missing_band_fails_period() {
    init_logging();

    let mut bands = HashMap::new();
    bands.insert("SR_B4".to_string(), band(0.1));
    bands.insert("SR_B5".to_string(), band(0.3));
    let acquired = Utc.with_ymd_and_hms(2020, 7, 5, 3, 0, 0).unwrap();
    let incomplete = Scene::from_product_id(
        "LC08_L2SP_123032_20200705_20200721_02_T1",
        acquired,
        5.0,
        grid(),
        bands,
        clear_qa(),
    )
    .unwrap();

    let archive: InMemoryArchive = [incomplete].into_iter().collect();
    let plan = PipelinePlan::builder(aoi())
        .period(window((2020, 7, 1), (2020, 8, 1)))
        .products([Product::Ndwi])
        .build()
        .unwrap();

    let report = plan.evaluate(&archive);
    assert_eq!(report.failed_count(), 1);
    match &report.outcomes[0] {
        PeriodOutcome::Failed { error, .. } => assert!(matches!(error, CompositeError::MissingBand { .. })),
        other => panic!("expected failed period, got {:?}", other),
    }
}
