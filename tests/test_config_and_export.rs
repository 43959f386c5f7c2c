use chrono::{TimeZone, Utc};
use landcomp::config::ProcessingConfig;
use landcomp::core::collection::{CollectionFilter, SceneCollectionBuilder};
use landcomp::core::{Product, Satellite, Statistic};
use landcomp::io::{build_catalog, write_catalog_file, InMemoryArchive, MetadataExporter, Scene};
use landcomp::types::{
    AreaOfInterest, BoundingBox, CloudCoverRange, CompositeError, DateWindow, GeoTransform, Polygon, RasterGrid,
};
use ndarray::Array2;
use std::collections::HashMap;
use tempfile::tempdir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn polygon() -> Polygon {
    BoundingBox::new(0.0, 0.0, 60.0, 60.0).to_polygon()
}

fn grid() -> RasterGrid {
    RasterGrid::new(GeoTransform::north_up(0.0, 60.0, 30.0), 2, 2)
}

fn scene(id: &str, day: u32, hour: u32, cloud: f32) -> Scene {
    let mut bands = HashMap::new();
    for name in ["SR_B3", "SR_B4", "SR_B5", "SR_B6"] {
        bands.insert(name.to_string(), Array2::from_elem((2, 2), 20_000u16));
    }
    let acquired = Utc.with_ymd_and_hms(2021, 3, day, hour, 30, 0).unwrap();
    Scene::from_product_id(id, acquired, cloud, grid(), bands, Array2::zeros((2, 2))).unwrap()
}

const CONFIG: &str = r#"{
    "area_id": "basin",
    "satellites": {"LANDSAT_7": false, "LANDSAT_8": true, "LANDSAT_9": true},
    "periods": [
        {"start": "2021-03-01", "end": "2021-04-01"},
        {"start": "2021-04-01", "end": "2021-05-01"}
    ],
    "statistic": "mean",
    "cloud_cover_max": 30.0,
    "products": ["ndvi", "fvc"]
}"#;

#[test]
fn test_config_file_to_plan() {
    init_logging();
    let dir = tempdir().unwrap();
    let path = dir.path().join("basin.json");
    std::fs::write(&path, CONFIG).unwrap();

    let config = ProcessingConfig::from_json_file(&path).unwrap();
    let plan = config.into_plan(polygon()).unwrap();

    assert_eq!(plan.products(), &[Product::Ndvi, Product::Fvc]);
    assert_eq!(plan.statistic(), Statistic::Mean);
    assert_eq!(
        plan.satellites().iter().copied().collect::<Vec<_>>(),
        vec![Satellite::Landsat8, Satellite::Landsat9]
    );
    assert_eq!(
        plan.output_names(),
        vec![
            "basin_NDVI_mean_20210301_20210401",
            "basin_FVC_mean_20210301_20210401",
            "basin_NDVI_mean_20210401_20210501",
            "basin_FVC_mean_20210401_20210501",
        ]
    );
}

#[test]
fn test_invalid_configs_rejected_before_processing() {
    init_logging();
    assert!(matches!(
        ProcessingConfig::from_json_str("{ not json"),
        Err(CompositeError::InvalidConfig(_))
    ));

    let config = ProcessingConfig::from_json_str(r#"{"statistic": "median"}"#).unwrap();
    assert!(matches!(
        config.into_plan(polygon()),
        Err(CompositeError::UnsupportedStatistic(_))
    ));

    let config = ProcessingConfig::from_json_str(r#"{"satellites": {"SENTINEL_2": true}}"#).unwrap();
    assert!(matches!(
        config.into_plan(polygon()),
        Err(CompositeError::UnknownSatellite(_))
    ));

    let config = ProcessingConfig::from_json_str(
        r#"{"periods": [{"start": "2021-05-01", "end": "2021-05-01"}]}"#,
    )
    .unwrap();
    assert!(matches!(config.into_plan(polygon()), Err(CompositeError::InvalidConfig(_))));

    let config = ProcessingConfig::from_json_str(
        r#"{"periods": [{"start": "2021-05-01", "end": "2021-06-01"}], "fvc": {"mode": "guess"}}"#,
    )
    .unwrap();
    assert!(matches!(config.into_plan(polygon()), Err(CompositeError::InvalidConfig(_))));
}

#[test]
fn test_catalog_csv() {
    init_logging();
    let archive: InMemoryArchive = [
        scene("LC08_L2SP_123032_20210320_20210328_02_T1", 20, 3, 12.5),
        scene("LC09_L2SP_124032_20210305_20220130_02_T1", 5, 20, 4.0),
        scene("LC08_L2SP_123032_20210312_20210320_02_T1", 12, 3, 80.0),
    ]
    .into_iter()
    .collect();

    let filter = CollectionFilter {
        window: DateWindow::new(
            chrono::NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2021, 4, 1).unwrap(),
        )
        .unwrap(),
        cloud_cover: CloudCoverRange::new(0.0, 50.0).unwrap(),
        satellites: Satellite::ALL.into_iter().collect(),
    };
    let aoi = AreaOfInterest::new("basin", polygon());
    let collection = SceneCollectionBuilder::new(&archive).build(&aoi, &filter).unwrap();
    assert_eq!(collection.len(), 2);

    let rows = build_catalog(&collection);
    assert_eq!(rows[0].scene_id, "LC09_L2SP_124032_20210305_20220130_02_T1");
    // 20:30 UTC rolls past midnight in UTC+8
    assert_eq!(rows[0].time_utc8, "04:30:00");
    assert_eq!(rows[1].sequence, 2);
    assert_eq!((rows[1].path, rows[1].row), (123, 32));

    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.csv");
    write_catalog_file(&rows, &path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("No,SceneID,CloudCover"));
    assert!(lines[2].contains("LC08_L2SP_123032_20210320_20210328_02_T1,12.5,2021-03-20,03:30:00,11:30:00,2021,3,123,32"));
}

#[test]
fn test_metadata_export() {
    init_logging();
    let archive: InMemoryArchive = [scene("LC08_L2SP_123032_20210320_20210328_02_T1", 20, 3, 12.5)]
        .into_iter()
        .collect();

    let config = ProcessingConfig::from_json_str(CONFIG).unwrap();
    let report = config.into_plan(polygon()).unwrap().evaluate(&archive);
    assert_eq!(report.skipped_count(), 1);

    let dir = tempdir().unwrap();
    let written = report.export_all(&MetadataExporter::new(dir.path())).unwrap();
    assert_eq!(written.len(), 2);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("basin_NDVI_mean_20210301_20210401.json")).unwrap())
            .unwrap();
    assert_eq!(json["product"], "NDVI");
    assert_eq!(json["statistic"], "mean");
    assert_eq!(json["end_date_exclusive"], "2021-04-01");
    assert_eq!(json["valid_pixels"], 4);
}
