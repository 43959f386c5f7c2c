//! Scene access, catalog and product export

pub mod scene;
pub mod catalog;
pub mod export;

pub use scene::{InMemoryArchive, ProductId, Scene, SceneArchive};
pub use catalog::{build_catalog, write_catalog, write_catalog_file, CatalogRow};
pub use export::{output_name, ExportError, MetadataExporter, ProductMetadata, RasterExporter};
#[cfg(feature = "gdal")]
pub use export::GeoTiffExporter;
