use crate::core::sensor::Satellite;
use crate::io::scene::{Scene, SceneArchive};
use crate::types::{AreaOfInterest, CloudCoverRange, CompositeError, CompositeResult, DateWindow};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Filters applied when assembling the scenes of one period
#[derive(Debug, Clone)]
pub struct CollectionFilter {
    pub window: DateWindow,
    pub cloud_cover: CloudCoverRange,
    pub satellites: BTreeSet<Satellite>,
}

/// Scenes merged across every enabled satellite for one period
#[derive(Debug, Clone)]
pub struct SceneCollection {
    window: DateWindow,
    scenes: Vec<Arc<Scene>>,
}

impl SceneCollection {
    pub fn window(&self) -> &DateWindow {
        &self.window
    }

    pub fn scenes(&self) -> &[Arc<Scene>] {
        &self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Unique WRS-2 (path, row) pairs covered by the collection.
    /// Coverage diagnostics only; the scenes themselves are not deduplicated.
    pub fn unique_path_rows(&self) -> BTreeSet<(u16, u16)> {
        self.scenes.iter().map(|s| (s.path, s.row)).collect()
    }

    pub fn counts_by_satellite(&self) -> BTreeMap<Satellite, usize> {
        let mut counts = BTreeMap::new();
        for scene in &self.scenes {
            *counts.entry(scene.satellite).or_insert(0) += 1;
        }
        counts
    }
}

/// Assembles a [`SceneCollection`] from an archive
pub struct SceneCollectionBuilder<'a> {
    archive: &'a dyn SceneArchive,
}

impl<'a> SceneCollectionBuilder<'a> {
    pub fn new(archive: &'a dyn SceneArchive) -> Self {
        Self { archive }
    }

    /// Select scenes intersecting the AOI, inside the window and cloud
    /// bounds, for every enabled satellite, and merge them.
    pub fn build(&self, aoi: &AreaOfInterest, filter: &CollectionFilter) -> CompositeResult<SceneCollection> {
        let bounds = aoi.bounding_box();
        let mut scenes = Vec::new();

        for &satellite in &filter.satellites {
            if !satellite.operational_during(&filter.window) {
                log::debug!("{} not operational during {}, skipping", satellite, filter.window);
                continue;
            }

            let candidates = self.archive.scenes(satellite)?;
            let before = scenes.len();
            scenes.extend(candidates.into_iter().filter(|scene| {
                filter.window.contains(scene.acquisition_date())
                    && filter.cloud_cover.contains(scene.cloud_cover)
                    && scene.footprint.intersects(&bounds)
            }));

            log::debug!(
                "{}: {} scene(s) selected for {}",
                satellite,
                scenes.len() - before,
                filter.window
            );
        }

        if scenes.is_empty() {
            return Err(CompositeError::EmptyCollection { window: filter.window });
        }

        let collection = SceneCollection {
            window: filter.window,
            scenes,
        };
        log::info!(
            "Collection for {}: {} scene(s), {} unique path/row",
            filter.window,
            collection.len(),
            collection.unique_path_rows().len()
        );
        Ok(collection)
    }
}
