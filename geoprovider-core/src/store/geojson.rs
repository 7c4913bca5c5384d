//! GeoJSON file store.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

use super::{FeatureStore, StoreError};
use crate::FeatureCollection;

/// Store backed by a single GeoJSON `FeatureCollection` file.
///
/// Every load reads the whole file and every persist rewrites it. Writes go
/// to a sibling temporary file that is renamed over the target, so readers
/// see either the old or the new document, never a partial one.
///
/// The store takes no file lock. Two processes mutating the same file can
/// lose each other's changes; serialise writers externally when that
/// matters.
#[derive(Debug, Clone)]
pub struct GeoJsonStore {
    path: Utf8PathBuf,
}

impl GeoJsonStore {
    /// Address the GeoJSON file at `path`. The file is not touched until the
    /// first load or persist.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl FeatureStore for GeoJsonStore {
    fn locator(&self) -> &str {
        self.path.as_str()
    }

    /// Read the file.
    ///
    /// A missing or undecodable file is unavailable; an empty file reads as
    /// an empty collection.
    fn load(&self) -> Result<FeatureCollection, StoreError> {
        let text = geoprovider_fs::read_to_string(&self.path)
            .map_err(|source| StoreError::unavailable(self.locator(), source))?;
        if text.trim().is_empty() {
            debug!("{} is empty; treating it as an empty collection", self.path);
            return Ok(FeatureCollection::default());
        }
        let collection: FeatureCollection = serde_json::from_str(&text)
            .map_err(|source| StoreError::unavailable(self.locator(), source))?;
        debug!("loaded {} features from {}", collection.len(), self.path);
        Ok(collection)
    }

    fn persist(&self, collection: &FeatureCollection) -> Result<(), StoreError> {
        let mut stored = collection.clone();
        stored.clear_counts();
        let mut bytes = serde_json::to_vec_pretty(&stored)
            .map_err(|source| StoreError::write(self.locator(), source))?;
        bytes.push(b'\n');
        geoprovider_fs::ensure_parent_dir(&self.path)
            .and_then(|()| geoprovider_fs::write_atomic(&self.path, &bytes))
            .map_err(|source: io::Error| StoreError::write(self.locator(), source))?;
        debug!("wrote {} features to {}", stored.len(), self.path);
        Ok(())
    }
}
