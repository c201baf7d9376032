use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::{artifact::ModelArtifact, error::StoreError};

/// Single-slot, file-backed artifact storage.
///
/// Saves write a sibling temp file and rename it over the slot, so a reader
/// never observes a half-written artifact. Saves through one store are
/// serialized; when several writers race (including separate stores on the
/// same path) the last rename wins and no history is kept.
#[derive(Debug)]
pub struct ModelStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ModelStore {
    /// Store for the artifact slot at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Slot location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and validates the artifact in the slot.
    pub fn load(&self) -> Result<ModelArtifact, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.clone()))
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let artifact: ModelArtifact =
            serde_json::from_slice(&bytes).map_err(|err| self.corrupt(err.to_string()))?;
        artifact.validate().map_err(|reason| self.corrupt(reason))?;
        Ok(artifact)
    }

    /// Overwrites the slot with `artifact`.
    pub fn save(&self, artifact: &ModelArtifact) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io(source))?;
        }
        let bytes = serde_json::to_vec_pretty(artifact).map_err(|err| self.corrupt(err.to_string()))?;
        let staging = self.staging_path();
        let written = File::create(&staging).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });
        if let Err(source) = written.and_then(|()| fs::rename(&staging, &self.path)) {
            let _ = fs::remove_file(&staging);
            return Err(self.io(source));
        }
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "artifact".into(), |n| n.to_string_lossy().into_owned());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
    }

    fn io(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn corrupt(&self, reason: String) -> StoreError {
        StoreError::Corrupt {
            path: self.path.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{recurrent::RecurrentWeights, scaler::MinMaxScaler};
    use ndarray::Array2;
    use rand::{rngs::SmallRng, SeedableRng};
    use tempfile::tempdir;

    fn artifact(seed: u64) -> ModelArtifact {
        let mut rng = SmallRng::seed_from_u64(seed);
        ModelArtifact::new(
            RecurrentWeights::random(50, &mut rng),
            MinMaxScaler {
                min: 2.1,
                max: 7.3,
            },
            30,
            0.012_345_678_9,
        )
    }

    #[test]
    fn reload_gives_bit_identical_inference() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("model/forecaster.json"));
        let original = artifact(1);
        store.save(&original).unwrap();
        let loaded = store.load().unwrap();

        let window: Vec<f64> = (0..30_u32).map(|i| 2.5 + f64::from(i) * 0.13).collect();
        let before = original.predict(&window).unwrap();
        let after = loaded.predict(&window).unwrap();
        assert_eq!(before.to_bits(), after.to_bits());
        assert_eq!(loaded, original);
    }

    #[test]
    fn missing_slot_is_not_found() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("absent.json"));
        assert!(matches!(store.load(), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn garbage_and_bad_shapes_are_corrupt() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("forecaster.json"));
        fs::write(store.path(), b"{ not json").unwrap();
        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));

        let mut broken = artifact(2);
        broken.weights.recurrent = Array2::zeros((50, 49));
        store.save(&broken).unwrap();
        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn save_overwrites_single_slot() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("forecaster.json"));
        store.save(&artifact(3)).unwrap();
        let newer = artifact(4);
        store.save(&newer).unwrap();
        assert_eq!(store.load().unwrap().id, newer.id);
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
