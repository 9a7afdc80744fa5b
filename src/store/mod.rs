use crate::error::{RecError, Result};
use crate::models::{FactorModel, Hyperparameters};
use chrono::{DateTime, Utc};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::info;

/// Current on-disk format version. Loading any other version fails with
/// `UnsupportedVersion`.
pub const FORMAT_VERSION: u32 = 1;

/// Serialized model layout: version tag, hyperparameters, matrix shapes,
/// then both factor matrices flattened row-major, then the per-user
/// seen-item lists.
#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    version: u32,
    params: Hyperparameters,
    n_users: usize,
    n_items: usize,
    trained_at: DateTime<Utc>,
    user_factors: Vec<f32>,
    item_factors: Vec<f32>,
    user_items: Vec<Vec<u32>>,
}

fn row_major(m: &DMatrix<f32>) -> Vec<f32> {
    let mut out = Vec::with_capacity(m.nrows() * m.ncols());
    for r in 0..m.nrows() {
        out.extend(m.row(r).iter().copied());
    }
    out
}

/// Writes the model to `path` atomically: serialize into a temp file in
/// the destination directory, then rename over the target, so a reader
/// never observes a partially written file.
pub fn save<P: AsRef<Path>>(model: &FactorModel, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = ModelFile {
        version: FORMAT_VERSION,
        params: model.params,
        n_users: model.n_users(),
        n_items: model.n_items(),
        trained_at: model.trained_at,
        user_factors: row_major(&model.user_factors),
        item_factors: row_major(&model.item_factors),
        user_items: model.user_items.clone(),
    };

    let bytes = bincode::serialize(&file)
        .map_err(|e| RecError::CorruptModel(format!("encode failed: {}", e)))?;

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir)?;
    }
    let mut tmp = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
        None => tempfile::NamedTempFile::new_in(".")?,
    };
    tmp.write_all(&bytes)?;
    tmp.persist(path).map_err(|e| RecError::Io(e.error))?;

    info!(
        "saved model ({} users x {} items, {} factors) to {}",
        file.n_users,
        file.n_items,
        file.params.factors,
        path.display()
    );
    Ok(())
}

/// Loads and validates a model file.
///
/// Fails with `ModelNotFound` for a missing path, `UnsupportedVersion`
/// for a foreign format tag, and `CorruptModel` when decoding fails or
/// the shape metadata disagrees with the stored payload.
pub fn load<P: AsRef<Path>>(path: P) -> Result<FactorModel> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RecError::ModelNotFound(path.to_path_buf()),
        _ => RecError::Io(e),
    })?;

    // The version tag is the first field; decode it alone before trusting
    // the rest of the layout.
    let version: u32 = bincode::deserialize(&bytes)
        .map_err(|e| RecError::CorruptModel(format!("unreadable version tag: {}", e)))?;
    if version != FORMAT_VERSION {
        return Err(RecError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }

    let file: ModelFile = bincode::deserialize(&bytes)
        .map_err(|e| RecError::CorruptModel(format!("decode failed: {}", e)))?;

    file.params
        .validate()
        .map_err(|e| RecError::CorruptModel(format!("stored hyperparameters invalid: {}", e)))?;
    let f = file.params.factors;
    if file.user_factors.len() != file.n_users * f {
        return Err(RecError::CorruptModel(format!(
            "user factor payload has {} values, expected {}",
            file.user_factors.len(),
            file.n_users * f
        )));
    }
    if file.item_factors.len() != file.n_items * f {
        return Err(RecError::CorruptModel(format!(
            "item factor payload has {} values, expected {}",
            file.item_factors.len(),
            file.n_items * f
        )));
    }
    if file.user_items.len() != file.n_users {
        return Err(RecError::CorruptModel(format!(
            "seen-item lists cover {} users, expected {}",
            file.user_items.len(),
            file.n_users
        )));
    }

    info!(
        "loaded model ({} users x {} items, {} factors) from {}",
        file.n_users,
        file.n_items,
        f,
        path.display()
    );
    Ok(FactorModel {
        params: file.params,
        user_factors: DMatrix::from_row_slice(file.n_users, f, &file.user_factors),
        item_factors: DMatrix::from_row_slice(file.n_items, f, &file.item_factors),
        user_items: file.user_items,
        trained_at: file.trained_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::AlternatingLeastSquares;
    use crate::ingest;
    use crate::models::RawInteraction;

    fn trained_model() -> FactorModel {
        let (matrix, _) = ingest::accumulate(vec![
            RawInteraction::new(0, 0, 1.0),
            RawInteraction::new(0, 1, 2.0),
            RawInteraction::new(1, 1, 1.0),
        ]);
        let als = AlternatingLeastSquares::new(Hyperparameters {
            factors: 4,
            regularization: 0.01,
            iterations: 3,
            seed: Some(21),
        })
        .unwrap();
        als.fit(&matrix).unwrap()
    }

    #[test]
    fn save_load_round_trips() {
        let model = trained_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");

        save(&model, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.params, model.params);
        assert_eq!(loaded.user_factors, model.user_factors);
        assert_eq!(loaded.item_factors, model.item_factors);
        assert_eq!(loaded.user_items, model.user_items);
        assert_eq!(loaded.trained_at, model.trained_at);
    }

    #[test]
    fn missing_file_is_model_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, RecError::ModelNotFound(_)));
    }

    #[test]
    fn truncated_payload_is_corrupt() {
        let model = trained_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        save(&model, &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, RecError::CorruptModel(_)));
    }

    #[test]
    fn foreign_version_is_unsupported() {
        let model = trained_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        save(&model, &path).unwrap();

        // Stamp a different version over the leading tag.
        let mut bytes = fs::read(&path).unwrap();
        bytes[..4].copy_from_slice(&99u32.to_le_bytes());
        fs::write(&path, &bytes).unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(
            err,
            RecError::UnsupportedVersion {
                found: 99,
                supported: FORMAT_VERSION
            }
        ));
    }

    #[test]
    fn save_creates_parent_directories() {
        let model = trained_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/models/als.bin");
        save(&model, &path).unwrap();
        assert!(path.exists());
    }
}
