//! Model location resolution.
//!
//! A model id such as `black-forest-labs/FLUX.1-schnell` is looked up in an
//! optional local cache directory (for example a mounted network volume)
//! before falling back to the Hugging Face hub.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Where the engine loader should read weights from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelLocation {
    /// A directory holding the model files.
    Local(PathBuf),
    /// A hub repository id; `cache_dir` is where downloads should land.
    Remote {
        model_id: String,
        cache_dir: Option<PathBuf>,
    },
}

impl ModelLocation {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

/// Resolves `model_id` against `cache_dir`.
///
/// Both the flat layout (`org--name`) and the hub cache layout
/// (`models--org--name/snapshots/<rev>`) are recognised. When several
/// snapshots exist the most recently modified one wins.
pub fn resolve_model_location(model_id: &str, cache_dir: Option<&Path>) -> ModelLocation {
    let Some(cache_dir) = cache_dir else {
        return remote(model_id, None);
    };

    let cache_name = model_id.replace('/', "--");
    let candidates = [
        cache_dir.join(&cache_name),
        cache_dir.join(format!("models--{cache_name}")),
    ];

    for path in candidates {
        if !path.exists() {
            continue;
        }
        tracing::info!(path = %path.display(), "found model in cache directory");

        let snapshots = path.join("snapshots");
        if let Some(latest) = latest_snapshot(&snapshots) {
            tracing::info!(snapshot = %latest.display(), "using snapshot");
            return ModelLocation::Local(latest);
        }
        return ModelLocation::Local(path);
    }

    tracing::warn!(
        cache_dir = %cache_dir.display(),
        model_id,
        "model not found in cache directory, it will be downloaded from the hub (slow on first run)"
    );
    remote(model_id, Some(cache_dir))
}

fn remote(model_id: &str, cache_dir: Option<&Path>) -> ModelLocation {
    tracing::info!(model_id, "loading model from the Hugging Face hub");
    ModelLocation::Remote {
        model_id: model_id.to_string(),
        cache_dir: cache_dir.map(Path::to_path_buf),
    }
}

fn latest_snapshot(snapshots: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(snapshots).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}
