use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::core::CompressedOutput;
use crate::utils::{CompressorError, CompressorResult, SourceFormat};

/// Expands the given paths into the image files to compress.
///
/// Files are taken as given. Directories contribute their direct children
/// with a known image extension, sorted by name.
pub async fn collect_inputs(paths: &[PathBuf]) -> CompressorResult<Vec<PathBuf>> {
    let mut inputs = Vec::new();

    for path in paths {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| CompressorError::io(format!("Failed to read {}: {}", path.display(), e)))?;

        if metadata.is_file() {
            inputs.push(path.clone());
            continue;
        }

        let mut found = Vec::new();
        let mut entries = fs::read_dir(path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let candidate = entry.path();
            if entry.file_type().await?.is_file() && has_image_extension(&candidate) {
                found.push(candidate);
            }
        }
        found.sort();
        debug!("Found {} images in {}", found.len(), path.display());
        inputs.extend(found);
    }

    Ok(inputs)
}

fn has_image_extension(path: &Path) -> bool {
    path.to_str().and_then(SourceFormat::from_extension).is_some()
}

/// Writes a compressed output into `dir`, creating it if needed.
pub async fn write_output(dir: impl AsRef<Path>, output: &CompressedOutput) -> CompressorResult<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .await
        .map_err(|e| CompressorError::io(format!("Failed to create {}: {}", dir.display(), e)))?;

    let target = dir.join(&output.file_name);
    fs::write(&target, &output.bytes)
        .await
        .map_err(|e| CompressorError::io(format!("Failed to write {}: {}", target.display(), e)))?;
    Ok(target)
}
