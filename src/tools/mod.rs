//! File selection and raster loading helpers.

use crate::error::{IntakeError, RasterError};
use image::RgbImage;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Returns `true` for JPEG/PNG file names (case-insensitive extension).
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.iter().any(|e| *e == ext)
        })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with('.'))
}

/// Expand a user selection of files and folders into image paths.
///
/// Files are kept in the order given (unsupported extensions dropped).
/// Folders are walked recursively, skipping hidden entries, and contribute
/// their images sorted by path. A root that does not exist is fatal; an
/// unreadable entry below a root is skipped.
pub fn collect_selection(roots: &[PathBuf]) -> Result<Vec<PathBuf>, IntakeError> {
    let mut images = Vec::new();

    for root in roots {
        let meta = std::fs::metadata(root).map_err(|source| IntakeError::Selection {
            path: root.clone(),
            source,
        })?;

        if meta.is_file() {
            if is_supported_image(root) {
                images.push(root.clone());
            }
            continue;
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(root).into_iter().filter_entry(|e| !is_hidden(e)) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::debug!("skipping unreadable entry under {}: {err}", root.display());
                    continue;
                }
            };
            if entry.file_type().is_file() && is_supported_image(entry.path()) {
                found.push(entry.into_path());
            }
        }
        found.sort();
        images.extend(found);
    }

    Ok(images)
}

/// Decode a file into an RGB raster at its natural size.
pub fn load_rgb(path: &Path) -> Result<RgbImage, RasterError> {
    Ok(image::open(path)?.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static TEMP_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir() -> PathBuf {
        let mut path = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before UNIX epoch")
            .as_nanos();
        let sequence = TEMP_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        path.push(format!("qr_intake_selection_{nanos}_{sequence}"));
        fs::create_dir_all(&path).expect("failed to create temp dir");
        path
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_image(Path::new("a/IMG_0001.JPG")));
        assert!(is_supported_image(Path::new("b.png")));
        assert!(is_supported_image(Path::new("c.jpeg")));
        assert!(!is_supported_image(Path::new("d.gif")));
        assert!(!is_supported_image(Path::new("noext")));
    }

    #[test]
    fn test_collect_selection_walks_folders() {
        let dir = temp_dir();
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::create_dir_all(dir.join(".hidden")).unwrap();
        fs::write(dir.join("b.jpg"), b"").unwrap();
        fs::write(dir.join("a.png"), b"").unwrap();
        fs::write(dir.join("notes.txt"), b"").unwrap();
        fs::write(dir.join(".DS_Store.jpg"), b"").unwrap();
        fs::write(dir.join("sub").join("c.JPG"), b"").unwrap();
        fs::write(dir.join(".hidden").join("d.jpg"), b"").unwrap();

        let found = collect_selection(&[dir.clone()]).unwrap();
        assert_eq!(
            found,
            vec![
                dir.join("a.png"),
                dir.join("b.jpg"),
                dir.join("sub").join("c.JPG")
            ]
        );
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_collect_selection_keeps_file_order() {
        let dir = temp_dir();
        let z = dir.join("z.jpg");
        let a = dir.join("a.jpg");
        fs::write(&z, b"").unwrap();
        fs::write(&a, b"").unwrap();
        let found = collect_selection(&[z.clone(), a.clone()]).unwrap();
        assert_eq!(found, vec![z, a]);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let missing = std::env::temp_dir().join("qr_intake_selection_missing_root");
        assert!(matches!(
            collect_selection(&[missing]),
            Err(IntakeError::Selection { .. })
        ));
    }

    #[test]
    fn test_load_rgb_rejects_garbage() {
        let dir = temp_dir();
        let path = dir.join("broken.jpg");
        fs::write(&path, b"not an image").unwrap();
        assert!(load_rgb(&path).is_err());
        let _ = fs::remove_dir_all(dir);
    }
}
