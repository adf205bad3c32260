// ============================================================
// Layer 4 - Identity Folder Loader
// ============================================================
// Scans a directory-per-identity dataset:
//
//   data/train/
//     ├── alice/
//     │     ├── 001.jpg
//     │     └── 002.png
//     └── bob/
//           └── 001.jpeg
//
// Every subdirectory is one identity; every file with a jpg,
// jpeg or png extension (any case) is one sample. Identities
// without a usable image are skipped with a warning. Only when
// ALL of them are skipped does loading fail.
//
// Images are NOT decoded here; decoding happens lazily in the
// dataset, once per drawn pair.
//
// Reference: Rust Book §9 (Error Handling)

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::error::{FaceVerifyError, Result};
use crate::domain::identity::{Corpus, IdentityClass};
use crate::domain::traits::IdentitySource;

pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// True for files whose extension is an accepted image format.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|ok| e.eq_ignore_ascii_case(ok)))
        .unwrap_or(false)
}

/// Loads a corpus from `<root>/<identity>/<image>`.
/// Implements the IdentitySource trait from Layer 3.
pub struct IdentityFolderLoader {
    root: PathBuf,
}

impl IdentityFolderLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl IdentitySource for IdentityFolderLoader {
    fn load_corpus(&self) -> Result<Corpus> {
        if !self.root.is_dir() {
            return Err(FaceVerifyError::EmptyCorpus(self.root.clone()));
        }

        let mut identity_dirs: Vec<PathBuf> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        // read_dir order is platform dependent; class indices must not be.
        identity_dirs.sort();

        let mut classes = Vec::with_capacity(identity_dirs.len());
        for dir in identity_dirs {
            let name = dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();

            let images = list_images(&dir)?;
            if images.is_empty() {
                tracing::warn!("Skipping identity '{}': no images", name);
                continue;
            }

            tracing::debug!("Identity '{}': {} images", name, images.len());
            classes.push(IdentityClass::new(name, images));
        }

        let corpus = Corpus::new(self.root.clone(), classes)?;
        tracing::info!(
            "Loaded {} identities ({} images) from '{}'",
            corpus.num_classes(),
            corpus.num_images(),
            self.root.display()
        );
        Ok(corpus)
    }
}

/// Sorted image files directly inside `dir`.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_supported_image(p))
        .collect();
    images.sort();
    Ok(images)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "face_verify_loader_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_extension_filter_is_case_insensitive() {
        assert!(is_supported_image(Path::new("a/b.JPG")));
        assert!(is_supported_image(Path::new("a/b.jpeg")));
        assert!(is_supported_image(Path::new("a/b.Png")));
        assert!(!is_supported_image(Path::new("a/b.gif")));
        assert!(!is_supported_image(Path::new("a/README")));
    }

    #[test]
    fn test_empty_identities_are_skipped() {
        let root = scratch_dir("skip");
        fs::create_dir_all(root.join("alice")).unwrap();
        fs::create_dir_all(root.join("bob")).unwrap();
        fs::write(root.join("alice/1.jpg"), b"x").unwrap();
        fs::write(root.join("alice/2.PNG"), b"x").unwrap();
        fs::write(root.join("alice/notes.txt"), b"x").unwrap();
        fs::write(root.join("bob/notes.txt"), b"x").unwrap();

        let corpus = IdentityFolderLoader::new(&root).load_corpus().unwrap();
        assert_eq!(corpus.num_classes(), 1);
        assert_eq!(corpus.class(0).name, "alice");
        assert_eq!(corpus.num_images(), 2);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_all_identities_empty_is_fatal() {
        let root = scratch_dir("empty");
        fs::create_dir_all(root.join("carol")).unwrap();

        let err = IdentityFolderLoader::new(&root).load_corpus().unwrap_err();
        assert!(matches!(err, FaceVerifyError::EmptyCorpus(_)));
        assert!(err.is_fatal_config());

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_root_is_empty_corpus() {
        let root = std::env::temp_dir().join("face_verify_loader_does_not_exist");
        let err  = IdentityFolderLoader::new(root).load_corpus().unwrap_err();
        assert!(matches!(err, FaceVerifyError::EmptyCorpus(_)));
    }
}
