use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageDirError {
    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory holding the raw bytes of every uploaded image.
#[derive(Debug, Clone)]
pub struct ImageDir {
    root: PathBuf,
}

impl ImageDir {
    /// Creates `root` (and its parents) if it does not exist yet.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ImageDirError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `filename` is stored. Only a single plain path component is
    /// accepted, so files cannot land outside the directory.
    pub fn path_for(&self, filename: &str) -> Result<PathBuf, ImageDirError> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == filename => Ok(self.root.join(name)),
            _ => Err(ImageDirError::InvalidFilename(filename.to_string())),
        }
    }

    /// Writes `bytes` to `filename` in one call, replacing any existing file
    /// with that name.
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, ImageDirError> {
        let path = self.path_for(filename)?;
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Saved image");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("image_store");

        let images = ImageDir::open(&root).unwrap();

        assert!(root.is_dir());
        assert_eq!(images.root(), root.as_path());
    }

    #[test]
    fn test_path_for_plain_filename() {
        let images = ImageDir {
            root: PathBuf::from("image_store"),
        };
        assert_eq!(
            images.path_for("cat.jpg").unwrap(),
            PathBuf::from("image_store/cat.jpg")
        );
    }

    #[test]
    fn test_path_for_rejects_escaping_names() {
        let images = ImageDir {
            root: PathBuf::from("image_store"),
        };
        for name in ["", ".", "..", "../cat.jpg", "a/b.jpg", "/etc/passwd", "cat.jpg/"] {
            assert!(
                matches!(images.path_for(name), Err(ImageDirError::InvalidFilename(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_save_writes_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let images = ImageDir::open(dir.path()).unwrap();

        let path = images.save("cat.jpg", b"first").await.unwrap();
        assert_eq!(path, dir.path().join("cat.jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        images.save("cat.jpg", b"second").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }
}
