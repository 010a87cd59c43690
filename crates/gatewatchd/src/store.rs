//! Directory-backed identity store.
//!
//! Layout: `<root>/<label>/<index>.jpg`, index 1-based — one directory
//! per enrolled identity, up to `MAX_PHOTOS` canonical photos each.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::providers::{IdentityStore, StoreError};

pub struct FsIdentityStore {
    root: PathBuf,
}

impl FsIdentityStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Labels are used as directory names; anything that could escape the
    /// root is rejected.
    fn checked_label(label: &str) -> Result<&str, StoreError> {
        let label = label.trim();
        if label.is_empty()
            || label == "."
            || label == ".."
            || label.contains('/')
            || label.contains('\\')
        {
            return Err(StoreError::InvalidLabel(label.to_string()));
        }
        Ok(label)
    }

    fn photo_path(&self, label: &str, index: usize) -> PathBuf {
        self.root.join(label).join(format!("{index}.jpg"))
    }
}

impl IdentityStore for FsIdentityStore {
    /// Enrolled labels, sorted. A missing root means nobody is enrolled
    /// yet, not an error.
    async fn list_labels(&self) -> Result<Vec<String>, StoreError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(err.into()),
        };

        let mut labels = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Ok(name) = entry.file_name().into_string() {
                    labels.push(name);
                }
            }
        }
        labels.sort();
        Ok(labels)
    }

    async fn fetch_photo(&self, label: &str, index: usize) -> Result<Option<Vec<u8>>, StoreError> {
        let label = Self::checked_label(label)?;
        match tokio::fs::read(self.photo_path(label, index)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn persist_photos(&self, label: &str, photos: &[Vec<u8>]) -> Result<usize, StoreError> {
        let label = Self::checked_label(label)?;
        let dir = self.root.join(label);
        tokio::fs::create_dir_all(&dir).await?;
        for (i, photo) in photos.iter().enumerate() {
            tokio::fs::write(dir.join(format!("{}.jpg", i + 1)), photo).await?;
        }
        tracing::debug!(label, count = photos.len(), dir = %dir.display(), "photos written");
        Ok(photos.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_persist_then_list_and_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIdentityStore::new(dir.path());

        let photos = vec![vec![1u8, 2, 3], vec![4u8, 5, 6]];
        assert_eq!(store.persist_photos("carol", &photos).await.unwrap(), 2);

        assert_eq!(store.list_labels().await.unwrap(), vec!["carol".to_string()]);
        assert_eq!(
            store.fetch_photo("carol", 1).await.unwrap(),
            Some(vec![1u8, 2, 3])
        );
        assert_eq!(
            store.fetch_photo("carol", 2).await.unwrap(),
            Some(vec![4u8, 5, 6])
        );
        assert_eq!(store.fetch_photo("carol", 3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_root_means_no_labels() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIdentityStore::new(dir.path().join("does-not-exist"));
        assert!(store.list_labels().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_unknown_label_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIdentityStore::new(dir.path());
        assert_eq!(store.fetch_photo("nobody", 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_persist_overwrites_previous_enrollment() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIdentityStore::new(dir.path());

        store
            .persist_photos("carol", &[vec![1u8], vec![2u8]])
            .await
            .unwrap();
        store.persist_photos("carol", &[vec![9u8]]).await.unwrap();

        assert_eq!(store.fetch_photo("carol", 1).await.unwrap(), Some(vec![9u8]));
    }

    #[tokio::test]
    async fn test_traversal_labels_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIdentityStore::new(dir.path());

        for label in ["..", "a/b", "", "a\\b"] {
            let err = store.persist_photos(label, &[vec![1u8]]).await;
            assert!(matches!(err, Err(StoreError::InvalidLabel(_))), "{label:?}");
            let err = store.fetch_photo(label, 1).await;
            assert!(matches!(err, Err(StoreError::InvalidLabel(_))), "{label:?}");
        }
    }
}
