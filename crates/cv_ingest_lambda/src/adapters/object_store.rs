use std::fs;
use std::path::{Component, Path, PathBuf};

/// Blob storage holding uploads, run reports and archived copies.
pub trait ObjectStore {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, String>;

    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), String>;
}

/// Maps `bucket/key` onto files below a root directory. Used by the
/// local runner in place of S3.
#[derive(Debug, Clone)]
pub struct LocalDirectoryStore {
    root: PathBuf,
}

impl LocalDirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, String> {
        let mut path = self.root.clone();
        for part in [bucket, key] {
            let relative = Path::new(part);
            if relative
                .components()
                .any(|component| !matches!(component, Component::Normal(_)))
            {
                return Err(format!("object path '{part}' must be relative without '..'"));
            }
            path.push(relative);
        }
        Ok(path)
    }
}

impl ObjectStore for LocalDirectoryStore {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, String> {
        let path = self.object_path(bucket, key)?;
        fs::read(&path).map_err(|error| format!("failed to read {}: {error}", path.display()))
    }

    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), String> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                format!("failed to create directory {}: {error}", parent.display())
            })?;
        }
        fs::write(&path, body).map_err(|error| format!("failed to write {}: {error}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_nested_keys_and_reads_them_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalDirectoryStore::new(dir.path());

        store
            .put_object("reports", "ingestion/dataset=x/report.json", b"{}")
            .expect("write should succeed");

        assert!(dir
            .path()
            .join("reports/ingestion/dataset=x/report.json")
            .is_file());
        assert_eq!(
            store
                .get_object("reports", "ingestion/dataset=x/report.json")
                .expect("read should succeed"),
            b"{}".to_vec()
        );
    }

    #[test]
    fn rejects_keys_escaping_the_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalDirectoryStore::new(dir.path());

        let error = store
            .put_object("reports", "../outside.json", b"{}")
            .expect_err("parent traversal should fail");
        assert!(error.contains("without '..'"));
        assert!(store.get_object("reports", "/etc/passwd").is_err());
    }

    #[test]
    fn missing_objects_report_the_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalDirectoryStore::new(dir.path());

        let error = store
            .get_object("uploads", "user-data/missing.csv")
            .expect_err("missing file");
        assert!(error.contains("missing.csv"));
    }
}
