use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Runtime, RuntimeError, RuntimeResult};

/// In-memory file tree.
///
/// Used by build-tool adapters that hold sources in memory and by tests.
///
/// ```
/// use weave::runtime::MemoryRuntime;
///
/// let runtime = MemoryRuntime::new()
///     .with_file("/app/src/a.ts", "export interface A {}");
/// assert_eq!(runtime.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryRuntime {
    files: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        self.files.write().insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.files.write().remove(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

#[async_trait]
impl Runtime for MemoryRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| RuntimeError::FileNotFound(path.to_path_buf()))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        self.insert(path, content);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let files = self.files.read();
        files.contains_key(path) || files.keys().any(|p| p.starts_with(path))
    }

    async fn list_files(&self, root: &Path) -> RuntimeResult<Vec<PathBuf>> {
        let files = self.files.read();
        let listed: Vec<PathBuf> = files
            .keys()
            .filter(|p| p.starts_with(root))
            .cloned()
            .collect();

        if listed.is_empty() && !files.contains_key(root) {
            return Err(RuntimeError::FileNotFound(root.to_path_buf()));
        }
        Ok(listed)
    }
}
