//! Native filesystem runtime.
//!
//! ```text
//! NativeRuntime
//! ┌─────────────────┐
//! │  .read_file()   │────▶ std::fs::read()        (spawn_blocking)
//! │  .write_file()  │────▶ std::fs::write()       (spawn_blocking)
//! │  .list_files()  │────▶ ignore::WalkBuilder    (spawn_blocking)
//! └─────────────────┘
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ignore::WalkBuilder;
use tokio::task;

use super::{Runtime, RuntimeError, RuntimeResult};

/// Runtime backed by the host filesystem.
///
/// Blocking `std::fs` calls run on tokio's blocking pool. Directory walks
/// honour `.gitignore` files and skip hidden entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRuntime;

impl NativeRuntime {
    pub fn new() -> Self {
        Self
    }
}

fn join_error(err: task::JoinError) -> RuntimeError {
    RuntimeError::Other(format!("Task join error: {err}"))
}

#[async_trait]
impl Runtime for NativeRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = path.to_path_buf();

        task::spawn_blocking(move || {
            std::fs::read(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::FileNotFound(path.clone())
                } else {
                    RuntimeError::Io(format!("Failed to read {}: {}", path.display(), e))
                }
            })
        })
        .await
        .map_err(join_error)?
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        let path = path.to_path_buf();
        let content = content.to_vec();

        task::spawn_blocking(move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RuntimeError::Io(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
            std::fs::write(&path, content)
                .map_err(|e| RuntimeError::Io(format!("Failed to write {}: {}", path.display(), e)))
        })
        .await
        .map_err(join_error)?
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    async fn list_files(&self, root: &Path) -> RuntimeResult<Vec<PathBuf>> {
        let root = root.to_path_buf();

        task::spawn_blocking(move || {
            if !root.is_dir() {
                return Err(RuntimeError::FileNotFound(root));
            }

            let mut files = Vec::new();
            let walker = WalkBuilder::new(&root)
                .require_git(false)
                .sort_by_file_path(|a, b| a.cmp(b))
                .build();

            for entry in walker {
                let entry = entry.map_err(|e| RuntimeError::Io(e.to_string()))?;
                if entry.file_type().is_some_and(|ft| ft.is_file()) {
                    files.push(entry.into_path());
                }
            }

            Ok(files)
        })
        .await
        .map_err(join_error)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn lists_files_in_path_order_and_honours_gitignore() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("src/b")).unwrap();
        std::fs::create_dir_all(root.join("src/generated")).unwrap();
        std::fs::write(root.join("src/b/z.ts"), "").unwrap();
        std::fs::write(root.join("src/a.ts"), "").unwrap();
        std::fs::write(root.join("src/generated/out.ts"), "").unwrap();
        std::fs::write(root.join(".gitignore"), "src/generated/\n").unwrap();

        let files = NativeRuntime.list_files(&root.join("src")).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["src/a.ts", "src/b/z.ts"]);
    }

    #[tokio::test]
    async fn read_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = NativeRuntime
            .read_file(&temp.path().join("missing.ts"))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn write_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out/nested/file.ts");
        NativeRuntime.write_file(&path, b"export {}").await.unwrap();
        assert_eq!(NativeRuntime.read_to_string(&path).await.unwrap(), "export {}");
    }
}
