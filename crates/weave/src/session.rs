//! Incremental re-linking for watch mode.
//!
//! A changed file is re-read and re-extracted on its own; the registry,
//! graph, report, transformations and manifest are then rebuilt from all
//! file models, since one changed declaration can affect keys anywhere.

use std::path::Path;

use crate::error::Result;
use crate::extract::{Extractor, FileModel};
use crate::runtime::Runtime;
use crate::scan::{ScanOutput, Scanner, link};

pub struct Session<R: Runtime> {
    scanner: Scanner<R>,
    output: ScanOutput,
    generation: u64,
}

impl<R: Runtime> Session<R> {
    /// Scan everything once.
    pub async fn start(scanner: Scanner<R>) -> Result<Self> {
        let output = scanner.scan().await?;
        Ok(Self {
            scanner,
            output,
            generation: 1,
        })
    }

    pub fn output(&self) -> &ScanOutput {
        &self.output
    }

    pub fn scanner(&self) -> &Scanner<R> {
        &self.scanner
    }

    /// Incremented on every successful relink; later results supersede earlier ones.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether changes to `path` affect the result.
    pub fn tracks(&self, path: &Path) -> bool {
        if let Some(out_dir) = &self.scanner.config().output.out_dir {
            if path.starts_with(self.scanner.project_root().join(out_dir)) {
                return false;
            }
        }
        self.scanner.is_source(path)
    }

    /// Re-extract one file and relink. Untracked paths are ignored.
    pub async fn update_file(&mut self, path: &Path) -> Result<bool> {
        if !self.tracks(path) {
            return Ok(false);
        }

        let model = match self.scanner.load(path).await {
            Ok((relative, source)) => Extractor::new(self.scanner.config()).extract(&relative, source),
            Err(failed) => failed,
        };
        tracing::debug!(file = %model.path, "file changed");

        let mut files = self.output.files.clone();
        match files.binary_search_by(|f| f.path.cmp(&model.path)) {
            Ok(index) => files[index] = model,
            Err(index) => files.insert(index, model),
        }
        self.relink(files)?;
        Ok(true)
    }

    /// Drop a deleted file and relink.
    pub fn remove_file(&mut self, path: &Path) -> Result<bool> {
        let relative = self.scanner.relative_path(path);
        let before = self.output.files.len();
        let files: Vec<FileModel> = self
            .output
            .files
            .iter()
            .filter(|f| f.path != relative)
            .cloned()
            .collect();
        if files.len() == before {
            return Ok(false);
        }

        tracing::debug!(file = %relative, "file removed");
        self.relink(files)?;
        Ok(true)
    }

    fn relink(&mut self, files: Vec<FileModel>) -> Result<()> {
        self.output = link(self.scanner.config(), self.scanner.workers(), files)?;
        self.generation += 1;
        Ok(())
    }
}
