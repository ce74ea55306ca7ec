//! The full pipeline: discover, read, extract, link, transform.
//!
//! ```text
//! roots ──list──> paths ──read (async)──> sources ──extract (rayon)──> FileModels
//!                                                                        │
//!      manifest <── validate <── graph <── registry (single merge point) ─┘
//!                                            │
//!                                            └──> transform (rayon) ──> rewritten files
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use rayon::ThreadPool;
use rayon::prelude::*;
use weave_config::WeaveConfig;

use crate::error::{Error, Result};
use crate::extract::{Extractor, FileModel};
use crate::graph::DependencyGraph;
use crate::manifest::ResolutionManifest;
use crate::model::SourceLocation;
use crate::registry::InterfaceRegistry;
use crate::runtime::Runtime;
use crate::transform::{FunctionalTransformer, TransformationResult};
use crate::validate::{RequestSite, ValidationIssue, ValidationReport, Validator};

/// Everything one run produces.
#[derive(Debug)]
pub struct ScanOutput {
    /// File models in path order.
    pub files: Vec<FileModel>,
    pub registry: InterfaceRegistry,
    pub graph: DependencyGraph,
    /// Extraction issues followed by validation findings.
    pub report: ValidationReport,
    /// One result per file, in path order.
    pub transformations: Vec<TransformationResult>,
    pub manifest: ResolutionManifest,
}

impl ScanOutput {
    pub fn transformed(&self) -> impl Iterator<Item = &TransformationResult> {
        self.transformations.iter().filter(|t| t.was_transformed)
    }

    pub fn transformation(&self, path: &str) -> Option<&TransformationResult> {
        self.transformations.iter().find(|t| t.path == path)
    }
}

/// Optional dedicated rayon pool sized by `scan.jobs`.
#[derive(Debug, Default)]
pub(crate) struct Workers {
    pool: Option<ThreadPool>,
}

impl Workers {
    pub fn new(jobs: Option<usize>) -> Result<Self> {
        let pool = match jobs {
            Some(jobs) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs.max(1))
                    .build()
                    .map_err(|e| Error::WorkerPool(e.to_string()))?,
            ),
            None => None,
        };
        Ok(Self { pool })
    }

    pub fn install<T: Send>(&self, job: impl FnOnce() -> T + Send) -> T {
        match &self.pool {
            Some(pool) => pool.install(job),
            None => job(),
        }
    }
}

/// Parse sources into file models in parallel, keeping input order.
pub(crate) fn extract_all(
    config: &WeaveConfig,
    workers: &Workers,
    sources: Vec<(String, Arc<str>)>,
) -> Vec<FileModel> {
    let extractor = Extractor::new(config);
    workers.install(|| {
        sources
            .into_par_iter()
            .map(|(path, source)| extractor.extract(&path, source))
            .collect()
    })
}

/// Merge file models into a fresh registry and derive everything else from it.
pub(crate) fn link(config: &WeaveConfig, workers: &Workers, files: Vec<FileModel>) -> Result<ScanOutput> {
    let mut registry = InterfaceRegistry::new_run(config.resolution.profiles.iter().cloned());
    for model in &files {
        registry.register_file(model);
    }
    registry.finalize();

    let graph = DependencyGraph::build(&registry);

    let mut report = ValidationReport::default();
    report.extend(files.iter().flat_map(|f| f.issues.iter().cloned()));
    let requests = files.iter().flat_map(|file| {
        file.sites.iter().flat_map(|site| {
            site.requests.iter().map(move |request| RequestSite {
                component: site.display_name(),
                request,
            })
        })
    });
    let findings = Validator::new(&registry, &graph).with_requests(requests).run();
    report.extend(findings.issues);

    let transformer = FunctionalTransformer::new(&registry, config);
    let outcomes: Vec<Result<TransformationResult>> = workers.install(|| {
        files
            .par_iter()
            .map(|model| transformer.transform(model))
            .collect()
    });

    // A file that cannot be rewritten keeps its source; the others still go through.
    let mut transformations = Vec::with_capacity(outcomes.len());
    for (model, outcome) in files.iter().zip(outcomes) {
        match outcome {
            Ok(result) => transformations.push(result),
            Err(err) => {
                tracing::warn!(file = %model.path, error = %err, "rewrite failed, file left unchanged");
                let issue = ValidationIssue::malformed(
                    format!("could not rewrite file: {err}; left unchanged"),
                    Some(SourceLocation::new(model.path.as_str(), 1)),
                );
                report.extend([issue.clone()]);
                transformations.push(TransformationResult::unchanged(model, issue));
            }
        }
    }

    let manifest = ResolutionManifest::build(
        &registry,
        &graph,
        files
            .iter()
            .flat_map(|f| f.sites.iter().flat_map(|s| s.requests.iter())),
    );

    tracing::info!(
        files = files.len(),
        services = registry.len(),
        keys = manifest.len(),
        rewritten = transformations.iter().filter(|t| t.was_transformed).count(),
        issues = report.issues.len(),
        "link complete"
    );

    Ok(ScanOutput {
        files,
        registry,
        graph,
        report,
        transformations,
        manifest,
    })
}

/// Runs the pipeline over the configured roots through a [`Runtime`].
pub struct Scanner<R: Runtime> {
    config: WeaveConfig,
    runtime: Arc<R>,
    project_root: PathBuf,
    exclude: Gitignore,
    workers: Workers,
}

impl<R: Runtime> Scanner<R> {
    /// Validates `config` and compiles its exclude patterns.
    pub fn new(config: WeaveConfig, runtime: Arc<R>) -> Result<Self> {
        weave_config::validate_schema(&config)?;

        let project_root = config
            .scan
            .project_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));

        let mut builder = GitignoreBuilder::new(&project_root);
        for pattern in &config.scan.exclude {
            builder
                .add_line(None, pattern)
                .map_err(|e| Error::invalid_pattern(pattern.as_str(), e))?;
        }
        let exclude = builder
            .build()
            .map_err(|e| Error::invalid_pattern(config.scan.exclude.join(", "), e))?;
        let workers = Workers::new(config.scan.jobs)?;

        Ok(Self {
            config,
            runtime,
            project_root,
            exclude,
            workers,
        })
    }

    pub fn config(&self) -> &WeaveConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub(crate) fn workers(&self) -> &Workers {
        &self.workers
    }

    /// Project-relative path with forward slashes.
    pub fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.project_root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// `true` if `path` has a scanned extension and is not excluded.
    pub fn is_source(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        if !self.config.scan.extensions.iter().any(|e| e == ext) {
            return false;
        }
        let relative = self.relative_path(path);
        !self
            .exclude
            .matched_path_or_any_parents(Path::new(&relative), false)
            .is_ignore()
    }

    /// Source files below the configured roots, sorted and deduplicated.
    pub async fn discover(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for root in &self.config.scan.roots {
            let root = self.project_root.join(root);
            if !self.runtime.exists(&root) {
                tracing::warn!(root = %root.display(), "scan root does not exist");
                continue;
            }
            let files = self.runtime.list_files(&root).await?;
            paths.extend(files.into_iter().filter(|p| self.is_source(p)));
        }
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    /// Read one file into a model. Read failures become a malformed-file model.
    pub async fn load(&self, path: &Path) -> std::result::Result<(String, Arc<str>), FileModel> {
        let relative = self.relative_path(path);
        match self.runtime.read_to_string(path).await {
            Ok(source) => Ok((relative, Arc::from(source))),
            Err(err) => {
                tracing::warn!(file = %relative, error = %err, "failed to read source file");
                let issue = ValidationIssue::malformed(
                    format!("failed to read file: {err}"),
                    Some(SourceLocation::new(relative.as_str(), 1)),
                );
                Err(FileModel::failed(relative, Arc::from(""), issue))
            }
        }
    }

    /// Run the whole pipeline.
    pub async fn scan(&self) -> Result<ScanOutput> {
        let paths = self.discover().await?;
        tracing::debug!(files = paths.len(), "discovered source files");

        let mut sources = Vec::with_capacity(paths.len());
        let mut unreadable = Vec::new();
        for path in &paths {
            match self.load(path).await {
                Ok(source) => sources.push(source),
                Err(failed) => unreadable.push(failed),
            }
        }

        let mut files = extract_all(&self.config, &self.workers, sources);
        files.append(&mut unreadable);
        files.sort_by(|a, b| a.path.cmp(&b.path));

        link(&self.config, &self.workers, files)
    }

    /// Write the manifest, and rewritten files when `output.out_dir` is set.
    pub async fn write_outputs(&self, output: &ScanOutput) -> Result<()> {
        let manifest_path = self.project_root.join(&self.config.output.manifest);
        self.runtime
            .write_file(&manifest_path, output.manifest.to_json()?.as_bytes())
            .await?;

        if let Some(out_dir) = &self.config.output.out_dir {
            let out_dir = self.project_root.join(out_dir);
            for result in output.transformed() {
                let target = out_dir.join(&result.path);
                self.runtime
                    .write_file(&target, result.rewritten_source.as_bytes())
                    .await?;
            }
        }

        tracing::info!(manifest = %manifest_path.display(), "wrote outputs");
        Ok(())
    }
}
