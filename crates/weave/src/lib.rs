//! Compile-time dependency injection for TypeScript component code.
//!
//! Components declare the services they need through marker types in their
//! props (`Inject<T>`, `InjectOptional<T>`). Weave scans a project, resolves
//! every requested contract to an implementation, validates the dependency
//! graph and rewrites each component so it binds its services itself.
//!
//! # Pipeline
//!
//! 1. [`Extractor`] parses one file into a [`FileModel`]: contracts,
//!    `@Service` implementations, imports and injection sites.
//! 2. [`InterfaceRegistry`] merges all models and assigns [`ResolutionKey`]s.
//! 3. [`DependencyGraph`] links constructor dependencies between implementations.
//! 4. [`Validator`] reports missing and ambiguous implementations and cycles.
//! 5. [`FunctionalTransformer`] rewrites components; [`ResolutionManifest`]
//!    tells the runtime container what to build for each key.
//!
//! [`Scanner`] runs the pipeline over a project through a [`Runtime`], and
//! [`Session`] keeps it current as files change.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use weave::{NativeRuntime, Scanner};
//! use weave_config::ConfigDiscovery;
//!
//! # async fn run() -> weave::Result<()> {
//! let config = ConfigDiscovery::new(".").load_or_default()?;
//! let scanner = Scanner::new(config, Arc::new(NativeRuntime))?;
//! let output = scanner.scan().await?;
//! for issue in &output.report.issues {
//!     eprintln!("{issue}");
//! }
//! scanner.write_outputs(&output).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod extract;
pub mod graph;
pub mod key;
pub mod manifest;
pub mod model;
pub mod registry;
pub mod runtime;
pub mod scan;
pub mod session;
pub mod transform;
pub mod validate;
pub mod watch;

#[cfg(feature = "logging")]
pub mod logger;

pub use error::{Error, Result};
pub use extract::{Extractor, FileModel, InjectionSite};
pub use graph::{DependencyEdge, DependencyGraph, EdgeTarget};
pub use key::{
    ResolutionKey, extract_interface_name, extract_location, is_location_key, location_key,
    sanitize,
};
pub use manifest::{ManifestEntry, ResolutionManifest};
pub use model::{
    ContractDescriptor, ContractRef, ImplementationDescriptor, InjectionRequest, Scope,
    ServiceMetadata, SourceLocation,
};
pub use registry::{ImplId, InterfaceRegistry, Resolution, ResolveRequest};
pub use runtime::{MemoryRuntime, NativeRuntime, Runtime, RuntimeError, RuntimeResult};
pub use scan::{ScanOutput, Scanner};
pub use session::Session;
pub use transform::{FunctionalTransformer, ResolvedBinding, TransformationResult};
pub use validate::{IssueKind, ValidationIssue, ValidationReport, Validator};
pub use watch::{FileChange, FileWatcher};
