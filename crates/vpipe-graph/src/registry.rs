//! Pipeline registry with slot reuse.
//!
//! Released pipelines keep their slot and backend context. A later
//! [`acquire`](PipelineRegistry::acquire) for the same backend recycles the
//! slot, so contexts created never exceed the peak number of pipelines in
//! use at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use tracing::{debug, info, warn};
use vpipe_compute::{create_backend, BackendKind, GpuLimits};

use crate::error::{GraphError, GraphResult};
use crate::pipeline::{Pipeline, PipelineId};

// ============================================================================
// Configuration
// ============================================================================

/// Registry settings.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Backend used when a caller asks for [`BackendKind::Auto`].
    pub default_backend: BackendKind,
    /// Memory budget per backend context in bytes (None = detect).
    pub memory_limit: Option<u64>,
    /// Log lifecycle events at info level.
    pub verbose: bool,
}

/// Builder for [`PipelineRegistry`].
///
/// # Example
///
/// ```
/// use vpipe_compute::BackendKind;
/// use vpipe_graph::PipelineRegistry;
///
/// let registry = PipelineRegistry::builder()
///     .backend(BackendKind::Cpu)
///     .memory_limit_mb(64)
///     .build();
/// let id = registry.acquire(BackendKind::Auto).unwrap();
/// registry.release(id).unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    config: RegistryConfig,
}

impl RegistryBuilder {
    /// Create new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend `Auto` resolves to.
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.default_backend = backend;
        self
    }

    /// Set the memory budget per backend context in bytes.
    pub fn memory_limit(mut self, bytes: u64) -> Self {
        self.config.memory_limit = Some(bytes);
        self
    }

    /// Set the memory budget per backend context in megabytes.
    pub fn memory_limit_mb(mut self, mb: u64) -> Self {
        self.config.memory_limit = Some(mb.saturating_mul(1024 * 1024));
        self
    }

    /// Enable verbose output.
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.config.verbose = enabled;
        self
    }

    /// Build the registry.
    pub fn build(self) -> PipelineRegistry {
        PipelineRegistry::with_config(self.config)
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Owns every pipeline created by the application.
pub struct PipelineRegistry {
    config: RegistryConfig,
    pipelines: Mutex<Vec<Arc<Pipeline>>>,
    contexts: AtomicUsize,
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineRegistry {
    /// Registry with default settings.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Registry with explicit settings.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            pipelines: Mutex::new(Vec::new()),
            contexts: AtomicUsize::new(0),
        }
    }

    /// Start a [`RegistryBuilder`].
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Active settings.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn slots(&self, operation: &'static str) -> GraphResult<MutexGuard<'_, Vec<Arc<Pipeline>>>> {
        match self.pipelines.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(GraphError::Busy { operation }),
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!(operation, "recovering poisoned registry lock");
                Ok(poisoned.into_inner())
            }
        }
    }

    fn resolve(&self, kind: BackendKind) -> BackendKind {
        match kind {
            BackendKind::Auto => self.config.default_backend.resolve(),
            other => other,
        }
    }

    /// Returns an idle empty pipeline for `kind`, or creates one.
    ///
    /// A slot is reused only when it is released (not in use) and its graph is empty.
    pub fn acquire(&self, kind: BackendKind) -> GraphResult<PipelineId> {
        self.claim(kind).map(|(pipeline, _)| pipeline.id())
    }

    /// Like [`acquire`](Self::acquire), also returning the claim generation.
    pub(crate) fn claim(&self, kind: BackendKind) -> GraphResult<(Arc<Pipeline>, u64)> {
        let kind = self.resolve(kind);
        let mut slots = self.slots("acquire")?;

        for pipeline in slots.iter().filter(|p| p.kind() == kind) {
            if let Some(claim) = pipeline.try_claim() {
                self.log_lifecycle(pipeline.id(), kind, "pipeline reused");
                return Ok((Arc::clone(pipeline), claim));
            }
        }

        let limits = self.config.memory_limit.map(GpuLimits::with_memory);
        let backend = create_backend(kind, limits).map_err(GraphError::BackendUnavailable)?;
        let id = PipelineId(slots.len());
        let pipeline = Arc::new(Pipeline::new(id, kind, backend));
        let claim = pipeline.claim();
        slots.push(Arc::clone(&pipeline));
        self.contexts.fetch_add(1, Ordering::Relaxed);
        self.log_lifecycle(id, kind, "pipeline created");
        Ok((pipeline, claim))
    }

    /// Closes a pipeline and keeps its slot for reuse.
    pub fn release(&self, id: PipelineId) -> GraphResult<()> {
        let pipeline = self.pipeline(id)?;
        pipeline.close()?;
        self.log_lifecycle(id, pipeline.kind(), "pipeline released");
        Ok(())
    }

    /// Releases `pipeline` only while `claim` is its live generation.
    pub(crate) fn release_claim(&self, pipeline: &Pipeline, claim: u64) -> GraphResult<bool> {
        let released = pipeline.close_claim(claim)?;
        if released {
            self.log_lifecycle(pipeline.id(), pipeline.kind(), "pipeline released");
        }
        Ok(released)
    }

    /// Shared handle to a pipeline.
    pub fn pipeline(&self, id: PipelineId) -> GraphResult<Arc<Pipeline>> {
        self.slots("pipeline")?
            .get(id.0)
            .cloned()
            .ok_or(GraphError::UnknownPipeline(id.0))
    }

    /// Number of slots (in use or idle).
    pub fn len(&self) -> GraphResult<usize> {
        Ok(self.slots("len")?.len())
    }

    /// True when no pipeline was ever created (or after shutdown).
    pub fn is_empty(&self) -> GraphResult<bool> {
        Ok(self.slots("is_empty")?.is_empty())
    }

    /// Backend contexts created over the registry's lifetime.
    pub fn contexts_created(&self) -> usize {
        self.contexts.load(Ordering::Relaxed)
    }

    /// Closes every pipeline and drops all slots. Idempotent.
    ///
    /// Waits for in-flight calls; safe when nothing was ever acquired.
    pub fn shutdown(&self) {
        let mut slots = match self.pipelines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("recovering poisoned registry lock");
                poisoned.into_inner()
            }
        };
        if slots.is_empty() {
            return;
        }
        for pipeline in slots.iter() {
            pipeline.close_blocking();
        }
        let count = slots.len();
        slots.clear();
        info!(pipelines = count, "registry shut down");
    }

    fn log_lifecycle(&self, id: PipelineId, kind: BackendKind, event: &str) {
        if self.config.verbose {
            info!(pipeline = id.0, backend = %kind, "{event}");
        } else {
            debug!(pipeline = id.0, backend = %kind, "{event}");
        }
    }
}

impl Drop for PipelineRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PipelineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRegistry")
            .field("config", &self.config)
            .field("contexts", &self.contexts_created())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_config() {
        let registry = PipelineRegistry::builder()
            .backend(BackendKind::Cpu)
            .memory_limit_mb(2)
            .verbose(true)
            .build();
        assert_eq!(registry.config().default_backend, BackendKind::Cpu);
        assert_eq!(registry.config().memory_limit, Some(2 * 1024 * 1024));
        assert!(registry.config().verbose);
    }

    #[test]
    fn test_auto_resolves_to_cpu() {
        let registry = PipelineRegistry::new();
        let id = registry.acquire(BackendKind::Auto).unwrap();
        assert_eq!(registry.pipeline(id).unwrap().kind(), BackendKind::Cpu);
    }

    #[test]
    fn test_unavailable_backend_is_configuration_error() {
        let registry = PipelineRegistry::new();
        let err = registry.acquire(BackendKind::Cuda).unwrap_err();
        assert!(matches!(err, GraphError::BackendUnavailable(_)));
        assert!(err.is_configuration());
        assert_eq!(registry.contexts_created(), 0);
    }

    #[test]
    fn test_shutdown_without_pipelines() {
        let registry = PipelineRegistry::new();
        registry.shutdown();
        registry.shutdown();
        assert!(registry.is_empty().unwrap());
    }
}
