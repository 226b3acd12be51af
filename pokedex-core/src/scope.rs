//! Per-request ambient state
//!
//! A [`RequestScope`] brackets one inbound operation. Everything awaited
//! inside [`RequestScope::run`] can reach it through
//! [`RequestScope::current`] without threading a context parameter, and
//! every `tracing` event emitted inside carries the request id. The scope
//! owns the [`BatchRegistry`], so loaders never outlive their request.
//!
//! Backed by a tokio task-local: concurrent requests on other tasks never
//! observe each other's scope. Tasks spawned with `tokio::spawn` start
//! without a scope; use [`RequestScope::spawn`] to carry it over.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, Instrument, Span};
use uuid::Uuid;

use crate::batch::BatchRegistry;
use crate::error::ScopeError;

tokio::task_local! {
    static CURRENT_SCOPE: RequestScope;
}

/// Handle to the state of one inbound operation
#[derive(Clone)]
pub struct RequestScope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    request_id: String,
    span: Span,
    registry: BatchRegistry,
}

impl RequestScope {
    /// Create a scope with a fresh, empty loader registry.
    pub fn new(request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        let span = tracing::info_span!("request", request_id = %request_id);
        Self {
            inner: Arc::new(ScopeInner {
                request_id,
                span,
                registry: BatchRegistry::new(),
            }),
        }
    }

    /// Create a scope with a random UUID v4 request id.
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn request_id(&self) -> &str {
        &self.inner.request_id
    }

    /// Logger handle for this request.
    pub fn span(&self) -> &Span {
        &self.inner.span
    }

    pub fn registry(&self) -> &BatchRegistry {
        &self.inner.registry
    }

    /// Run `work` with this scope active.
    ///
    /// The scope stays visible across every suspension point of `work`.
    /// Once `work` completes (successfully or not) the scope is no longer
    /// reachable from it.
    pub async fn run<F>(self, work: F) -> F::Output
    where
        F: Future,
    {
        let span = self.inner.span.clone();
        let registry_probe = self.clone();

        debug!(parent: &span, "request scope opened");
        let output = CURRENT_SCOPE.scope(self, work).instrument(span.clone()).await;
        debug!(
            parent: &span,
            loaders = registry_probe.registry().len(),
            "request scope closed"
        );
        output
    }

    /// The scope of the operation currently executing.
    pub fn current() -> Result<Self, ScopeError> {
        CURRENT_SCOPE
            .try_with(Clone::clone)
            .map_err(|_| ScopeError::NoActiveScope)
    }

    /// Like [`RequestScope::current`], for code that also runs outside requests.
    pub fn try_current() -> Option<Self> {
        CURRENT_SCOPE.try_with(Clone::clone).ok()
    }

    /// Spawn `work` on the runtime with this scope active inside it.
    pub fn spawn<F>(&self, work: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(self.clone().run(work))
    }
}

impl std::fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScope")
            .field("request_id", &self.inner.request_id)
            .field("loaders", &self.inner.registry.len())
            .finish()
    }
}
