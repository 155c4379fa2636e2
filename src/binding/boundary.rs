//! Suspense Boundary
//!
//! Runs a view built from suspense bindings. While any binding the view
//! reads is pending the view is suspended; whenever one of its keys settles
//! the whole view runs again, so a view reading several keys tolerates them
//! arriving in any order.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use crate::binding::{Binding, Suspend, SuspenseBinding};
use crate::cache::{AsyncProducer, CacheKey, KeyedAsyncCache};
use crate::error::{Result, SwrError};

/// Result of a single evaluation of a view.
#[derive(Debug)]
pub enum RenderOutcome<O> {
    /// Every key the view read had a value
    Ready(O),
    /// At least one key is still loading; show the fallback
    Fallback,
    /// A key the view read failed
    Failed(SwrError),
}

// == Suspense Boundary ==
pub struct SuspenseBoundary {
    name: String,
    wake: Arc<Notify>,
    /// Bindings mounted by earlier renders, keyed by cache id and key
    bindings: HashMap<String, Box<dyn Any + Send + Sync>>,
    renders: u64,
}

impl SuspenseBoundary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wake: Arc::new(Notify::new()),
            bindings: HashMap::new(),
            renders: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// How many times a view has been evaluated in this boundary.
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    /// Number of keys bound so far.
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    // == Poll Render ==
    /// Evaluates `view` once.
    pub fn poll_render<O, F>(&mut self, view: F) -> RenderOutcome<O>
    where
        F: FnOnce(&mut RenderCx<'_>) -> std::result::Result<O, Suspend>,
    {
        self.renders += 1;
        match view(&mut RenderCx { boundary: &mut *self }) {
            Ok(output) => RenderOutcome::Ready(output),
            Err(Suspend::Pending) => RenderOutcome::Fallback,
            Err(Suspend::Failed(error)) => RenderOutcome::Failed(error),
        }
    }

    // == Render ==
    /// Evaluates `view` until it produces output or fails.
    ///
    /// Between evaluations the boundary sleeps until a key it has bound
    /// settles or its fetch is interrupted. Failures are returned to the
    /// caller. A view may only suspend through [`RenderCx::suspend_on`]:
    /// returning `Suspend::Pending` before anything was bound fails with
    /// [`SwrError::NothingBound`], since nothing would ever wake the boundary.
    pub async fn render<O, F>(&mut self, mut view: F) -> Result<O>
    where
        F: FnMut(&mut RenderCx<'_>) -> std::result::Result<O, Suspend>,
    {
        loop {
            match self.poll_render(&mut view) {
                RenderOutcome::Ready(output) => {
                    debug!(boundary = %self.name, renders = self.renders, "rendered");
                    return Ok(output);
                }
                RenderOutcome::Failed(error) => {
                    warn!(boundary = %self.name, error = %error, "render failed");
                    return Err(error);
                }
                RenderOutcome::Fallback if self.bindings.is_empty() => {
                    warn!(boundary = %self.name, "suspended without binding a key");
                    return Err(SwrError::NothingBound(self.name.clone()));
                }
                RenderOutcome::Fallback => {
                    trace!(boundary = %self.name, bound = self.bindings.len(), "suspended");
                    self.wake.notified().await;
                }
            }
        }
    }
}

impl std::fmt::Debug for SuspenseBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuspenseBoundary")
            .field("name", &self.name)
            .field("bindings", &self.bindings.len())
            .field("renders", &self.renders)
            .finish()
    }
}

// == Render Context ==
/// Handed to a view on every evaluation.
pub struct RenderCx<'a> {
    boundary: &'a mut SuspenseBoundary,
}

impl RenderCx<'_> {
    /// Reads `key` from `cache`, suspending the view while it is loading.
    ///
    /// The first read of a `(cache, key)` pair mounts a binding that lives as
    /// long as the boundary; later reads reuse it and ignore `producer`.
    /// Bind every key before propagating with `?` to load them in parallel.
    pub fn suspend_on<K, T, E, P>(
        &mut self,
        cache: &KeyedAsyncCache<K, T, E>,
        key: K,
        producer: P,
    ) -> std::result::Result<Arc<T>, Suspend>
    where
        K: CacheKey,
        T: Send + Sync + 'static,
        E: std::error::Error + Send + Sync + 'static,
        P: AsyncProducer<K, T, E>,
    {
        let slot = format!("{}/{:?}", cache.id(), key);
        if let Some(binding) = self
            .boundary
            .bindings
            .get(&slot)
            .and_then(|binding| binding.downcast_ref::<SuspenseBinding<K, T, E>>())
        {
            return binding.evaluate();
        }

        let wake = Arc::clone(&self.boundary.wake);
        let rerender = Arc::new(move || wake.notify_one());
        let binding = SuspenseBinding::bind(cache, key, producer, rerender)?;
        let output = binding.evaluate();
        self.boundary.bindings.insert(slot, Box::new(binding));
        output
    }
}
