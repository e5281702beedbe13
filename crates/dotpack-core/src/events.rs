//! In-process typed publish/subscribe.
//!
//! The bus carries cross-component notifications (cache invalidation,
//! project-set changes) that are independent of the request/response
//! protocol. Event names and payloads form a closed set: every event is a
//! type implementing [`BusEvent`], so subscribing to or emitting an unknown
//! event does not compile.
//!
//! Handlers run synchronously on the emitting thread, in registration order.
//! A panicking handler is caught and logged; the remaining handlers still run
//! and the emitter never sees the panic.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::{error, trace};

/// An event that can travel over the [`EventBus`].
pub trait BusEvent: Any + Send + Sync {
    /// Stable name used in logs.
    const NAME: &'static str;
}

/// Projects were added, removed or had their package references changed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectsChanged {
    pub changed_paths: Vec<String>,
}

impl BusEvent for ProjectsChanged {
    const NAME: &'static str = "projectsChanged";
}

/// Cached metadata for a package is no longer trustworthy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageCacheInvalidated {
    pub package_id: String,
}

impl BusEvent for PackageCacheInvalidated {
    const NAME: &'static str = "packageCacheInvalidated";
}

/// The configured package sources changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcesChanged;

impl BusEvent for SourcesChanged {
    const NAME: &'static str = "sourcesChanged";
}

/// How a project cache entry was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTransition {
    /// Patched from an operation result before any re-scan.
    Optimistic,
    /// Replaced by a fresh discovery pass.
    Authoritative,
}

/// The project cache changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectCacheUpdated {
    pub transition: CacheTransition,
    pub paths: Vec<String>,
}

impl BusEvent for ProjectCacheUpdated {
    const NAME: &'static str = "projectCacheUpdated";
}

type Handler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

struct Registration {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<TypeId, Vec<Registration>>,
}

impl Registry {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn remove(&mut self, type_id: TypeId, id: u64) -> bool {
        let Some(list) = self.handlers.get_mut(&type_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(&type_id);
        }
        removed
    }
}

fn lock(registry: &Mutex<Registry>) -> std::sync::MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cheaply cloneable handle to a shared event bus.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count: usize = lock(&self.registry).handlers.values().map(Vec::len).sum();
        f.debug_struct("EventBus").field("handlers", &count).finish()
    }
}

/// Handle returned by [`EventBus::on`] and [`EventBus::once`].
///
/// Disposing removes exactly the registration that produced it. Dropping the
/// handle without disposing leaves the handler registered.
#[must_use = "dropping a Subscription does not unsubscribe; call dispose()"]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    type_id: TypeId,
    id: u64,
    event: &'static str,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish()
    }
}

impl Subscription {
    /// Remove the registration. Returns false if it was already gone.
    pub fn dispose(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => lock(&registry).remove(self.type_id, self.id),
            None => false,
        }
    }

    /// Whether the registration is still present on the bus.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry.upgrade().is_some_and(|registry| {
            lock(&registry)
                .handlers
                .get(&self.type_id)
                .is_some_and(|list| list.iter().any(|r| r.id == self.id))
        })
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every future `E`.
    pub fn on<E, F>(&self, handler: F) -> Subscription
    where
        E: BusEvent,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });

        let mut registry = lock(&self.registry);
        let id = registry.allocate_id();
        self.insert::<E>(&mut registry, id, handler)
    }

    /// Register `handler` for the next `E` only.
    ///
    /// The registration removes itself before the handler body runs, so a
    /// handler that re-emits `E` does not trigger itself again.
    pub fn once<E, F>(&self, handler: F) -> Subscription
    where
        E: BusEvent,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.allocate_id();
        let weak = Arc::downgrade(&self.registry);
        let fired = AtomicBool::new(false);

        let handler: Handler = Arc::new(move |event: &dyn Any| {
            if fired.swap(true, Ordering::SeqCst) {
                return;
            }
            if let Some(registry) = weak.upgrade() {
                lock(&registry).remove(TypeId::of::<E>(), id);
            }
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });

        self.insert::<E>(&mut registry, id, handler)
    }

    fn insert<E: BusEvent>(&self, registry: &mut Registry, id: u64, handler: Handler) -> Subscription {
        registry
            .handlers
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Registration { id, handler });

        trace!(event = E::NAME, id, "subscribed");

        Subscription {
            registry: Arc::downgrade(&self.registry),
            type_id: TypeId::of::<E>(),
            id,
            event: E::NAME,
        }
    }

    /// Deliver `event` to every handler registered when the call starts.
    ///
    /// The handler list is snapshotted first. A handler disposed by an
    /// earlier handler still runs for this emit, and a handler added during
    /// it first sees the next one.
    pub fn emit<E: BusEvent>(&self, event: &E) {
        let handlers: Vec<Handler> = {
            let registry = lock(&self.registry);
            registry
                .handlers
                .get(&TypeId::of::<E>())
                .map(|list| list.iter().map(|r| Arc::clone(&r.handler)).collect())
                .unwrap_or_default()
        };

        if handlers.is_empty() {
            trace!(event = E::NAME, "no subscribers");
            return;
        }

        for handler in handlers {
            let result = catch_unwind(AssertUnwindSafe(|| handler(event as &dyn Any)));
            if let Err(panic) = result {
                error!(
                    event = E::NAME,
                    panic = %panic_message(panic.as_ref()),
                    "event handler panicked"
                );
            }
        }
    }

    /// Number of handlers currently registered for `E`.
    #[must_use]
    pub fn handler_count<E: BusEvent>(&self) -> usize {
        lock(&self.registry)
            .handlers
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
