//! The bundle every handler receives at dispatch time.
//!
//! There is no global service registry: the host builds one [`HostContext`]
//! and passes it to the mediator, and tests build their own with fakes.

use crate::handlers::details::DetailsJob;
use crate::handlers::search::SearchJob;
use crate::lifecycle::LifecycleController;
use crate::services::{
    DetailsService, OperationExecutor, ProjectDiscovery, SearchService, SourceProvider,
};
use crate::sink::MessageSink;
use dotpack_core::events::{self, EventBus, Subscription};
use dotpack_core::state::{DetailsCache, ProjectCache, SelectionState, SourcesCache};
use dotpack_core::Config;
use dotpack_proto::{Notification, ProjectsChanged};
use futures::FutureExt;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, error};

/// Collaborators wired into the host. Any of them may be missing.
#[derive(Clone, Default)]
pub struct Services {
    pub search: Option<Arc<dyn SearchService>>,
    pub details: Option<Arc<dyn DetailsService>>,
    pub discovery: Option<Arc<dyn ProjectDiscovery>>,
    pub executor: Option<Arc<dyn OperationExecutor>>,
    pub sources: Option<Arc<dyn SourceProvider>>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("search", &self.search.is_some())
            .field("details", &self.details.is_some())
            .field("discovery", &self.discovery.is_some())
            .field("executor", &self.executor.is_some())
            .field("sources", &self.sources.is_some())
            .finish()
    }
}

impl Services {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_search(mut self, service: Arc<dyn SearchService>) -> Self {
        self.search = Some(service);
        self
    }

    #[must_use]
    pub fn with_details(mut self, service: Arc<dyn DetailsService>) -> Self {
        self.details = Some(service);
        self
    }

    #[must_use]
    pub fn with_discovery(mut self, service: Arc<dyn ProjectDiscovery>) -> Self {
        self.discovery = Some(service);
        self
    }

    #[must_use]
    pub fn with_executor(mut self, service: Arc<dyn OperationExecutor>) -> Self {
        self.executor = Some(service);
        self
    }

    #[must_use]
    pub fn with_sources(mut self, service: Arc<dyn SourceProvider>) -> Self {
        self.sources = Some(service);
        self
    }
}

/// Resolve an optional collaborator, logging at error severity when it is
/// not wired.
pub(crate) fn require<T: ?Sized>(service: Option<&Arc<T>>, name: &'static str) -> Option<Arc<T>> {
    if service.is_none() {
        error!(service = name, "service not available");
    }
    service.cloned()
}

/// Mutable state shared by the handlers.
pub struct HostState {
    pub projects: ProjectCache,
    pub selection: SelectionState,
    pub sources: SourcesCache,
    pub details_cache: Arc<DetailsCache>,
    pub search: LifecycleController<SearchJob>,
    pub details: LifecycleController<DetailsJob>,
    /// Query of the last search the service answered; written by search jobs.
    pub last_query: Arc<RwLock<String>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl fmt::Debug for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostState")
            .field("projects", &self.projects.len())
            .field("details_cache", &self.details_cache.len())
            .field("search", &self.search)
            .field("details", &self.details)
            .finish_non_exhaustive()
    }
}

/// Everything a handler needs: output channel, collaborators, state, config.
#[derive(Clone)]
pub struct HostContext {
    pub sink: Arc<dyn MessageSink>,
    pub services: Services,
    pub state: Arc<HostState>,
    pub config: Arc<Config>,
    pub bus: EventBus,
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext")
            .field("services", &self.services)
            .field("state", &self.state)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl HostContext {
    /// Build the context and wire the bus.
    ///
    /// Every bus `ProjectsChanged` is forwarded to the UI as one unsolicited
    /// `projectsChanged` notification.
    pub fn new(config: Config, sink: Arc<dyn MessageSink>, services: Services) -> Self {
        let bus = EventBus::new();
        let details_cache = Arc::new(DetailsCache::new());
        let mut subscriptions = details_cache.attach(&bus);

        let forward = Arc::clone(&sink);
        subscriptions.push(bus.on::<events::ProjectsChanged, _>(move |event| {
            forward.post(Notification::ProjectsChanged(ProjectsChanged {
                changed_paths: Some(event.changed_paths.clone()),
            }));
        }));

        let state = HostState {
            projects: ProjectCache::new(bus.clone()),
            selection: SelectionState::new(),
            sources: SourcesCache::new(bus.clone()),
            details_cache,
            search: LifecycleController::debounced(
                "search",
                config.search_debounce(),
                |job: SearchJob, token| job.run(token).boxed(),
            ),
            details: LifecycleController::immediate("details", |job: DetailsJob, token| {
                job.run(token).boxed()
            }),
            last_query: Arc::default(),
            subscriptions: Mutex::new(subscriptions),
        };

        debug!(services = ?services, "host context ready");

        Self {
            sink,
            services,
            state: Arc::new(state),
            config: Arc::new(config),
            bus,
        }
    }

    pub fn post(&self, notification: Notification) {
        self.sink.post(notification);
    }

    /// Tear down: stop both controllers and drop the bus wiring.
    pub fn shutdown(&self) {
        self.state.search.dispose();
        self.state.details.dispose();
        let subscriptions = std::mem::take(
            &mut *self
                .state
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for subscription in subscriptions {
            subscription.dispose();
        }
        debug!("host context shut down");
    }
}
