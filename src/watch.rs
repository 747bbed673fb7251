// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch caches for Services and the objects backing them.
//!
//! This module owns the in-memory reflector stores the source reads from.
//! Only the caches the service type filter can need are built:
//!
//! | Cache | Built when |
//! |-------|-----------|
//! | Service | always |
//! | Node | `NodePort` is allowed |
//! | Pod, EndpointSlice | `NodePort` or `ClusterIP` is allowed |
//!
//! The decision is computed once into [`WatchCapabilities`] and consumed both
//! when caches are built and when event handlers are attached.
//!
//! EndpointSlices are additionally indexed by `"<namespace>/<service>"` so a
//! headless Service finds its slices without scanning the whole store.
//!
//! # Populating caches
//!
//! [`WatchCaches::new`] returns the readable caches plus the matching
//! [`CacheWriters`]. [`WatchCaches::start`] spawns one watch task per cache
//! that feeds cluster events into those writers. Tests feed events directly.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use futures::StreamExt;
use k8s_openapi::api::core::v1::{Node, Pod, Service};
use k8s_openapi::api::discovery::v1::EndpointSlice;
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ServiceType, ServiceTypeFilter};
use crate::labels::K8S_SERVICE_NAME;
use crate::metrics;

// ============================================================================
// Capabilities
// ============================================================================

/// Object kinds the source can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchedKind {
    Service,
    Node,
    Pod,
    EndpointSlice,
}

impl WatchedKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchedKind::Service => "Service",
            WatchedKind::Node => "Node",
            WatchedKind::Pod => "Pod",
            WatchedKind::EndpointSlice => "EndpointSlice",
        }
    }
}

impl fmt::Display for WatchedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which optional caches exist. The Service cache always exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchCapabilities {
    pub nodes: bool,
    pub pods: bool,
    pub endpoint_slices: bool,
}

impl WatchCapabilities {
    /// Every cache.
    #[must_use]
    pub fn all() -> Self {
        Self {
            nodes: true,
            pods: true,
            endpoint_slices: true,
        }
    }

    /// Derives the caches needed under `filter`.
    #[must_use]
    pub fn for_filter(filter: &ServiceTypeFilter) -> Self {
        let node_port = filter.allows(ServiceType::NodePort);
        let cluster_ip = filter.allows(ServiceType::ClusterIP);
        Self {
            nodes: node_port,
            pods: node_port || cluster_ip,
            endpoint_slices: node_port || cluster_ip,
        }
    }

    /// Kinds whose changes invoke event handlers.
    ///
    /// Services always do. Nodes do when cached. EndpointSlices do when
    /// cached and `listen_endpoint_events` is set. Pods never do.
    #[must_use]
    pub fn handler_kinds(&self, listen_endpoint_events: bool) -> Vec<WatchedKind> {
        let mut kinds = vec![WatchedKind::Service];
        if self.endpoint_slices && listen_endpoint_events {
            kinds.push(WatchedKind::EndpointSlice);
        }
        if self.nodes {
            kinds.push(WatchedKind::Node);
        }
        kinds
    }
}

// ============================================================================
// Event Handlers
// ============================================================================

/// Callback invoked (without payload) when a watched object changes.
pub type EventHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<WatchedKind, Vec<EventHandler>>>>,
}

impl HandlerRegistry {
    fn subscribe(&self, kind: WatchedKind, handler: EventHandler) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(handler);
    }

    fn notify(&self, kind: WatchedKind) {
        let handlers: Vec<EventHandler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();
        for handler in handlers {
            handler();
        }
    }
}

// ============================================================================
// EndpointSlice Index
// ============================================================================

#[derive(Debug, Default)]
struct SliceMaps {
    by_service: HashMap<String, HashSet<ObjectRef<EndpointSlice>>>,
    owner: HashMap<ObjectRef<EndpointSlice>, String>,
}

impl SliceMaps {
    fn insert(&mut self, slice: &EndpointSlice) {
        let obj_ref = ObjectRef::from_obj(slice);
        self.remove(&obj_ref);

        let Some(key) = service_index_key(slice) else {
            return;
        };
        self.by_service
            .entry(key.clone())
            .or_default()
            .insert(obj_ref.clone());
        self.owner.insert(obj_ref, key);
    }

    fn remove(&mut self, obj_ref: &ObjectRef<EndpointSlice>) {
        if let Some(key) = self.owner.remove(obj_ref) {
            if let Some(refs) = self.by_service.get_mut(&key) {
                refs.remove(obj_ref);
                if refs.is_empty() {
                    self.by_service.remove(&key);
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct SliceIndexState {
    live: SliceMaps,
    /// Built during a relist, swapped in when it completes
    pending: Option<SliceMaps>,
}

/// Index key for Services and EndpointSlices: `"<namespace>/<service>"`.
#[must_use]
pub fn index_key(namespace: &str, service_name: &str) -> String {
    format!("{namespace}/{service_name}")
}

fn service_index_key(slice: &EndpointSlice) -> Option<String> {
    let service_name = slice.labels().get(K8S_SERVICE_NAME)?;
    Some(index_key(&slice.namespace().unwrap_or_default(), service_name))
}

/// EndpointSlice store plus a reverse index from owning Service to slices.
#[derive(Clone)]
pub struct EndpointSliceIndex {
    store: Store<EndpointSlice>,
    state: Arc<RwLock<SliceIndexState>>,
}

impl EndpointSliceIndex {
    fn new(store: Store<EndpointSlice>) -> Self {
        Self {
            store,
            state: Arc::default(),
        }
    }

    /// Applies a watch event to the index. The store is updated separately
    /// by its reflector writer.
    pub fn apply_event(&self, event: &watcher::Event<EndpointSlice>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match event {
            watcher::Event::Apply(slice) => state.live.insert(slice),
            watcher::Event::Delete(slice) => state.live.remove(&ObjectRef::from_obj(slice)),
            watcher::Event::Init => state.pending = Some(SliceMaps::default()),
            watcher::Event::InitApply(slice) => {
                state.pending.get_or_insert_with(SliceMaps::default).insert(slice);
            }
            watcher::Event::InitDone => {
                if let Some(rebuilt) = state.pending.take() {
                    state.live = rebuilt;
                }
            }
        }
    }

    /// Slices owned by Service `namespace/name`, sorted by slice name.
    #[must_use]
    pub fn for_service(&self, namespace: &str, name: &str) -> Vec<Arc<EndpointSlice>> {
        let refs: Vec<ObjectRef<EndpointSlice>> = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .live
            .by_service
            .get(&index_key(namespace, name))
            .map(|refs| refs.iter().cloned().collect())
            .unwrap_or_default();

        let mut slices: Vec<Arc<EndpointSlice>> =
            refs.iter().filter_map(|r| self.store.get(r)).collect();
        slices.sort_by_key(|slice| slice.name_any());
        slices
    }

    /// The underlying EndpointSlice store.
    #[must_use]
    pub fn store(&self) -> &Store<EndpointSlice> {
        &self.store
    }
}

// ============================================================================
// Writers
// ============================================================================

type EventHook<K> = Box<dyn Fn(&watcher::Event<K>) + Send + Sync>;

/// Writes watch events for one kind into its store and fires handlers.
pub struct CacheWriter<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    writer: reflector::store::Writer<K>,
    kind: WatchedKind,
    handlers: HandlerRegistry,
    hook: Option<EventHook<K>>,
}

impl<K> CacheWriter<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    /// Applies `event` to the store (and index, for EndpointSlices), then
    /// invokes subscribed handlers for applies, deletes and completed relists.
    pub fn apply(&mut self, event: &watcher::Event<K>) {
        self.writer.apply_watcher_event(event);
        if let Some(hook) = &self.hook {
            hook(event);
        }

        metrics::record_watch_event(self.kind.as_str());

        if matches!(
            event,
            watcher::Event::Apply(_) | watcher::Event::Delete(_) | watcher::Event::InitDone
        ) {
            self.handlers.notify(self.kind);
        }
    }
}

/// Writers for every cache that exists.
pub struct CacheWriters {
    pub services: CacheWriter<Service>,
    pub nodes: Option<CacheWriter<Node>>,
    pub pods: Option<CacheWriter<Pod>>,
    pub endpoint_slices: Option<CacheWriter<EndpointSlice>>,
}

// ============================================================================
// Caches
// ============================================================================

/// Aborts watch tasks when the last cache handle is dropped.
struct WatchTasks(Vec<JoinHandle<()>>);

impl Drop for WatchTasks {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

/// Read side of the watch caches.
#[derive(Clone)]
pub struct WatchCaches {
    capabilities: WatchCapabilities,
    pub services: Store<Service>,
    pub nodes: Option<Store<Node>>,
    pub pods: Option<Store<Pod>>,
    pub endpoint_slices: Option<EndpointSliceIndex>,
    handlers: HandlerRegistry,
    tasks: Option<Arc<WatchTasks>>,
}

impl WatchCaches {
    /// Builds empty caches for `capabilities` and the writers that fill them.
    #[must_use]
    pub fn new(capabilities: WatchCapabilities) -> (Self, CacheWriters) {
        let handlers = HandlerRegistry::default();
        let (services, services_writer) = reflector::store::<Service>();

        let (nodes, nodes_writer) = if capabilities.nodes {
            let (store, w) = reflector::store::<Node>();
            (Some(store), Some(cache_writer(w, WatchedKind::Node, &handlers)))
        } else {
            (None, None)
        };

        let (pods, pods_writer) = if capabilities.pods {
            let (store, w) = reflector::store::<Pod>();
            (Some(store), Some(cache_writer(w, WatchedKind::Pod, &handlers)))
        } else {
            (None, None)
        };

        let (endpoint_slices, slices_writer) = if capabilities.endpoint_slices {
            let (store, w) = reflector::store::<EndpointSlice>();
            let index = EndpointSliceIndex::new(store);
            let hook_index = index.clone();
            let mut slices_writer = cache_writer(w, WatchedKind::EndpointSlice, &handlers);
            slices_writer.hook = Some(Box::new(move |event| hook_index.apply_event(event)));
            (Some(index), Some(slices_writer))
        } else {
            (None, None)
        };

        let caches = Self {
            capabilities,
            services,
            nodes,
            pods,
            endpoint_slices,
            handlers: handlers.clone(),
            tasks: None,
        };

        let writers = CacheWriters {
            services: cache_writer(services_writer, WatchedKind::Service, &handlers),
            nodes: nodes_writer,
            pods: pods_writer,
            endpoint_slices: slices_writer,
        };

        (caches, writers)
    }

    /// Builds caches for `capabilities` and starts watching the cluster.
    ///
    /// Services, Pods and EndpointSlices are watched in `namespace` when one
    /// is given, otherwise cluster-wide. Nodes are always cluster-wide. The
    /// watch tasks stop when the last clone of the returned caches is dropped.
    #[must_use]
    pub fn start(client: &Client, namespace: Option<&str>, capabilities: WatchCapabilities) -> Self {
        let (mut caches, writers) = Self::new(capabilities);
        let mut tasks = Vec::new();

        tasks.push(spawn_watch(scoped_api::<Service>(client, namespace), writers.services));
        if let Some(nodes) = writers.nodes {
            tasks.push(spawn_watch(Api::<Node>::all(client.clone()), nodes));
        }
        if let Some(pods) = writers.pods {
            tasks.push(spawn_watch(scoped_api::<Pod>(client, namespace), pods));
        }
        if let Some(slices) = writers.endpoint_slices {
            tasks.push(spawn_watch(scoped_api::<EndpointSlice>(client, namespace), slices));
        }

        info!(
            namespace = namespace.unwrap_or("<all>"),
            nodes = capabilities.nodes,
            pods = capabilities.pods,
            endpoint_slices = capabilities.endpoint_slices,
            "Started watch caches"
        );

        caches.tasks = Some(Arc::new(WatchTasks(tasks)));
        caches
    }

    #[must_use]
    pub fn capabilities(&self) -> WatchCapabilities {
        self.capabilities
    }

    /// Attaches `handler` to every cache whose changes are relevant.
    ///
    /// Returns the kinds the handler was attached to.
    pub fn add_event_handler(
        &self,
        handler: EventHandler,
        listen_endpoint_events: bool,
    ) -> Vec<WatchedKind> {
        let kinds = self.capabilities.handler_kinds(listen_endpoint_events);
        for kind in &kinds {
            self.handlers.subscribe(*kind, handler.clone());
        }
        debug!(kinds = ?kinds, "Registered event handler");
        kinds
    }

    /// Returns `true` once every existing store has completed its first list.
    pub async fn wait_until_ready(&self) -> bool {
        let mut ready = self.services.wait_until_ready().await.is_ok();
        if let Some(nodes) = &self.nodes {
            ready &= nodes.wait_until_ready().await.is_ok();
        }
        if let Some(pods) = &self.pods {
            ready &= pods.wait_until_ready().await.is_ok();
        }
        if let Some(slices) = &self.endpoint_slices {
            ready &= slices.store().wait_until_ready().await.is_ok();
        }
        ready
    }
}

fn cache_writer<K>(
    writer: reflector::store::Writer<K>,
    kind: WatchedKind,
    handlers: &HandlerRegistry,
) -> CacheWriter<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    CacheWriter {
        writer,
        kind,
        handlers: handlers.clone(),
        hook: None,
    }
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

fn spawn_watch<K>(api: Api<K>, mut writer: CacheWriter<K>) -> JoinHandle<()>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + fmt::Debug + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let kind = writer.kind;
        let mut stream = watcher(api, watcher::Config::default())
            .default_backoff()
            .boxed();

        while let Some(event) = stream.next().await {
            match event {
                Ok(event) => writer.apply(&event),
                Err(e) => warn!(kind = %kind, error = %e, "Watch stream error, retrying"),
            }
        }

        warn!(kind = %kind, "Watch stream ended");
    })
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod watch_tests;
