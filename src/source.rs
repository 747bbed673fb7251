// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Service endpoint source.
//!
//! [`ServiceSource`] turns the Services in its watch caches into the DNS
//! [`Endpoint`]s that should exist for them. Each call to
//! [`Source::endpoints`] is a full recompute:
//!
//! 1. list Services from the cache and drop those excluded by namespace,
//!    label selector, annotation filter, controller identity or type filter
//! 2. ask the annotation policy for hostnames
//! 3. resolve targets for the Service's type (load balancer, node ports,
//!    headless pods, cluster IPs, external name) unless overridden
//! 4. build per-record-type endpoints and merge them across Services
//!
//! Construction fails fast on an invalid template, selector or type filter.
//! A template that fails to render for any Service fails the whole call.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::{Client, ResourceExt};
use tracing::{debug, info, warn};

use crate::annotations::{self, HostnameGroup, HostnameOrigin};
use crate::config::{CompatibilityMode, ServiceSourceConfig, ValidatedConfig};
use crate::constants::{
    CLUSTER_IP_NONE, SERVICE_TYPE_CLUSTER_IP, SERVICE_TYPE_EXTERNAL_NAME,
    SERVICE_TYPE_LOAD_BALANCER, SERVICE_TYPE_NODE_PORT,
};
use crate::endpoint::{Endpoint, Ttl};
use crate::errors::SourceError;
use crate::headless::HeadlessResolver;
use crate::labels::service_resource_value;
use crate::merge::merge_endpoints;
use crate::metrics;
use crate::nodes::{candidate_nodes, kops_node_targets, node_port_targets, srv_endpoints};
use crate::resolver::{HostnameResolver, SystemResolver};
use crate::target::endpoints_for_hostname;
use crate::watch::{EventHandler, WatchCapabilities, WatchCaches, WatchedKind};

/// A producer of DNS endpoints.
#[async_trait]
pub trait Source: Send + Sync {
    /// Computes every endpoint this source currently wants published.
    ///
    /// # Errors
    ///
    /// Returns an error when the computation cannot complete; no partial
    /// result is returned.
    async fn endpoints(&self) -> Result<Vec<Endpoint>, SourceError>;

    /// Registers `handler` to be called whenever a watched object changes.
    fn add_event_handler(&self, handler: EventHandler) -> Vec<WatchedKind>;
}

/// Targets a Service publishes under its regular hostnames.
enum TargetPlan {
    /// Fixed targets
    Targets(Vec<String>),
    /// Node addresses plus one SRV record per node port
    NodePort(Vec<String>),
    /// Resolved per hostname from backing pods
    Headless,
    Nothing,
}

/// Per-Service values shared by every endpoint built for it.
struct ServiceContext<'a> {
    service: &'a Service,
    ttl: Ttl,
    resource: String,
    set_identifier: Option<String>,
}

impl ServiceContext<'_> {
    fn endpoints(&self, hostname: &str, targets: &[String]) -> Vec<Endpoint> {
        let endpoints = endpoints_for_hostname(
            hostname,
            targets,
            self.ttl,
            &self.resource,
            self.set_identifier.as_deref(),
        );
        if endpoints.is_empty() && !targets.is_empty() {
            debug!(resource = %self.resource, hostname = %hostname, "Skipping invalid hostname");
        }
        endpoints
    }
}

/// Endpoint source backed by Service watch caches.
pub struct ServiceSource {
    config: Arc<ValidatedConfig>,
    caches: WatchCaches,
    resolver: Arc<dyn HostnameResolver>,
}

impl ServiceSource {
    /// Validates `config` and starts watching the cluster.
    ///
    /// Only the caches the service type filter can need are created.
    ///
    /// # Errors
    ///
    /// Returns a construction error when the configuration is invalid.
    pub fn new(client: &Client, config: &ServiceSourceConfig) -> Result<Self, SourceError> {
        let validated = config.validate()?;
        let capabilities = WatchCapabilities::for_filter(&validated.type_filter);
        let caches = WatchCaches::start(client, validated.namespace.as_deref(), capabilities);

        info!(
            namespace = validated.namespace.as_deref().unwrap_or("<all>"),
            compatibility = ?validated.policy.compatibility(),
            "Created Service endpoint source"
        );

        Ok(Self {
            config: Arc::new(validated),
            caches,
            resolver: Arc::new(SystemResolver),
        })
    }

    /// Builds a source over existing caches and a custom resolver.
    ///
    /// # Errors
    ///
    /// Returns a construction error when the configuration is invalid.
    pub fn with_caches(
        config: &ServiceSourceConfig,
        caches: WatchCaches,
        resolver: Arc<dyn HostnameResolver>,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            config: Arc::new(config.validate()?),
            caches,
            resolver,
        })
    }

    #[must_use]
    pub fn caches(&self) -> &WatchCaches {
        &self.caches
    }

    async fn translate(&self) -> Result<Vec<Endpoint>, SourceError> {
        let mut services = self.caches.services.state();
        services.sort_by_key(|svc| (svc.namespace().unwrap_or_default(), svc.name_any()));

        let mut candidates: Vec<Endpoint> = Vec::new();
        for service in &services {
            if let Some(reason) = self.skip_reason(service) {
                debug!(
                    namespace = %service.namespace().unwrap_or_default(),
                    name = %service.name_any(),
                    reason = reason,
                    "Skipping Service"
                );
                metrics::record_service_skipped(reason);
                continue;
            }
            candidates.extend(self.service_endpoints(service).await?);
        }

        Ok(merge_endpoints(candidates))
    }

    /// Why `service` is excluded, if it is.
    fn skip_reason(&self, service: &Service) -> Option<&'static str> {
        if let Some(namespace) = &self.config.namespace {
            if service.namespace().as_deref() != Some(namespace.as_str()) {
                return Some("namespace");
            }
        }
        if !self.config.label_selector.matches(service.labels()) {
            return Some("label_selector");
        }
        if !self.config.annotation_filter.matches(service.annotations()) {
            return Some("annotation_filter");
        }
        if annotations::is_foreign_controller(service.annotations()) {
            return Some("controller");
        }
        if !self.config.type_filter.allows_str(service_type(service)) {
            return Some("service_type");
        }
        None
    }

    async fn service_endpoints(&self, service: &Service) -> Result<Vec<Endpoint>, SourceError> {
        let groups = self.config.policy.hostnames(service)?;
        if groups.is_empty() {
            metrics::record_service_skipped("no_hostnames");
            return Ok(Vec::new());
        }

        let namespace = service.namespace().unwrap_or_default();
        let ctx = ServiceContext {
            service,
            ttl: annotations::ttl(service.annotations()),
            resource: service_resource_value(&namespace, &service.name_any()),
            set_identifier: annotations::set_identifier(service.annotations()),
        };

        let plan = self.target_plan(service).await;
        let override_targets = annotations::target_override(service.annotations());

        let mut endpoints = Vec::new();
        for group in &groups {
            debug!(resource = %ctx.resource, origin = %group.origin, "Resolved hostnames");

            if group.origin == HostnameOrigin::Legacy(CompatibilityMode::KopsDnsController)
                && service_type(service) == SERVICE_TYPE_NODE_PORT
                && override_targets.is_empty()
            {
                endpoints.extend(self.kops_node_port_endpoints(&ctx, group));
                continue;
            }

            let internal_uses_plan = matches!(group.origin, HostnameOrigin::Legacy(_));
            for hostname in &group.external {
                endpoints.extend(self.planned_endpoints(&ctx, &plan, hostname));
            }
            for hostname in &group.internal {
                if internal_uses_plan {
                    endpoints.extend(self.planned_endpoints(&ctx, &plan, hostname));
                } else {
                    let targets = if override_targets.is_empty() {
                        cluster_ips(service)
                    } else {
                        override_targets.clone()
                    };
                    endpoints.extend(ctx.endpoints(hostname, &targets));
                }
            }
        }

        if endpoints.is_empty() {
            debug!(resource = %ctx.resource, "Service has no resolvable targets");
        }
        Ok(endpoints)
    }

    async fn target_plan(&self, service: &Service) -> TargetPlan {
        let override_targets = annotations::target_override(service.annotations());
        if !override_targets.is_empty() {
            return TargetPlan::Targets(override_targets);
        }

        match service_type(service) {
            SERVICE_TYPE_CLUSTER_IP if is_headless(service) => TargetPlan::Headless,
            SERVICE_TYPE_CLUSTER_IP if self.config.publish_internal => {
                TargetPlan::Targets(cluster_ips(service))
            }
            SERVICE_TYPE_LOAD_BALANCER => {
                TargetPlan::Targets(self.load_balancer_targets(service).await)
            }
            SERVICE_TYPE_NODE_PORT => TargetPlan::NodePort(self.node_targets(service)),
            SERVICE_TYPE_EXTERNAL_NAME => TargetPlan::Targets(external_name_targets(service)),
            _ => TargetPlan::Nothing,
        }
    }

    fn planned_endpoints(&self, ctx: &ServiceContext<'_>, plan: &TargetPlan, hostname: &str) -> Vec<Endpoint> {
        match plan {
            TargetPlan::Targets(targets) => ctx.endpoints(hostname, targets),
            TargetPlan::NodePort(targets) => {
                let mut endpoints = ctx.endpoints(hostname, targets);
                if !endpoints.is_empty() {
                    endpoints.extend(srv_endpoints(
                        ctx.service,
                        hostname,
                        ctx.ttl,
                        &ctx.resource,
                        ctx.set_identifier.as_deref(),
                    ));
                }
                endpoints
            }
            TargetPlan::Headless => match self.headless_resolver() {
                Some(resolver) => resolver.endpoints(
                    ctx.service,
                    hostname,
                    ctx.ttl,
                    &ctx.resource,
                    ctx.set_identifier.as_deref(),
                ),
                None => {
                    debug!(resource = %ctx.resource, "No pod caches for headless Service");
                    Vec::new()
                }
            },
            TargetPlan::Nothing => Vec::new(),
        }
    }

    fn headless_resolver(&self) -> Option<HeadlessResolver<'_>> {
        Some(HeadlessResolver {
            pods: self.caches.pods.as_ref()?,
            endpoint_slices: self.caches.endpoint_slices.as_ref()?,
            nodes: self.caches.nodes.as_ref(),
            publish_host_ip: self.config.publish_host_ip,
            always_publish_not_ready_addresses: self.config.always_publish_not_ready_addresses,
            expose_internal_ipv6: self.config.expose_internal_ipv6,
        })
    }

    fn node_targets(&self, service: &Service) -> Vec<String> {
        let Some(nodes) = self.caches.nodes.as_ref() else {
            return Vec::new();
        };
        let candidates = candidate_nodes(service, nodes, self.caches.pods.as_ref());
        let access = annotations::access(service.annotations()).or(self.config.default_access);
        node_port_targets(&candidates, access, self.config.expose_internal_ipv6)
    }

    fn kops_node_port_endpoints(&self, ctx: &ServiceContext<'_>, group: &HostnameGroup) -> Vec<Endpoint> {
        if !group.external.is_empty() && !group.internal.is_empty() {
            debug!(resource = %ctx.resource, "Both kops annotations set, publishing nothing");
            return Vec::new();
        }
        let Some(nodes) = self.caches.nodes.as_ref() else {
            return Vec::new();
        };
        let (external, internal) = kops_node_targets(nodes, self.config.expose_internal_ipv6);

        let external_endpoints = group
            .external
            .iter()
            .flat_map(|hostname| ctx.endpoints(hostname, &external));
        let internal_endpoints = group
            .internal
            .iter()
            .flat_map(|hostname| ctx.endpoints(hostname, &internal));
        external_endpoints.chain(internal_endpoints).collect()
    }

    /// Ingress targets of a load balancer, or `spec.externalIPs` when set.
    ///
    /// With hostname resolution enabled, ingress hostnames are replaced by
    /// their addresses. A failed lookup drops only that hostname.
    async fn load_balancer_targets(&self, service: &Service) -> Vec<String> {
        let external_ips = external_ips(service);
        if !external_ips.is_empty() {
            return external_ips;
        }

        let ingress = service
            .status
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .cloned()
            .unwrap_or_default();

        let mut targets = Vec::new();
        for entry in ingress {
            if let Some(ip) = entry.ip.filter(|ip| !ip.is_empty()) {
                targets.push(ip);
            }
            let Some(hostname) = entry.hostname.filter(|h| !h.is_empty()) else {
                continue;
            };
            if !self.config.resolve_load_balancer_hostname {
                targets.push(hostname);
                continue;
            }
            match self.resolver.lookup(&hostname).await {
                Ok(ips) => targets.extend(ips.iter().map(ToString::to_string)),
                Err(e) => {
                    warn!(
                        service = %service.name_any(),
                        hostname = %hostname,
                        error = %e,
                        "Dropping load balancer hostname that failed to resolve"
                    );
                    metrics::record_hostname_lookup_failure();
                }
            }
        }
        targets
    }
}

#[async_trait]
impl Source for ServiceSource {
    async fn endpoints(&self) -> Result<Vec<Endpoint>, SourceError> {
        let started = Instant::now();
        match self.translate().await {
            Ok(endpoints) => {
                metrics::record_translation_success(started.elapsed(), endpoints.len());
                debug!(count = endpoints.len(), "Translated Services");
                Ok(endpoints)
            }
            Err(e) => {
                metrics::record_translation_error(started.elapsed());
                Err(e)
            }
        }
    }

    fn add_event_handler(&self, handler: EventHandler) -> Vec<WatchedKind> {
        self.caches
            .add_event_handler(handler, self.config.listen_endpoint_events)
    }
}

/// `spec.type`, defaulting to `ClusterIP`.
fn service_type(service: &Service) -> &str {
    service
        .spec
        .as_ref()
        .and_then(|s| s.type_.as_deref())
        .unwrap_or(SERVICE_TYPE_CLUSTER_IP)
}

fn is_headless(service: &Service) -> bool {
    service.spec.as_ref().and_then(|s| s.cluster_ip.as_deref()) == Some(CLUSTER_IP_NONE)
}

/// Cluster IPs of `service`: `clusterIPs`, else a comma split of `clusterIP`.
fn cluster_ips(service: &Service) -> Vec<String> {
    let Some(spec) = service.spec.as_ref() else {
        return Vec::new();
    };
    let ips: Vec<String> = match spec.cluster_ips.as_ref().filter(|ips| !ips.is_empty()) {
        Some(ips) => ips.clone(),
        None => spec
            .cluster_ip
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|ip| ip.trim().to_string())
            .collect(),
    };
    ips.into_iter()
        .filter(|ip| !ip.is_empty() && ip != CLUSTER_IP_NONE)
        .collect()
}

fn external_ips(service: &Service) -> Vec<String> {
    service
        .spec
        .as_ref()
        .and_then(|s| s.external_ips.clone())
        .unwrap_or_default()
}

fn external_name_targets(service: &Service) -> Vec<String> {
    let external_ips = external_ips(service);
    if !external_ips.is_empty() {
        return external_ips;
    }
    service
        .spec
        .as_ref()
        .and_then(|s| s.external_name.clone())
        .filter(|name| !name.is_empty())
        .into_iter()
        .collect()
}

#[cfg(test)]
#[path = "source_tests.rs"]
mod source_tests;
