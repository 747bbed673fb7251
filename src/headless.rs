// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Endpoint resolution for headless Services.
//!
//! A headless Service (`clusterIP: None`) has no virtual IP; its hostname
//! resolves straight to the pods behind it. The pods are found through the
//! Service's EndpointSlices, then cross-checked against the Pod cache and the
//! Service selector.
//!
//! Each pod contributes a target picked in this order:
//!
//! 1. the pod's own `target` annotation
//! 2. the node's external addresses, for `endpoints-type: NodeExternalIP`
//! 3. the pod's host IP, for `endpoints-type: HostIP` or `publishHostIP`
//! 4. the slice address
//!
//! Pods with `spec.hostname` also get a per-pod name
//! `<pod hostname>.<service hostname>`.

use std::sync::Arc;

use k8s_openapi::api::core::v1::{Node, Pod, Service};
use k8s_openapi::api::discovery::v1::{Endpoint as SliceEndpoint, EndpointSlice};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::ResourceExt;
use tracing::debug;

use crate::annotations::{self, Access, EndpointsType};
use crate::constants::{ADDRESS_TYPE_IPV4, ADDRESS_TYPE_IPV6, KIND_POD};
use crate::endpoint::{Endpoint, Ttl};
use crate::nodes::node_addresses;
use crate::selector::Selector;
use crate::target::endpoints_for_hostname;
use crate::watch::EndpointSliceIndex;

/// Resolves headless Services against the Pod, Node and EndpointSlice caches.
pub struct HeadlessResolver<'a> {
    pub pods: &'a Store<Pod>,
    pub endpoint_slices: &'a EndpointSliceIndex,
    /// Needed for `NodeExternalIP`; without it such pods yield no target
    pub nodes: Option<&'a Store<Node>>,
    pub publish_host_ip: bool,
    pub always_publish_not_ready_addresses: bool,
    pub expose_internal_ipv6: bool,
}

/// Record names in first-seen order with their accumulated targets.
#[derive(Default)]
struct NameTargets(Vec<(String, Vec<String>)>);

impl NameTargets {
    fn add(&mut self, name: String, targets: &[String]) {
        let index = match self.0.iter().position(|(n, _)| *n == name) {
            Some(index) => index,
            None => {
                self.0.push((name, Vec::new()));
                self.0.len() - 1
            }
        };
        let entry = &mut self.0[index].1;
        for target in targets {
            if !entry.contains(target) {
                entry.push(target.clone());
            }
        }
    }
}

impl HeadlessResolver<'_> {
    /// Builds the endpoints for `hostname` of headless `service`.
    #[must_use]
    pub fn endpoints(
        &self,
        service: &Service,
        hostname: &str,
        ttl: Ttl,
        resource: &str,
        set_identifier: Option<&str>,
    ) -> Vec<Endpoint> {
        let namespace = service.namespace().unwrap_or_default();
        let name = service.name_any();
        let spec = service.spec.as_ref();

        let selector = Selector::from_map(&spec.and_then(|s| s.selector.clone()).unwrap_or_default());
        let publish_not_ready = self.always_publish_not_ready_addresses
            || spec
                .and_then(|s| s.publish_not_ready_addresses)
                .unwrap_or(false);
        let endpoints_type = annotations::endpoints_type(service.annotations());
        let use_host_ip = endpoints_type == Some(EndpointsType::HostIP) || self.publish_host_ip;
        let uses_slice_address = endpoints_type.is_none() && !use_host_ip;

        let mut per_pod = NameTargets::default();
        let mut aggregate: Vec<String> = Vec::new();

        for slice in self.endpoint_slices.for_service(&namespace, &name) {
            if uses_slice_address && !is_ip_slice(&slice) {
                debug!(
                    service = %name,
                    slice = %slice.name_any(),
                    address_type = %slice.address_type,
                    "Skipping non-IP EndpointSlice"
                );
                continue;
            }

            for entry in &slice.endpoints {
                if !publish_not_ready && !is_ready(entry) {
                    continue;
                }
                let Some(pod) = self.backing_pod(entry, &namespace, &selector) else {
                    continue;
                };

                let targets = self.pod_targets(&pod, entry, endpoints_type, use_host_ip);
                if targets.is_empty() {
                    debug!(service = %name, pod = %pod.name_any(), "Pod has no usable target");
                    continue;
                }

                if let Some(pod_hostname) = pod.spec.as_ref().and_then(|s| s.hostname.as_deref()) {
                    per_pod.add(format!("{pod_hostname}.{hostname}"), &targets);
                }
                for target in targets {
                    if !aggregate.contains(&target) {
                        aggregate.push(target);
                    }
                }
            }
        }

        let mut names = per_pod;
        if !aggregate.is_empty() {
            names.add(hostname.to_string(), &aggregate);
        }

        names
            .0
            .iter()
            .flat_map(|(name, targets)| {
                endpoints_for_hostname(name, targets, ttl, resource, set_identifier)
            })
            .collect()
    }

    /// The pod an EndpointSlice entry refers to, when it is cached and still
    /// selected by the Service.
    fn backing_pod(&self, entry: &SliceEndpoint, namespace: &str, selector: &Selector) -> Option<Arc<Pod>> {
        let target_ref = entry.target_ref.as_ref()?;
        if target_ref.kind.as_deref() != Some(KIND_POD) {
            return None;
        }
        let pod_name = target_ref.name.as_deref()?;

        let Some(pod) = self.pods.get(&ObjectRef::new(pod_name).within(namespace)) else {
            debug!(namespace = %namespace, pod = %pod_name, "EndpointSlice refers to unknown pod");
            return None;
        };
        selector.matches(pod.labels()).then_some(pod)
    }

    fn pod_targets(
        &self,
        pod: &Pod,
        entry: &SliceEndpoint,
        endpoints_type: Option<EndpointsType>,
        use_host_ip: bool,
    ) -> Vec<String> {
        let overridden = annotations::target_override(pod.annotations());
        if !overridden.is_empty() {
            return overridden;
        }

        if endpoints_type == Some(EndpointsType::NodeExternalIP) {
            let node_name = pod.spec.as_ref().and_then(|s| s.node_name.as_deref());
            return match (self.nodes, node_name) {
                (Some(nodes), Some(node_name)) => nodes
                    .get(&ObjectRef::new(node_name))
                    .map(|node| node_addresses(&node, Access::Public, self.expose_internal_ipv6))
                    .unwrap_or_default(),
                _ => Vec::new(),
            };
        }

        if use_host_ip {
            return pod
                .status
                .as_ref()
                .and_then(|s| s.host_ip.clone())
                .into_iter()
                .collect();
        }

        entry.addresses.first().cloned().into_iter().collect()
    }
}

/// An unset ready condition counts as ready.
fn is_ready(entry: &SliceEndpoint) -> bool {
    entry
        .conditions
        .as_ref()
        .and_then(|c| c.ready)
        .unwrap_or(true)
}

fn is_ip_slice(slice: &EndpointSlice) -> bool {
    slice.address_type == ADDRESS_TYPE_IPV4 || slice.address_type == ADDRESS_TYPE_IPV6
}

#[cfg(test)]
#[path = "headless_tests.rs"]
mod headless_tests;
