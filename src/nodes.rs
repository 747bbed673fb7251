// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Node target resolution for node-exposed Services.
//!
//! A `NodePort` Service is reachable on every node it may be routed through,
//! so its records point at node addresses:
//!
//! 1. With `externalTrafficPolicy: Local` only nodes running a selected pod
//!    that is Running, Ready and not terminating are considered. Otherwise
//!    every node is.
//! 2. Per node, the access scope picks addresses: `private` takes internal
//!    addresses, `public` takes external addresses plus internal IPv6 when
//!    `exposeInternalIPv6` is set. Without an explicit scope, external
//!    addresses are used when the cluster has any, else internal ones.
//! 3. One SRV record per node port points at the Service hostname.

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;

use k8s_openapi::api::core::v1::{Node, Pod, Service};
use kube::runtime::reflector::Store;
use kube::ResourceExt;
use tracing::debug;

use crate::annotations::Access;
use crate::constants::{
    DEFAULT_SRV_PROTOCOL, NODE_EXTERNAL_IP, NODE_INTERNAL_IP, POD_CONDITION_READY,
    POD_PHASE_RUNNING, SRV_PRIORITY, SRV_WEIGHT, TRAFFIC_POLICY_LOCAL,
};
use crate::endpoint::{Endpoint, RecordType, Ttl};
use crate::labels::K8S_NODE_ROLE_NODE;
use crate::selector::{find_matching, Selector};

/// Node addresses split by type.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct AddressSets {
    external: Vec<String>,
    internal: Vec<String>,
    internal_ipv6: Vec<String>,
}

impl AddressSets {
    fn collect<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        let mut sets = Self::default();
        for node in nodes {
            let addresses = node
                .status
                .as_ref()
                .and_then(|s| s.addresses.as_ref())
                .into_iter()
                .flatten();
            for address in addresses {
                let value = address.address.clone();
                match address.type_.as_str() {
                    NODE_EXTERNAL_IP => push_unique(&mut sets.external, value),
                    NODE_INTERNAL_IP => {
                        if is_ipv6(&value) {
                            push_unique(&mut sets.internal_ipv6, value.clone());
                        }
                        push_unique(&mut sets.internal, value);
                    }
                    _ => {}
                }
            }
        }
        sets
    }

    fn public(&self, expose_internal_ipv6: bool) -> Vec<String> {
        let mut targets = self.external.clone();
        if expose_internal_ipv6 {
            for address in &self.internal_ipv6 {
                push_unique(&mut targets, address.clone());
            }
        }
        targets
    }

    fn select(&self, access: Option<Access>, expose_internal_ipv6: bool) -> Vec<String> {
        match access {
            Some(Access::Public) => self.public(expose_internal_ipv6),
            Some(Access::Private) => self.internal.clone(),
            None if !self.external.is_empty() => self.public(expose_internal_ipv6),
            None => self.internal.clone(),
        }
    }
}

fn push_unique(targets: &mut Vec<String>, value: String) {
    if !targets.contains(&value) {
        targets.push(value);
    }
}

fn is_ipv6(address: &str) -> bool {
    matches!(address.parse::<IpAddr>(), Ok(IpAddr::V6(_)))
}

/// Addresses of a single node under an explicit access scope.
#[must_use]
pub fn node_addresses(node: &Node, access: Access, expose_internal_ipv6: bool) -> Vec<String> {
    AddressSets::collect([node]).select(Some(access), expose_internal_ipv6)
}

/// Returns `true` for a pod that is Running, Ready and not terminating.
#[must_use]
pub fn is_serving_pod(pod: &Pod) -> bool {
    if pod.metadata.deletion_timestamp.is_some() {
        return false;
    }
    let Some(status) = pod.status.as_ref() else {
        return false;
    };
    let running = status.phase.as_deref() == Some(POD_PHASE_RUNNING);
    let ready = status
        .conditions
        .as_ref()
        .into_iter()
        .flatten()
        .any(|c| c.type_ == POD_CONDITION_READY && c.status == "True");
    running && ready
}

/// Nodes a node-exposed Service's traffic may land on, sorted by name.
#[must_use]
pub fn candidate_nodes(
    service: &Service,
    nodes: &Store<Node>,
    pods: Option<&Store<Pod>>,
) -> Vec<Arc<Node>> {
    let spec = service.spec.as_ref();
    let local = spec.and_then(|s| s.external_traffic_policy.as_deref()) == Some(TRAFFIC_POLICY_LOCAL);

    let mut candidates: Vec<Arc<Node>> = if local {
        let namespace = service.namespace().unwrap_or_default();
        let selector = Selector::from_map(&spec.and_then(|s| s.selector.clone()).unwrap_or_default());
        let serving_nodes: BTreeSet<String> = pods
            .map(|pods| find_matching(pods, &namespace, &selector))
            .unwrap_or_default()
            .iter()
            .filter(|pod| is_serving_pod(pod))
            .filter_map(|pod| pod.spec.as_ref().and_then(|s| s.node_name.clone()))
            .collect();

        debug!(
            service = %service.name_any(),
            nodes = ?serving_nodes,
            "Local traffic policy restricts node targets"
        );

        nodes
            .state()
            .into_iter()
            .filter(|node| serving_nodes.contains(&node.name_any()))
            .collect()
    } else {
        nodes.state()
    };

    candidates.sort_by_key(|node| node.name_any());
    candidates
}

/// Node targets for a node-exposed Service.
#[must_use]
pub fn node_port_targets(
    nodes: &[Arc<Node>],
    access: Option<Access>,
    expose_internal_ipv6: bool,
) -> Vec<String> {
    AddressSets::collect(nodes.iter().map(|node| &**node)).select(access, expose_internal_ipv6)
}

/// Node targets for the `kops-dns-controller` compatibility mode.
///
/// Only nodes carrying the worker role label count. Returns the external
/// and internal target lists.
#[must_use]
pub fn kops_node_targets(nodes: &Store<Node>, expose_internal_ipv6: bool) -> (Vec<String>, Vec<String>) {
    let mut workers: Vec<Arc<Node>> = nodes
        .state()
        .into_iter()
        .filter(|node| node.labels().contains_key(K8S_NODE_ROLE_NODE))
        .collect();
    workers.sort_by_key(|node| node.name_any());

    let sets = AddressSets::collect(workers.iter().map(|node| &**node));
    (sets.public(expose_internal_ipv6), sets.internal.clone())
}

/// SRV records for each node port of `service`, pointing at `hostname`.
#[must_use]
pub fn srv_endpoints(
    service: &Service,
    hostname: &str,
    ttl: Ttl,
    resource: &str,
    set_identifier: Option<&str>,
) -> Vec<Endpoint> {
    let ports = service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .into_iter()
        .flatten();

    ports
        .filter_map(|port| {
            let node_port = port.node_port.filter(|p| *p > 0)?;
            let protocol = port
                .protocol
                .as_deref()
                .map_or_else(|| DEFAULT_SRV_PROTOCOL.to_string(), str::to_lowercase);
            let name = format!("_{}._{}.{}", service.name_any(), protocol, hostname);
            let target = format!("{SRV_PRIORITY} {SRV_WEIGHT} {node_port} {hostname}");
            Endpoint::new(&name, RecordType::SRV, vec![target], ttl).map(|ep| {
                ep.with_resource(resource)
                    .with_set_identifier(set_identifier.map(str::to_string))
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "nodes_tests.rs"]
mod nodes_tests;
