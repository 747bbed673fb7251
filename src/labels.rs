// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label keys read from cluster objects and written onto generated endpoints.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/reference/labels-annotations-taints/
// ============================================================================

/// Label on an `EndpointSlice` naming the Service that owns it
pub const K8S_SERVICE_NAME: &str = "kubernetes.io/service-name";

/// Role label carried by worker nodes (used by the `kops-dns-controller` mode)
pub const K8S_NODE_ROLE_NODE: &str = "node-role.kubernetes.io/node";

// ============================================================================
// Endpoint Labels
// ============================================================================

/// Provenance label identifying the object an endpoint was generated from
pub const RESOURCE_LABEL: &str = "resource";

/// Builds the provenance label value for a Service (`service/<namespace>/<name>`)
#[must_use]
pub fn service_resource_value(namespace: &str, name: &str) -> String {
    format!("service/{namespace}/{name}")
}
