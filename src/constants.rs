// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Service DNS source.
//!
//! This module contains the annotation keys, sentinel values, and numeric
//! defaults used throughout the codebase. Constants are organized by category.

// ============================================================================
// Annotation Keys
// ============================================================================

/// Comma-separated list of hostnames to publish for a Service
pub const HOSTNAME_ANNOTATION: &str = "external-dns.alpha.kubernetes.io/hostname";

/// Comma-separated list of hostnames published with the Service's cluster IPs
pub const INTERNAL_HOSTNAME_ANNOTATION: &str = "external-dns.alpha.kubernetes.io/internal-hostname";

/// Explicit target override (IPs or hostnames, comma-separated)
pub const TARGET_ANNOTATION: &str = "external-dns.alpha.kubernetes.io/target";

/// Record TTL, as seconds or a Go-style duration
pub const TTL_ANNOTATION: &str = "external-dns.alpha.kubernetes.io/ttl";

/// Access scope for node addresses (`public` or `private`)
pub const ACCESS_ANNOTATION: &str = "external-dns.alpha.kubernetes.io/access";

/// Endpoints-type override for headless Services (`NodeExternalIP` or `HostIP`)
pub const ENDPOINTS_TYPE_ANNOTATION: &str = "external-dns.alpha.kubernetes.io/endpoints-type";

/// Set identifier for routing policies sharing one name and type
pub const SET_IDENTIFIER_ANNOTATION: &str = "external-dns.alpha.kubernetes.io/set-identifier";

/// Controller identity marker for multi-controller environments
pub const CONTROLLER_ANNOTATION: &str = "external-dns.alpha.kubernetes.io/controller";

/// Value of [`CONTROLLER_ANNOTATION`] that identifies this source
pub const CONTROLLER_ANNOTATION_VALUE: &str = "dns-controller";

// ============================================================================
// Legacy Compatibility Keys
// ============================================================================

/// Hostname annotation used by the `mate` compatibility mode
pub const MATE_DNSNAME_ANNOTATION: &str = "zalando.org/dnsname";

/// Label key that gates the `molecule` compatibility mode
pub const MOLECULE_LABEL_KEY: &str = "dns";

/// Label value that gates the `molecule` compatibility mode
pub const MOLECULE_LABEL_VALUE: &str = "route53";

/// Hostname annotation used by the `molecule` compatibility mode
pub const MOLECULE_DOMAIN_NAME_ANNOTATION: &str = "domainName";

/// External hostname annotation used by the `kops-dns-controller` compatibility mode
pub const KOPS_EXTERNAL_ANNOTATION: &str = "dns.alpha.kubernetes.io/external";

/// Internal hostname annotation used by the `kops-dns-controller` compatibility mode
pub const KOPS_INTERNAL_ANNOTATION: &str = "dns.alpha.kubernetes.io/internal";

// ============================================================================
// Annotation Values
// ============================================================================

/// Access scope selecting external node addresses
pub const ACCESS_PUBLIC: &str = "public";

/// Access scope selecting internal node addresses
pub const ACCESS_PRIVATE: &str = "private";

/// Endpoints type publishing the backing node's external address
pub const ENDPOINTS_TYPE_NODE_EXTERNAL_IP: &str = "NodeExternalIP";

/// Endpoints type publishing the pod's host IP
pub const ENDPOINTS_TYPE_HOST_IP: &str = "HostIP";

// ============================================================================
// Kubernetes Object Values
// ============================================================================

/// Service type `ClusterIP`
pub const SERVICE_TYPE_CLUSTER_IP: &str = "ClusterIP";

/// Service type `NodePort`
pub const SERVICE_TYPE_NODE_PORT: &str = "NodePort";

/// Service type `LoadBalancer`
pub const SERVICE_TYPE_LOAD_BALANCER: &str = "LoadBalancer";

/// Service type `ExternalName`
pub const SERVICE_TYPE_EXTERNAL_NAME: &str = "ExternalName";

/// All Service types accepted by the service type filter, in display order
pub const SUPPORTED_SERVICE_TYPES: [&str; 4] = [
    SERVICE_TYPE_CLUSTER_IP,
    SERVICE_TYPE_NODE_PORT,
    SERVICE_TYPE_LOAD_BALANCER,
    SERVICE_TYPE_EXTERNAL_NAME,
];

/// `spec.clusterIP` value marking a headless Service
pub const CLUSTER_IP_NONE: &str = "None";

/// External traffic policy restricting node targets to nodes running a serving pod
pub const TRAFFIC_POLICY_LOCAL: &str = "Local";

/// Node address type for externally routable addresses
pub const NODE_EXTERNAL_IP: &str = "ExternalIP";

/// Node address type for cluster-internal addresses
pub const NODE_INTERNAL_IP: &str = "InternalIP";

/// Pod phase for running pods
pub const POD_PHASE_RUNNING: &str = "Running";

/// Pod condition type signalling readiness
pub const POD_CONDITION_READY: &str = "Ready";

/// Kind used by EndpointSlice target references pointing at pods
pub const KIND_POD: &str = "Pod";

/// EndpointSlice address type for IPv4 addresses
pub const ADDRESS_TYPE_IPV4: &str = "IPv4";

/// EndpointSlice address type for IPv6 addresses
pub const ADDRESS_TYPE_IPV6: &str = "IPv6";

/// Protocol used in SRV names when a port does not declare one
pub const DEFAULT_SRV_PROTOCOL: &str = "tcp";

/// SRV priority published for node port records
pub const SRV_PRIORITY: u16 = 0;

/// SRV weight published for node port records
pub const SRV_WEIGHT: u16 = 50;

// ============================================================================
// DNS Limits
// ============================================================================

/// Maximum length of a single DNS label
pub const MAX_DNS_LABEL_LENGTH: usize = 63;

/// Maximum length of a full DNS name (without the trailing dot)
pub const MAX_DNS_NAME_LENGTH: usize = 253;

/// Largest TTL accepted from annotations, in seconds
pub const MAX_TTL_SECONDS: i64 = i32::MAX as i64;

// ============================================================================
// Runtime Defaults
// ============================================================================

/// Default interval between full re-translations in the binary (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 60;

/// Default bind address for the metrics server
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Number of tokio worker threads used by the binary
pub const TOKIO_WORKER_THREADS: usize = 4;
