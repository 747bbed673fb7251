// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configuration for the Service DNS source.
//!
//! [`ServiceSourceConfig`] is the raw, serde-deserialisable form (loaded from
//! YAML by the binary or built in code). [`ServiceSourceConfig::validate`]
//! turns it into an immutable [`ValidatedConfig`]: selectors and the FQDN
//! template are parsed, and the service type filter is checked. Any problem
//! is reported there, before a source exists.
//!
//! # Example
//!
//! ```rust
//! use svcdns::config::ServiceSourceConfig;
//!
//! let config = ServiceSourceConfig {
//!     fqdn_template: "{{.Name}}.example.org".to_string(),
//!     service_type_filter: vec!["LoadBalancer".to_string()],
//!     ..Default::default()
//! };
//! let validated = config.validate().unwrap();
//! assert!(validated.type_filter.is_enabled());
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::annotations::{Access, AnnotationPolicy};
use crate::constants::{
    SERVICE_TYPE_CLUSTER_IP, SERVICE_TYPE_EXTERNAL_NAME, SERVICE_TYPE_LOAD_BALANCER,
    SERVICE_TYPE_NODE_PORT, SUPPORTED_SERVICE_TYPES,
};
use crate::errors::SourceError;
use crate::selector::Selector;
use crate::template::FqdnTemplate;

// ============================================================================
// Compatibility Mode
// ============================================================================

/// Legacy annotation sets understood in addition to the canonical ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompatibilityMode {
    /// `zalando.org/dnsname`
    #[serde(rename = "mate")]
    Mate,
    /// `dns=route53` label plus `domainName` annotation
    #[serde(rename = "molecule")]
    Molecule,
    /// `dns.alpha.kubernetes.io/external` and `/internal`
    #[serde(rename = "kops-dns-controller")]
    KopsDnsController,
}

impl CompatibilityMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CompatibilityMode::Mate => "mate",
            CompatibilityMode::Molecule => "molecule",
            CompatibilityMode::KopsDnsController => "kops-dns-controller",
        }
    }
}

impl fmt::Display for CompatibilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompatibilityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mate" => Ok(CompatibilityMode::Mate),
            "molecule" => Ok(CompatibilityMode::Molecule),
            "kops-dns-controller" => Ok(CompatibilityMode::KopsDnsController),
            other => Err(format!("unknown compatibility mode '{other}'")),
        }
    }
}

// ============================================================================
// Service Types
// ============================================================================

/// Kubernetes Service types handled by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceType {
    ClusterIP,
    NodePort,
    LoadBalancer,
    ExternalName,
}

impl ServiceType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::ClusterIP => SERVICE_TYPE_CLUSTER_IP,
            ServiceType::NodePort => SERVICE_TYPE_NODE_PORT,
            ServiceType::LoadBalancer => SERVICE_TYPE_LOAD_BALANCER,
            ServiceType::ExternalName => SERVICE_TYPE_EXTERNAL_NAME,
        }
    }
}

impl FromStr for ServiceType {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            SERVICE_TYPE_CLUSTER_IP => Ok(ServiceType::ClusterIP),
            SERVICE_TYPE_NODE_PORT => Ok(ServiceType::NodePort),
            SERVICE_TYPE_LOAD_BALANCER => Ok(ServiceType::LoadBalancer),
            SERVICE_TYPE_EXTERNAL_NAME => Ok(ServiceType::ExternalName),
            other => Err(SourceError::UnsupportedServiceType {
                value: other.to_string(),
                supported: SUPPORTED_SERVICE_TYPES.join(", "),
            }),
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of Service types the source publishes.
///
/// A disabled filter (no entries) allows every type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceTypeFilter {
    allowed: Option<BTreeSet<ServiceType>>,
}

impl ServiceTypeFilter {
    /// Parses filter entries. Blank entries are ignored, so `[]` and `[""]`
    /// both disable the filter.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::UnsupportedServiceType`] for an unknown entry.
    pub fn parse(values: &[String]) -> Result<Self, SourceError> {
        let allowed = values
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(ServiceType::from_str)
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Self {
            allowed: (!allowed.is_empty()).then_some(allowed),
        })
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.allowed.is_some()
    }

    #[must_use]
    pub fn allows(&self, service_type: ServiceType) -> bool {
        self.allowed
            .as_ref()
            .is_none_or(|allowed| allowed.contains(&service_type))
    }

    /// Like [`allows`](Self::allows) for a raw `spec.type` value. Unknown
    /// types only pass a disabled filter.
    #[must_use]
    pub fn allows_str(&self, service_type: &str) -> bool {
        match service_type.parse::<ServiceType>() {
            Ok(service_type) => self.allows(service_type),
            Err(_) => !self.is_enabled(),
        }
    }
}

// ============================================================================
// Raw Configuration
// ============================================================================

/// Raw configuration as written by an operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceSourceConfig {
    /// Namespace to watch; empty watches all namespaces
    pub namespace: String,
    /// Selector evaluated against Service annotations
    pub annotation_filter: String,
    /// Selector evaluated against Service labels
    pub label_selector: String,
    /// FQDN template used when no hostname annotation applies
    pub fqdn_template: String,
    /// Emit template hostnames in addition to annotation hostnames
    #[serde(rename = "combineFQDNAndAnnotation")]
    pub combine_fqdn_and_annotation: bool,
    pub compatibility: Option<CompatibilityMode>,
    /// Publish ClusterIP Services that are not headless
    pub publish_internal: bool,
    /// Publish host IPs for headless Services
    #[serde(rename = "publishHostIP")]
    pub publish_host_ip: bool,
    pub always_publish_not_ready_addresses: bool,
    pub service_type_filter: Vec<String>,
    pub ignore_hostname_annotation: bool,
    pub resolve_load_balancer_hostname: bool,
    /// Let EndpointSlice changes trigger event handlers
    pub listen_endpoint_events: bool,
    /// Publish internal IPv6 node addresses under public access
    #[serde(rename = "exposeInternalIPv6")]
    pub expose_internal_ipv6: bool,
    /// Access scope used when a Service has no `access` annotation
    pub default_access: Option<Access>,
}

impl ServiceSourceConfig {
    /// Loads a configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML for
    /// this structure.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a construction error for an invalid FQDN template, annotation
    /// filter, label selector, or service type filter entry.
    pub fn validate(&self) -> Result<ValidatedConfig, SourceError> {
        let template = FqdnTemplate::parse(&self.fqdn_template)?;

        let annotation_filter: Selector =
            self.annotation_filter
                .parse()
                .map_err(|reason| SourceError::InvalidAnnotationFilter {
                    expression: self.annotation_filter.clone(),
                    reason,
                })?;

        let label_selector: Selector =
            self.label_selector
                .parse()
                .map_err(|reason| SourceError::InvalidLabelSelector {
                    expression: self.label_selector.clone(),
                    reason,
                })?;

        let type_filter = ServiceTypeFilter::parse(&self.service_type_filter)?;

        let namespace = Some(self.namespace.trim())
            .filter(|ns| !ns.is_empty())
            .map(str::to_string);

        Ok(ValidatedConfig {
            namespace,
            annotation_filter,
            label_selector,
            type_filter,
            policy: AnnotationPolicy::new(
                self.compatibility,
                self.ignore_hostname_annotation,
                self.combine_fqdn_and_annotation,
                template,
            ),
            publish_internal: self.publish_internal,
            publish_host_ip: self.publish_host_ip,
            always_publish_not_ready_addresses: self.always_publish_not_ready_addresses,
            resolve_load_balancer_hostname: self.resolve_load_balancer_hostname,
            listen_endpoint_events: self.listen_endpoint_events,
            expose_internal_ipv6: self.expose_internal_ipv6,
            default_access: self.default_access,
        })
    }
}

// ============================================================================
// Validated Configuration
// ============================================================================

/// Immutable, validated configuration shared by every translation call.
#[derive(Debug)]
pub struct ValidatedConfig {
    /// Namespace scope; `None` means all namespaces
    pub namespace: Option<String>,
    pub annotation_filter: Selector,
    pub label_selector: Selector,
    pub type_filter: ServiceTypeFilter,
    pub policy: AnnotationPolicy,
    pub publish_internal: bool,
    pub publish_host_ip: bool,
    pub always_publish_not_ready_addresses: bool,
    pub resolve_load_balancer_hostname: bool,
    pub listen_endpoint_events: bool,
    pub expose_internal_ipv6: bool,
    pub default_access: Option<Access>,
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
