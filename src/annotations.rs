// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Annotation policy for Services.
//!
//! Reads per-object directives from annotations (hostnames, target override,
//! TTL, access scope, endpoints type, set identifier, controller identity) and
//! decides which hostname source applies.
//!
//! # Hostname precedence
//!
//! Hostname sources are tried in a fixed order, highest first:
//!
//! 1. the legacy compatibility table, when a compatibility mode is set
//! 2. the `hostname` / `internal-hostname` annotations, unless ignored
//! 3. the FQDN template, when configured
//!
//! The first source yielding hostnames wins. With `combineFQDNAndAnnotation`
//! the template is evaluated as well and its hostnames follow the winner's.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CompatibilityMode;
use crate::constants::{
    ACCESS_ANNOTATION, ACCESS_PRIVATE, ACCESS_PUBLIC, CONTROLLER_ANNOTATION,
    CONTROLLER_ANNOTATION_VALUE, ENDPOINTS_TYPE_ANNOTATION, ENDPOINTS_TYPE_HOST_IP,
    ENDPOINTS_TYPE_NODE_EXTERNAL_IP, HOSTNAME_ANNOTATION, INTERNAL_HOSTNAME_ANNOTATION,
    KOPS_EXTERNAL_ANNOTATION, KOPS_INTERNAL_ANNOTATION, MATE_DNSNAME_ANNOTATION,
    MAX_TTL_SECONDS, MOLECULE_DOMAIN_NAME_ANNOTATION, MOLECULE_LABEL_KEY, MOLECULE_LABEL_VALUE,
    SET_IDENTIFIER_ANNOTATION, TARGET_ANNOTATION, TTL_ANNOTATION,
};
use crate::duration::parse_go_duration;
use crate::endpoint::{normalize_dns_name, Ttl};
use crate::errors::SourceError;
use crate::template::FqdnTemplate;

// ============================================================================
// Directive Values
// ============================================================================

/// Which node addresses a node-exposed Service publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// External addresses (plus internal IPv6 when enabled)
    Public,
    /// Internal addresses only
    Private,
}

impl FromStr for Access {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ACCESS_PUBLIC => Ok(Access::Public),
            ACCESS_PRIVATE => Ok(Access::Private),
            other => Err(format!("unknown access scope '{other}'")),
        }
    }
}

/// Address published for each headless Service entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointsType {
    /// The backing node's external address(es)
    NodeExternalIP,
    /// The pod's host IP
    HostIP,
}

impl FromStr for EndpointsType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ENDPOINTS_TYPE_NODE_EXTERNAL_IP => Ok(EndpointsType::NodeExternalIP),
            ENDPOINTS_TYPE_HOST_IP => Ok(EndpointsType::HostIP),
            other => Err(format!("unknown endpoints type '{other}'")),
        }
    }
}

// ============================================================================
// Annotation Readers
// ============================================================================

/// Splits a comma-separated hostname list.
///
/// Entries are trimmed and lose one trailing dot; empty entries are dropped.
/// Syntax validation happens when endpoints are built.
#[must_use]
pub fn split_hostnames(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(normalize_dns_name)
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Explicit targets from the `target` annotation, case preserved.
#[must_use]
pub fn target_override(annotations: &BTreeMap<String, String>) -> Vec<String> {
    annotations
        .get(TARGET_ANNOTATION)
        .map(|value| split_hostnames(value))
        .unwrap_or_default()
}

/// Parses a TTL value: plain seconds or a Go-style duration.
///
/// Parse failures, negative values and values above `i32::MAX` seconds give
/// an unconfigured TTL.
#[must_use]
pub fn parse_ttl(value: &str) -> Ttl {
    let value = value.trim();
    let seconds = match value.parse::<i64>() {
        Ok(seconds) => seconds,
        Err(_) => match parse_go_duration(value) {
            Ok(seconds) => seconds,
            Err(e) => {
                debug!(value = %value, error = %e, "Ignoring unparseable TTL");
                return Ttl::UNCONFIGURED;
            }
        },
    };

    if !(0..=MAX_TTL_SECONDS).contains(&seconds) {
        debug!(value = %value, "Ignoring out-of-range TTL");
        return Ttl::UNCONFIGURED;
    }

    u32::try_from(seconds).map_or(Ttl::UNCONFIGURED, Ttl::seconds)
}

/// TTL from the `ttl` annotation.
#[must_use]
pub fn ttl(annotations: &BTreeMap<String, String>) -> Ttl {
    annotations
        .get(TTL_ANNOTATION)
        .map_or(Ttl::UNCONFIGURED, |value| parse_ttl(value))
}

/// Access scope from the `access` annotation; unknown values are ignored.
#[must_use]
pub fn access(annotations: &BTreeMap<String, String>) -> Option<Access> {
    annotations.get(ACCESS_ANNOTATION).and_then(|value| {
        value
            .trim()
            .parse()
            .map_err(|e: String| debug!(error = %e, "Ignoring access annotation"))
            .ok()
    })
}

/// Endpoints type from the `endpoints-type` annotation; unknown values are ignored.
#[must_use]
pub fn endpoints_type(annotations: &BTreeMap<String, String>) -> Option<EndpointsType> {
    annotations.get(ENDPOINTS_TYPE_ANNOTATION).and_then(|value| {
        value
            .trim()
            .parse()
            .map_err(|e: String| debug!(error = %e, "Ignoring endpoints-type annotation"))
            .ok()
    })
}

#[must_use]
pub fn set_identifier(annotations: &BTreeMap<String, String>) -> Option<String> {
    annotations
        .get(SET_IDENTIFIER_ANNOTATION)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Returns `true` when the controller annotation names another controller.
#[must_use]
pub fn is_foreign_controller(annotations: &BTreeMap<String, String>) -> bool {
    annotations
        .get(CONTROLLER_ANNOTATION)
        .is_some_and(|value| value != CONTROLLER_ANNOTATION_VALUE)
}

// ============================================================================
// Hostname Resolution
// ============================================================================

/// Where a group of hostnames came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostnameOrigin {
    Legacy(CompatibilityMode),
    Annotation,
    Template,
}

/// Hostnames produced by one source.
///
/// `external` names publish the Service's regular targets. `internal` names
/// publish cluster IPs (or, for the `kops-dns-controller` mode, the mode's
/// internal address set).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostnameGroup {
    pub origin: HostnameOrigin,
    pub external: Vec<String>,
    pub internal: Vec<String>,
}

impl HostnameGroup {
    fn is_empty(&self) -> bool {
        self.external.is_empty() && self.internal.is_empty()
    }
}

struct HostnameRule {
    applies: fn(&AnnotationPolicy) -> bool,
    resolve: fn(&AnnotationPolicy, &Service) -> Result<Option<HostnameGroup>, SourceError>,
    /// Evaluated after a higher rule already won, when combining is enabled
    combines: bool,
}

/// Hostname sources, highest precedence first.
const HOSTNAME_RULES: [HostnameRule; 3] = [
    HostnameRule {
        applies: |policy| policy.compatibility.is_some(),
        resolve: AnnotationPolicy::legacy_hostnames,
        combines: false,
    },
    HostnameRule {
        applies: |policy| !policy.ignore_hostname_annotation,
        resolve: AnnotationPolicy::annotation_hostnames,
        combines: false,
    },
    HostnameRule {
        applies: |policy| policy.template.is_some(),
        resolve: AnnotationPolicy::template_hostnames,
        combines: true,
    },
];

/// Hostname policy derived from the source configuration.
#[derive(Debug)]
pub struct AnnotationPolicy {
    compatibility: Option<CompatibilityMode>,
    ignore_hostname_annotation: bool,
    combine_fqdn_and_annotation: bool,
    template: Option<FqdnTemplate>,
}

impl AnnotationPolicy {
    #[must_use]
    pub fn new(
        compatibility: Option<CompatibilityMode>,
        ignore_hostname_annotation: bool,
        combine_fqdn_and_annotation: bool,
        template: Option<FqdnTemplate>,
    ) -> Self {
        Self {
            compatibility,
            ignore_hostname_annotation,
            combine_fqdn_and_annotation,
            template,
        }
    }

    #[must_use]
    pub fn compatibility(&self) -> Option<CompatibilityMode> {
        self.compatibility
    }

    /// Resolves the hostname groups for `service` in precedence order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::TemplateRender`] when the template is consulted
    /// and fails to render.
    pub fn hostnames(&self, service: &Service) -> Result<Vec<HostnameGroup>, SourceError> {
        let mut groups: Vec<HostnameGroup> = Vec::new();

        for rule in &HOSTNAME_RULES {
            if !(rule.applies)(self) {
                continue;
            }
            if !groups.is_empty() && !(rule.combines && self.combine_fqdn_and_annotation) {
                continue;
            }
            if let Some(group) = (rule.resolve)(self, service)? {
                if !group.is_empty() {
                    groups.push(group);
                }
            }
        }

        Ok(groups)
    }

    fn legacy_hostnames(&self, service: &Service) -> Result<Option<HostnameGroup>, SourceError> {
        let Some(mode) = self.compatibility else {
            return Ok(None);
        };
        let annotations = service.annotations();
        let from = |key: &str| annotations.get(key).map(|v| split_hostnames(v)).unwrap_or_default();

        let (external, internal) = match mode {
            CompatibilityMode::Mate => (from(MATE_DNSNAME_ANNOTATION), Vec::new()),
            CompatibilityMode::Molecule => {
                let gated = service
                    .labels()
                    .get(MOLECULE_LABEL_KEY)
                    .is_some_and(|v| v == MOLECULE_LABEL_VALUE);
                if !gated {
                    return Ok(None);
                }
                (from(MOLECULE_DOMAIN_NAME_ANNOTATION), Vec::new())
            }
            CompatibilityMode::KopsDnsController => {
                (from(KOPS_EXTERNAL_ANNOTATION), from(KOPS_INTERNAL_ANNOTATION))
            }
        };

        Ok(Some(HostnameGroup {
            origin: HostnameOrigin::Legacy(mode),
            external,
            internal,
        }))
    }

    fn annotation_hostnames(&self, service: &Service) -> Result<Option<HostnameGroup>, SourceError> {
        let annotations = service.annotations();
        let from = |key: &str| annotations.get(key).map(|v| split_hostnames(v)).unwrap_or_default();

        Ok(Some(HostnameGroup {
            origin: HostnameOrigin::Annotation,
            external: from(HOSTNAME_ANNOTATION),
            internal: from(INTERNAL_HOSTNAME_ANNOTATION),
        }))
    }

    fn template_hostnames(&self, service: &Service) -> Result<Option<HostnameGroup>, SourceError> {
        let Some(template) = &self.template else {
            return Ok(None);
        };
        Ok(Some(HostnameGroup {
            origin: HostnameOrigin::Template,
            external: template.render(service)?,
            internal: Vec::new(),
        }))
    }
}

impl fmt::Display for HostnameOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostnameOrigin::Legacy(mode) => write!(f, "legacy:{mode}"),
            HostnameOrigin::Annotation => f.write_str("annotation"),
            HostnameOrigin::Template => f.write_str("template"),
        }
    }
}

#[cfg(test)]
#[path = "annotations_tests.rs"]
mod annotations_tests;
