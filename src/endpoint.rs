// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Canonical DNS endpoint produced by the Service source.
//!
//! An [`Endpoint`] is one DNS name, one record type and its targets, plus an
//! optional TTL and set identifier. Every endpoint carries a `resource` label
//! naming the object it was generated from.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{MAX_DNS_LABEL_LENGTH, MAX_DNS_NAME_LENGTH};
use crate::labels::RESOURCE_LABEL;

/// DNS record types emitted by the source.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RecordType {
    A,
    AAAA,
    CNAME,
    SRV,
    TXT,
    NS,
    MX,
}

impl RecordType {
    /// Returns the record type as its DNS mnemonic.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
            RecordType::CNAME => "CNAME",
            RecordType::SRV => "SRV",
            RecordType::TXT => "TXT",
            RecordType::NS => "NS",
            RecordType::MX => "MX",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record TTL.
///
/// `None` means the TTL was not configured and the provider default applies.
/// `Some(0)` is an explicitly configured zero TTL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Ttl(Option<u32>);

impl Ttl {
    /// An unconfigured TTL.
    pub const UNCONFIGURED: Ttl = Ttl(None);

    /// A TTL explicitly configured to `seconds`.
    #[must_use]
    pub fn seconds(seconds: u32) -> Self {
        Ttl(Some(seconds))
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }

    /// Configured value, or `0` when unconfigured.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0.unwrap_or(0)
    }
}

/// A DNS record to be published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Absolute DNS name without the trailing dot
    pub dns_name: String,
    pub record_type: RecordType,
    /// Targets; their meaning depends on `record_type`
    pub targets: Vec<String>,
    #[serde(rename = "recordTTL")]
    pub record_ttl: Ttl,
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_identifier: Option<String>,
}

impl Endpoint {
    /// Creates an endpoint, normalising the DNS name and stripping one
    /// trailing dot from each target.
    ///
    /// Returns `None` when the name is not a valid DNS name; callers treat
    /// that as a soft skip.
    #[must_use]
    pub fn new(dns_name: &str, record_type: RecordType, targets: Vec<String>, ttl: Ttl) -> Option<Self> {
        let dns_name = normalize_dns_name(dns_name);
        if !is_valid_dns_name(&dns_name) {
            return None;
        }
        let targets = targets
            .into_iter()
            .map(|target| match target.strip_suffix('.') {
                Some(stripped) => stripped.to_string(),
                None => target,
            })
            .collect();
        Some(Self {
            dns_name,
            record_type,
            targets,
            record_ttl: ttl,
            labels: BTreeMap::new(),
            set_identifier: None,
        })
    }

    /// Sets the provenance label.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.labels.insert(RESOURCE_LABEL.to_string(), resource.into());
        self
    }

    #[must_use]
    pub fn with_set_identifier(mut self, set_identifier: Option<String>) -> Self {
        self.set_identifier = set_identifier;
        self
    }

    /// Value of the provenance label, or `""` when absent.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.labels.get(RESOURCE_LABEL).map_or("", String::as_str)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} IN {} {} {:?}",
            self.dns_name,
            self.record_ttl.value(),
            self.record_type,
            self.set_identifier.as_deref().unwrap_or(""),
            self.targets
        )
    }
}

/// Trims whitespace and strips one trailing dot.
#[must_use]
pub fn normalize_dns_name(name: &str) -> String {
    let trimmed = name.trim();
    trimmed.strip_suffix('.').unwrap_or(trimmed).to_string()
}

/// Checks that `name` is a syntactically valid DNS name.
///
/// Labels are 1-63 characters of ASCII alphanumerics, `-` and `_`, and do not
/// start or end with `-`. The leftmost label may be the wildcard `*`. The
/// full name is at most 253 characters.
#[must_use]
pub fn is_valid_dns_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_DNS_NAME_LENGTH {
        return false;
    }

    name.split('.').enumerate().all(|(index, label)| {
        if index == 0 && label == "*" {
            return true;
        }
        !label.is_empty()
            && label.len() <= MAX_DNS_LABEL_LENGTH
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod endpoint_tests;
