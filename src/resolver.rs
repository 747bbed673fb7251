// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hostname-to-IP resolution for load-balancer hostnames.
//!
//! [`SystemResolver`] uses the host's resolver through
//! `tokio::net::lookup_host`. [`StaticResolver`] serves answers from a map and
//! is used where no network lookups are wanted.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::SourceError;

/// Resolves hostnames to IP addresses.
#[async_trait]
pub trait HostnameResolver: Send + Sync {
    /// Looks up `hostname`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::HostnameLookup`] when the lookup fails or
    /// yields no addresses.
    async fn lookup(&self, hostname: &str) -> Result<Vec<IpAddr>, SourceError>;
}

/// Resolver backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostnameResolver for SystemResolver {
    async fn lookup(&self, hostname: &str) -> Result<Vec<IpAddr>, SourceError> {
        // lookup_host needs a port; it is discarded from the answers.
        let addrs = tokio::net::lookup_host((hostname, 0))
            .await
            .map_err(|e| SourceError::HostnameLookup {
                hostname: hostname.to_string(),
                reason: e.to_string(),
            })?;

        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            if !ips.contains(&addr.ip()) {
                ips.push(addr.ip());
            }
        }

        if ips.is_empty() {
            return Err(SourceError::HostnameLookup {
                hostname: hostname.to_string(),
                reason: "no addresses returned".to_string(),
            });
        }

        debug!(hostname = %hostname, count = ips.len(), "Resolved hostname");
        Ok(ips)
    }
}

/// Resolver answering from a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an answer for `hostname`.
    #[must_use]
    pub fn with_entry(mut self, hostname: &str, ips: Vec<IpAddr>) -> Self {
        self.entries.insert(hostname.to_string(), ips);
        self
    }
}

#[async_trait]
impl HostnameResolver for StaticResolver {
    async fn lookup(&self, hostname: &str) -> Result<Vec<IpAddr>, SourceError> {
        match self.entries.get(hostname) {
            Some(ips) if !ips.is_empty() => Ok(ips.clone()),
            _ => Err(SourceError::HostnameLookup {
                hostname: hostname.to_string(),
                reason: "no such host".to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod resolver_tests;
