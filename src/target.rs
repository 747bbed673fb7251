// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Target classification.
//!
//! A target string is an IPv4 address, an IPv6 address, or a hostname. The
//! classification decides the record type, and targets of different kinds
//! under one DNS name become parallel endpoints of different types.

use std::net::IpAddr;

use crate::endpoint::{Endpoint, RecordType, Ttl};

/// Kind of a candidate target string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Ipv4,
    Ipv6,
    Hostname,
}

impl TargetKind {
    /// Record type used to publish a target of this kind.
    #[must_use]
    pub fn record_type(self) -> RecordType {
        match self {
            TargetKind::Ipv4 => RecordType::A,
            TargetKind::Ipv6 => RecordType::AAAA,
            TargetKind::Hostname => RecordType::CNAME,
        }
    }
}

/// Classifies `target` with a strict IP parse, falling back to hostname.
#[must_use]
pub fn classify(target: &str) -> TargetKind {
    match target.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => TargetKind::Ipv4,
        Ok(IpAddr::V6(_)) => TargetKind::Ipv6,
        Err(_) => TargetKind::Hostname,
    }
}

/// Splits targets into per-record-type groups.
///
/// Groups come out in A, AAAA, CNAME order. Within a group the input order is
/// kept and duplicates are dropped.
#[must_use]
pub fn group_by_record_type(targets: &[String]) -> Vec<(RecordType, Vec<String>)> {
    let mut a = Vec::new();
    let mut aaaa = Vec::new();
    let mut cname = Vec::new();

    for target in targets {
        let bucket = match classify(target) {
            TargetKind::Ipv4 => &mut a,
            TargetKind::Ipv6 => &mut aaaa,
            TargetKind::Hostname => &mut cname,
        };
        if !bucket.contains(target) {
            bucket.push(target.clone());
        }
    }

    [
        (RecordType::A, a),
        (RecordType::AAAA, aaaa),
        (RecordType::CNAME, cname),
    ]
    .into_iter()
    .filter(|(_, targets)| !targets.is_empty())
    .collect()
}

/// Builds one endpoint per record type for `hostname`.
///
/// Returns an empty list when `hostname` is not a valid DNS name.
#[must_use]
pub fn endpoints_for_hostname(
    hostname: &str,
    targets: &[String],
    ttl: Ttl,
    resource: &str,
    set_identifier: Option<&str>,
) -> Vec<Endpoint> {
    group_by_record_type(targets)
        .into_iter()
        .filter_map(|(record_type, targets)| {
            Endpoint::new(hostname, record_type, targets, ttl).map(|ep| {
                ep.with_resource(resource)
                    .with_set_identifier(set_identifier.map(str::to_string))
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod target_tests;
