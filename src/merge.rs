// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Merging of endpoints that share a record identity.
//!
//! Several Services may publish the same name. Endpoints with equal
//! `(dns_name, record_type, set_identifier)` collapse into one whose targets
//! are the union of theirs. CNAME endpoints never merge, since a CNAME
//! holds a single target; each keeps its own targets and `resource` label.
//!
//! Inputs are first ordered by their `resource` label, so the result does not
//! depend on cache iteration order: targets, labels and TTL come from the
//! lowest resource first.

use std::collections::HashMap;

use crate::endpoint::{Endpoint, RecordType};

type RecordKey = (String, RecordType, Option<String>);

/// Merges endpoints sharing `(dns_name, record_type, set_identifier)`,
/// except CNAMEs, which pass through unmerged.
///
/// The output is sorted by DNS name; entries with the same name keep the
/// order of their first occurrence.
#[must_use]
pub fn merge_endpoints(mut endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
    endpoints.sort_by(|a, b| a.resource().cmp(b.resource()));

    let mut merged: Vec<Endpoint> = Vec::with_capacity(endpoints.len());
    let mut positions: HashMap<RecordKey, usize> = HashMap::new();

    for endpoint in endpoints {
        if endpoint.record_type == RecordType::CNAME {
            merged.push(endpoint);
            continue;
        }

        let key = (
            endpoint.dns_name.clone(),
            endpoint.record_type,
            endpoint.set_identifier.clone(),
        );
        match positions.get(&key) {
            Some(&index) => {
                let existing = &mut merged[index];
                for target in endpoint.targets {
                    if !existing.targets.contains(&target) {
                        existing.targets.push(target);
                    }
                }
            }
            None => {
                positions.insert(key, merged.len());
                merged.push(endpoint);
            }
        }
    }

    merged.sort_by(|a, b| a.dns_name.cmp(&b.dns_name));
    merged
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod merge_tests;
