// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests for the Service endpoint source
//!
//! These tests drive the public API against in-memory watch caches: objects
//! are fed through the cache writers the way the watchers would feed them,
//! and the computed endpoints are checked end to end.
//!
//! Run with: cargo test --test source_integration

use k8s_openapi::api::core::v1::Service;
use kube::runtime::watcher;
use serde_json::json;
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use svcdns::config::ServiceSourceConfig;
use svcdns::endpoint::{Endpoint, RecordType, Ttl};
use svcdns::errors::SourceError;
use svcdns::resolver::StaticResolver;
use svcdns::source::{ServiceSource, Source};
use svcdns::watch::{WatchCapabilities, WatchCaches, WatchedKind};

// ============================================================================
// Helper Functions
// ============================================================================

fn service(value: serde_json::Value) -> Service {
    serde_json::from_value(value).expect("valid Service fixture")
}

fn config_from_yaml(yaml: &str) -> ServiceSourceConfig {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(yaml.as_bytes()).expect("write config");
    ServiceSourceConfig::load_from_file(file.path()).expect("load config")
}

fn summary(endpoints: &[Endpoint]) -> Vec<(&str, RecordType, Vec<&str>)> {
    endpoints
        .iter()
        .map(|e| {
            (
                e.dns_name.as_str(),
                e.record_type,
                e.targets.iter().map(String::as_str).collect(),
            )
        })
        .collect()
}

fn shop_services() -> Vec<Service> {
    vec![
        service(json!({
            "metadata": {
                "name": "web",
                "namespace": "shop",
                "annotations": {
                    "external-dns.alpha.kubernetes.io/hostname": "www.example.org.",
                    "external-dns.alpha.kubernetes.io/ttl": "300"
                }
            },
            "spec": { "type": "LoadBalancer", "clusterIP": "10.96.0.10" },
            "status": { "loadBalancer": { "ingress": [
                { "ip": "1.2.3.4" },
                { "hostname": "lb.cloud.example.com" }
            ] } }
        })),
        service(json!({
            "metadata": { "name": "docs", "namespace": "shop" },
            "spec": { "type": "ExternalName", "externalName": "docs.hosting.example.net" }
        })),
        service(json!({
            "metadata": {
                "name": "db",
                "namespace": "shop",
                "annotations": {
                    "external-dns.alpha.kubernetes.io/hostname": "db.example.org",
                    "external-dns.alpha.kubernetes.io/internal-hostname": "db.internal.example.org"
                }
            },
            "spec": { "type": "ClusterIP", "clusterIP": "10.96.0.30" }
        })),
        service(json!({
            "metadata": { "name": "cache", "namespace": "shop" },
            "spec": { "type": "ClusterIP", "clusterIP": "10.96.0.20" }
        })),
        service(json!({
            "metadata": {
                "name": "legacy",
                "namespace": "shop",
                "annotations": {
                    "external-dns.alpha.kubernetes.io/controller": "someone-else"
                }
            },
            "spec": { "type": "LoadBalancer" },
            "status": { "loadBalancer": { "ingress": [{ "ip": "5.6.7.8" }] } }
        })),
    ]
}

fn source_with(config: &ServiceSourceConfig, services: Vec<Service>) -> ServiceSource {
    let (caches, mut writers) = WatchCaches::new(WatchCapabilities::all());
    for svc in services {
        writers.services.apply(&watcher::Event::Apply(svc));
    }
    let resolver = StaticResolver::new().with_entry(
        "lb.cloud.example.com",
        vec![IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9))],
    );
    ServiceSource::with_caches(config, caches, Arc::new(resolver)).expect("valid configuration")
}

// ============================================================================
// Translation
// ============================================================================

#[tokio::test]
async fn test_mixed_cluster_from_yaml_config() {
    let config = config_from_yaml(
        r#"
fqdnTemplate: "{{.Name}}.{{.Namespace}}.example.org"
serviceTypeFilter: [LoadBalancer, ExternalName, ClusterIP]
"#,
    );
    let source = source_with(&config, shop_services());

    let endpoints = source.endpoints().await.unwrap();
    assert_eq!(
        summary(&endpoints),
        vec![
            ("db.internal.example.org", RecordType::A, vec!["10.96.0.30"]),
            ("docs.shop.example.org", RecordType::CNAME, vec!["docs.hosting.example.net"]),
            ("www.example.org", RecordType::A, vec!["1.2.3.4"]),
            ("www.example.org", RecordType::CNAME, vec!["lb.cloud.example.com"]),
        ]
    );

    let www = endpoints
        .iter()
        .find(|e| e.dns_name == "www.example.org")
        .unwrap();
    assert_eq!(www.record_ttl, Ttl::seconds(300));
    assert_eq!(www.resource(), "service/shop/web");
}

#[tokio::test]
async fn test_resolved_load_balancer_hostnames_and_internal_publishing() {
    let config = ServiceSourceConfig {
        fqdn_template: "{{.Name}}.{{.Namespace}}.example.org".to_string(),
        resolve_load_balancer_hostname: true,
        publish_internal: true,
        ..Default::default()
    };
    let source = source_with(&config, shop_services());

    assert_eq!(
        summary(&source.endpoints().await.unwrap()),
        vec![
            ("cache.shop.example.org", RecordType::A, vec!["10.96.0.20"]),
            ("db.example.org", RecordType::A, vec!["10.96.0.30"]),
            ("db.internal.example.org", RecordType::A, vec!["10.96.0.30"]),
            ("docs.shop.example.org", RecordType::CNAME, vec!["docs.hosting.example.net"]),
            ("www.example.org", RecordType::A, vec!["1.2.3.4", "9.9.9.9"]),
        ]
    );
}

#[tokio::test]
async fn test_cache_updates_change_endpoints() {
    let config = ServiceSourceConfig::default();
    let (caches, mut writers) = WatchCaches::new(WatchCapabilities::all());
    let source =
        ServiceSource::with_caches(&config, caches, Arc::new(StaticResolver::new())).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let kinds = source.add_event_handler(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    assert!(kinds.contains(&WatchedKind::Service));

    let web = shop_services().remove(0);
    writers.services.apply(&watcher::Event::Apply(web.clone()));
    assert_eq!(source.endpoints().await.unwrap().len(), 2);

    writers.services.apply(&watcher::Event::Delete(web));
    assert!(source.endpoints().await.unwrap().is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let config = config_from_yaml("annotationFilter: \"kubernetes.io/ingress.class in (\"\n");
    let (caches, _writers) = WatchCaches::new(WatchCapabilities::all());

    let result = ServiceSource::with_caches(&config, caches, Arc::new(StaticResolver::new()));
    assert!(matches!(
        result,
        Err(SourceError::InvalidAnnotationFilter { .. })
    ));
}
