// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resolver.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[tokio::test]
    async fn test_static_resolver_hit() {
        let resolver = StaticResolver::new().with_entry(
            "lb.example.com",
            vec![
                IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ],
        );
        let ips = resolver.lookup("lb.example.com").await.unwrap();
        assert_eq!(ips.len(), 2);
    }

    #[tokio::test]
    async fn test_static_resolver_miss() {
        let err = StaticResolver::new().lookup("missing.example.com").await.unwrap_err();
        assert_eq!(
            err,
            SourceError::HostnameLookup {
                hostname: "missing.example.com".to_string(),
                reason: "no such host".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_system_resolver_literal_ip() {
        let ips = SystemResolver.lookup("127.0.0.1").await.unwrap();
        assert_eq!(ips, vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]);
    }
}
