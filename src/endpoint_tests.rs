// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `endpoint.rs`

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_record_type_display() {
        assert_eq!(RecordType::A.to_string(), "A");
        assert_eq!(RecordType::AAAA.to_string(), "AAAA");
        assert_eq!(RecordType::CNAME.to_string(), "CNAME");
        assert_eq!(RecordType::SRV.to_string(), "SRV");
    }

    #[test]
    fn test_ttl_configured_vs_unconfigured() {
        assert!(!Ttl::UNCONFIGURED.is_configured());
        assert_eq!(Ttl::UNCONFIGURED.value(), 0);
        assert_eq!(Ttl::default(), Ttl::UNCONFIGURED);

        let zero = Ttl::seconds(0);
        assert!(zero.is_configured(), "explicit zero must stay configured");
        assert_eq!(zero.value(), 0);
        assert_ne!(zero, Ttl::UNCONFIGURED);

        assert_eq!(Ttl::seconds(60).value(), 60);
    }

    #[test]
    fn test_new_strips_trailing_dot() {
        let ep = Endpoint::new(
            "foo.example.org.",
            RecordType::A,
            vec!["1.2.3.4".to_string()],
            Ttl::UNCONFIGURED,
        )
        .expect("valid name");
        assert_eq!(ep.dns_name, "foo.example.org");
        assert!(ep.labels.is_empty());
        assert_eq!(ep.set_identifier, None);
    }

    #[test]
    fn test_new_rejects_invalid_names() {
        let long_label = "a".repeat(64);
        for name in [
            "",
            ".",
            "foo..example.org",
            "-foo.example.org",
            "foo-.example.org",
            "foo bar.example.org",
            long_label.as_str(),
        ] {
            assert!(
                Endpoint::new(name, RecordType::A, vec![], Ttl::UNCONFIGURED).is_none(),
                "'{name}' should be rejected"
            );
        }
    }

    #[test]
    fn test_dns_name_validation_accepts_srv_and_wildcards() {
        assert!(is_valid_dns_name("_foo._tcp.foo.example.org"));
        assert!(is_valid_dns_name("*.example.org"));
        assert!(!is_valid_dns_name("foo.*.example.org"));
        assert!(is_valid_dns_name(&"a".repeat(63)));
    }

    #[test]
    fn test_dns_name_total_length_limit() {
        let label = "a".repeat(63);
        let name = format!("{label}.{label}.{label}.{label}");
        assert_eq!(name.len(), 255);
        assert!(!is_valid_dns_name(&name));
    }

    #[test]
    fn test_resource_label_and_set_identifier() {
        let ep = Endpoint::new("foo.example.org", RecordType::A, vec![], Ttl::UNCONFIGURED)
            .unwrap()
            .with_resource("service/testing/foo")
            .with_set_identifier(Some("a".to_string()));
        assert_eq!(ep.resource(), "service/testing/foo");
        assert_eq!(ep.labels.get("resource").map(String::as_str), Some("service/testing/foo"));
        assert_eq!(ep.set_identifier.as_deref(), Some("a"));
    }

    #[test]
    fn test_endpoint_serializes_camel_case() {
        let ep = Endpoint::new(
            "foo.example.org",
            RecordType::AAAA,
            vec!["2001:db8::1".to_string()],
            Ttl::seconds(10),
        )
        .unwrap();
        let json = serde_json::to_value(&ep).unwrap();
        assert_eq!(json["dnsName"], "foo.example.org");
        assert_eq!(json["recordType"], "AAAA");
        assert_eq!(json["recordTTL"], 10);
        assert!(json.get("setIdentifier").is_none());
    }
}
