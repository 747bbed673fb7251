// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `template.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use k8s_openapi::api::core::v1::ServiceSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn service() -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some("foo".to_string()),
                namespace: Some("testing".to_string()),
                labels: Some(BTreeMap::from([("team".to_string(), "edge".to_string())])),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some("LoadBalancer".to_string()),
                cluster_ip: Some("10.0.0.1".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_template_is_none() {
        assert!(FqdnTemplate::parse("").unwrap().is_none());
        assert!(FqdnTemplate::parse("   ").unwrap().is_none());
    }

    #[test]
    fn test_template_compiled_once_at_parse() {
        let template = FqdnTemplate::parse("{{.Name}}.example.org").unwrap().unwrap();
        let compiled = template.env.get_template(FQDN_TEMPLATE_NAME).unwrap();
        assert_eq!(compiled.source(), "{{Name}}.example.org");

        let mut other = service();
        other.metadata.name = Some("bar".to_string());
        assert_eq!(template.render(&service()).unwrap(), vec!["foo.example.org".to_string()]);
        assert_eq!(template.render(&other).unwrap(), vec!["bar.example.org".to_string()]);
    }

    #[test]
    fn test_go_style_references() {
        let template = FqdnTemplate::parse("{{.Name}}.{{ .Namespace }}.example.org")
            .unwrap()
            .unwrap();
        assert_eq!(
            template.render(&service()).unwrap(),
            vec!["foo.testing.example.org".to_string()]
        );
    }

    #[test]
    fn test_nested_fields() {
        let template = FqdnTemplate::parse("{{ .Labels.team }}-{{.Spec.Type | lower}}.example.org")
            .unwrap()
            .unwrap();
        assert_eq!(
            template.render(&service()).unwrap(),
            vec!["edge-loadbalancer.example.org".to_string()]
        );
    }

    #[test]
    fn test_native_syntax_and_multiple_hostnames() {
        let template = FqdnTemplate::parse("{{ Name }}.fqdn.org,{{ Name }}.fqdn.com.")
            .unwrap()
            .unwrap();
        assert_eq!(
            template.render(&service()).unwrap(),
            vec!["foo.fqdn.org".to_string(), "foo.fqdn.com".to_string()]
        );
    }

    #[test]
    fn test_invalid_syntax_fails_at_parse() {
        let err = FqdnTemplate::parse("{{.Name").unwrap_err();
        assert!(matches!(err, SourceError::InvalidFqdnTemplate { .. }), "unexpected: {err}");
    }

    #[test]
    fn test_unknown_field_fails_at_render() {
        let template = FqdnTemplate::parse("{{.Calibre}}.bar.example.com")
            .unwrap()
            .unwrap();
        let err = template.render(&service()).unwrap_err();
        match err {
            SourceError::TemplateRender { namespace, name, .. } => {
                assert_eq!(namespace, "testing");
                assert_eq!(name, "foo");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_normalize_leaves_literals_alone() {
        assert_eq!(
            normalize_go_field_references("{{ \".x\" }}.a.b"),
            "{{ \".x\" }}.a.b"
        );
        assert_eq!(normalize_go_field_references("{{.Name}}"), "{{Name}}");
        assert_eq!(
            normalize_go_field_references("{{ .Labels.team }}"),
            "{{ Labels.team }}"
        );
        assert_eq!(normalize_go_field_references("no-template"), "no-template");
    }
}
