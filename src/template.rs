// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! FQDN template evaluated against Services.
//!
//! Templates use minijinja syntax with strict undefined handling, so a
//! reference to a field the Service context does not have fails the render.
//! Go-style field references (`{{.Name}}`, `{{ .Spec.Type }}`) are accepted
//! and normalized to `{{ Name }}` / `{{ Spec.Type }}`.
//!
//! The context exposes:
//!
//! | Field | Source |
//! |-------|--------|
//! | `Name`, `Namespace` | Service metadata |
//! | `Labels`, `Annotations` | Service metadata maps |
//! | `Spec.Type`, `Spec.ClusterIP`, `Spec.ClusterIPs` | Service spec |
//! | `Spec.ExternalName`, `Spec.ExternalIPs` | Service spec |
//!
//! The rendered text is a comma-separated hostname list.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

use crate::annotations::split_hostnames;
use crate::constants::SERVICE_TYPE_CLUSTER_IP;
use crate::errors::SourceError;

/// Name the compiled template is registered under in its environment.
const FQDN_TEMPLATE_NAME: &str = "fqdn";

#[derive(Serialize)]
struct ServiceContext<'a> {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Namespace")]
    namespace: String,
    #[serde(rename = "Labels")]
    labels: &'a BTreeMap<String, String>,
    #[serde(rename = "Annotations")]
    annotations: &'a BTreeMap<String, String>,
    #[serde(rename = "Spec")]
    spec: SpecContext,
}

#[derive(Serialize)]
struct SpecContext {
    #[serde(rename = "Type")]
    type_: String,
    #[serde(rename = "ClusterIP")]
    cluster_ip: String,
    #[serde(rename = "ClusterIPs")]
    cluster_ips: Vec<String>,
    #[serde(rename = "ExternalName")]
    external_name: String,
    #[serde(rename = "ExternalIPs")]
    external_ips: Vec<String>,
}

/// A compiled FQDN template.
pub struct FqdnTemplate {
    env: Environment<'static>,
    source: String,
}

impl std::fmt::Debug for FqdnTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FqdnTemplate")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl FqdnTemplate {
    /// Parses `template`, returning `None` for an empty template.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidFqdnTemplate`] when the template does not
    /// compile.
    pub fn parse(template: &str) -> Result<Option<Self>, SourceError> {
        if template.trim().is_empty() {
            return Ok(None);
        }

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        let source = normalize_go_field_references(template);
        env.add_template_owned(FQDN_TEMPLATE_NAME, source.clone())
            .map_err(|e| SourceError::InvalidFqdnTemplate {
                template: template.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Some(Self { env, source }))
    }

    /// Renders the template for `service` and splits the result into hostnames.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::TemplateRender`] when the template references a
    /// field the Service context does not define.
    pub fn render(&self, service: &Service) -> Result<Vec<String>, SourceError> {
        let spec = service.spec.as_ref();
        let context = ServiceContext {
            name: service.name_any(),
            namespace: service.namespace().unwrap_or_default(),
            labels: service.labels(),
            annotations: service.annotations(),
            spec: SpecContext {
                type_: spec
                    .and_then(|s| s.type_.clone())
                    .unwrap_or_else(|| SERVICE_TYPE_CLUSTER_IP.to_string()),
                cluster_ip: spec.and_then(|s| s.cluster_ip.clone()).unwrap_or_default(),
                cluster_ips: spec.and_then(|s| s.cluster_ips.clone()).unwrap_or_default(),
                external_name: spec
                    .and_then(|s| s.external_name.clone())
                    .unwrap_or_default(),
                external_ips: spec.and_then(|s| s.external_ips.clone()).unwrap_or_default(),
            },
        };

        let rendered = self
            .env
            .get_template(FQDN_TEMPLATE_NAME)
            .and_then(|template| template.render(context))
            .map_err(|e| SourceError::TemplateRender {
                namespace: service.namespace().unwrap_or_default(),
                name: service.name_any(),
                reason: e.to_string(),
            })?;

        Ok(split_hostnames(&rendered))
    }
}

/// Drops the leading dot of Go-style field references inside `{{ ... }}`.
///
/// A dot is removed when it starts a reference: it follows the opening
/// delimiter, whitespace, `(`, `,` or `|`, and precedes a letter. Quoted
/// strings are left untouched.
fn normalize_go_field_references(template: &str) -> String {
    let mut result = String::with_capacity(template.len());
    let mut remaining = template;

    while let Some(start) = remaining.find("{{") {
        result.push_str(&remaining[..start + 2]);
        remaining = &remaining[start + 2..];

        let Some(end) = remaining.find("}}") else {
            result.push_str(remaining);
            return result;
        };

        result.push_str(&normalize_expression(&remaining[..end]));
        result.push_str("}}");
        remaining = &remaining[end + 2..];
    }

    result.push_str(remaining);
    result
}

fn normalize_expression(expr: &str) -> String {
    let mut result = String::with_capacity(expr.len() + 1);
    let mut chars = expr.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        match (ch, quote) {
            ('"' | '\'', None) => {
                quote = Some(ch);
                result.push(ch);
            }
            (c, Some(q)) if c == q => {
                quote = None;
                result.push(ch);
            }
            ('.', None) => {
                let starts_reference = result
                    .chars()
                    .last()
                    .is_none_or(|c| c.is_whitespace() || matches!(c, '(' | ',' | '|' | '-'));
                let precedes_name = chars.peek().is_some_and(|c| c.is_alphabetic());
                if starts_reference && precedes_name {
                    // Keep `{{-` trim markers separated from the name.
                    if result.ends_with('-') {
                        result.push(' ');
                    }
                } else {
                    result.push('.');
                }
            }
            _ => result.push(ch),
        }
    }

    result
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod template_tests;
