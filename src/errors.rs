// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the Service DNS source.
//!
//! Errors fall into two groups:
//! - **Construction errors** are returned while building a source from its
//!   configuration. No source is created when one occurs.
//! - **Per-call errors** abort a single `endpoints()` call. The caller decides
//!   whether and when to retry.
//!
//! Soft skips (invalid hostnames, filtered Services, non-ready pods) are not
//! errors and never appear here.

use thiserror::Error;

/// Errors returned by the Service DNS source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The FQDN template failed to parse.
    #[error("Invalid FQDN template '{template}': {reason}")]
    InvalidFqdnTemplate {
        /// The template text as configured
        template: String,
        /// Parser error message
        reason: String,
    },

    /// The annotation filter is not a valid selector expression.
    #[error("Invalid annotation filter '{expression}': {reason}")]
    InvalidAnnotationFilter {
        /// The expression as configured
        expression: String,
        /// Parser error message
        reason: String,
    },

    /// The label selector is not a valid selector expression.
    #[error("Invalid label selector '{expression}': {reason}")]
    InvalidLabelSelector {
        /// The expression as configured
        expression: String,
        /// Parser error message
        reason: String,
    },

    /// The service type filter names a type this source does not know.
    #[error("Unsupported service type '{value}' in service type filter, supported types are: {supported}")]
    UnsupportedServiceType {
        /// The offending filter entry
        value: String,
        /// Comma-separated list of supported types
        supported: String,
    },

    /// The FQDN template failed to render for a specific Service.
    #[error("Failed to render FQDN template for service {namespace}/{name}: {reason}")]
    TemplateRender {
        /// Namespace of the Service being rendered
        namespace: String,
        /// Name of the Service being rendered
        name: String,
        /// Renderer error message
        reason: String,
    },

    /// A hostname could not be resolved to IP addresses.
    #[error("Failed to resolve hostname '{hostname}': {reason}")]
    HostnameLookup {
        /// The hostname that was looked up
        hostname: String,
        /// Resolver error message
        reason: String,
    },
}

impl SourceError {
    /// Returns `true` for errors that can only occur while building a source.
    #[must_use]
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFqdnTemplate { .. }
                | Self::InvalidAnnotationFilter { .. }
                | Self::InvalidLabelSelector { .. }
                | Self::UnsupportedServiceType { .. }
        )
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
