// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # svcdns - DNS endpoints for Kubernetes Services
//!
//! svcdns computes the DNS records that should exist for the Services in a
//! cluster. It watches Services (and, when needed, the Nodes, Pods and
//! EndpointSlices behind them) and turns them into a merged list of
//! [`Endpoint`](endpoint::Endpoint)s for a downstream DNS reconciler.
//!
//! ## Overview
//!
//! - Hostnames come from annotations, an FQDN template or a legacy
//!   compatibility mode
//! - Targets depend on the Service type: load-balancer ingress, node
//!   addresses, headless pod addresses, cluster IPs or an external name
//! - Targets split into A, AAAA and CNAME records; node ports add SRV records
//! - Records sharing a name, type and set identifier are merged, except CNAMEs
//!
//! ## Modules
//!
//! - [`source`] - The Service endpoint source and the [`Source`](source::Source) trait
//! - [`config`] - Source configuration and validation
//! - [`annotations`] - Annotation directives and hostname precedence
//! - [`watch`] - Watch caches and change notification
//! - [`nodes`] - Node targets for node-exposed Services
//! - [`headless`] - Pod targets for headless Services
//! - [`merge`] - Merging of endpoints across Services
//!
//! ## Example
//!
//! ```rust,no_run
//! use svcdns::config::ServiceSourceConfig;
//! use svcdns::source::{ServiceSource, Source};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = kube::Client::try_default().await?;
//! let config = ServiceSourceConfig {
//!     fqdn_template: "{{.Name}}.{{.Namespace}}.example.org".to_string(),
//!     ..Default::default()
//! };
//!
//! let source = ServiceSource::new(&client, &config)?;
//! for endpoint in source.endpoints().await? {
//!     println!("{endpoint}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod annotations;
pub mod config;
pub mod constants;
pub mod duration;
pub mod endpoint;
pub mod errors;
pub mod headless;
pub mod labels;
pub mod merge;
pub mod metrics;
pub mod nodes;
pub mod resolver;
pub mod selector;
pub mod source;
pub mod target;
pub mod template;
pub mod watch;
