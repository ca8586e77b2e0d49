// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource kind descriptors
//!
//! Each supported kind describes where its collection lives in a snapshot,
//! which columns it shows, and how one object maps to a table row. The query
//! engine is generic over [`ResourceKind`]; [`Kind`] maps a user-supplied
//! name or alias to the right descriptor at runtime.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::age::age;

/// Values shared by every row projected from one collection file
#[derive(Debug, Clone, Copy)]
pub struct RowContext {
    /// Reference time for the AGE column
    pub now: DateTime<Utc>,
}

impl RowContext {
    pub fn age(&self, meta: &ObjectMeta) -> String {
        age(meta.creation_timestamp.as_ref(), self.now)
    }
}

/// Descriptor of a resource kind stored in a snapshot
pub trait ResourceKind {
    /// Typed object as found in the collection's `items`
    type Object: k8s_openapi::Resource
        + k8s_openapi::Metadata<Ty = ObjectMeta>
        + DeserializeOwned
        + Serialize
        + Clone;

    /// Lowercase singular name, used for `<kind>/<name>` output
    const SINGULAR: &'static str;
    /// Plural name, also the collection file stem
    const PLURAL: &'static str;
    /// Short names accepted on the command line
    const ALIASES: &'static [&'static str] = &[];
    /// API group directory under the namespace (`core` for the core group)
    const GROUP_DIR: &'static str = "core";
    /// Column headers following NAMESPACE, starting with NAME
    const COLUMNS: &'static [&'static str];
    /// How many of [`Self::COLUMNS`] the default (non-wide) table shows
    const NARROW_COLUMNS: usize;

    /// Cells for every column after NAME, in [`Self::COLUMNS`] order
    fn cells(object: &Self::Object, ctx: &RowContext) -> Vec<String>;

    /// Collection file for a namespace, relative to the snapshot root
    fn collection_file(namespace: &str) -> String {
        format!(
            "namespaces/{}/{}/{}.yaml",
            namespace,
            Self::GROUP_DIR,
            Self::PLURAL
        )
    }
}

/// Join `k=v` pairs, or `<none>` when there are none
pub fn format_pairs(pairs: Option<&BTreeMap<String, String>>) -> String {
    match pairs {
        Some(map) if !map.is_empty() => map
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(","),
        _ => "<none>".to_string(),
    }
}

pub struct Services;

impl ResourceKind for Services {
    type Object = Service;

    const SINGULAR: &'static str = "service";
    const PLURAL: &'static str = "services";
    const ALIASES: &'static [&'static str] = &["svc"];
    const COLUMNS: &'static [&'static str] = &[
        "NAME",
        "TYPE",
        "CLUSTER-IP",
        "EXTERNAL-IP",
        "PORT(S)",
        "AGE",
        "SELECTOR",
    ];
    const NARROW_COLUMNS: usize = 6;

    fn cells(service: &Service, ctx: &RowContext) -> Vec<String> {
        let spec = service.spec.as_ref();
        let service_type = spec
            .and_then(|s| s.type_.clone())
            .unwrap_or_else(|| "ClusterIP".to_string());

        let cluster_ip = spec
            .and_then(|s| s.cluster_ip.as_deref())
            .filter(|ip| !ip.is_empty())
            .unwrap_or("<none>")
            .to_string();

        let external_ip = match service_type.as_str() {
            "ExternalName" => spec
                .and_then(|s| s.external_name.clone())
                .unwrap_or_else(|| "<none>".to_string()),
            "LoadBalancer" => {
                let ingress: Vec<String> = service
                    .status
                    .as_ref()
                    .and_then(|s| s.load_balancer.as_ref())
                    .and_then(|lb| lb.ingress.as_ref())
                    .map(|ingress| {
                        ingress
                            .iter()
                            .filter_map(|i| i.ip.clone().or_else(|| i.hostname.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                if ingress.is_empty() {
                    "<pending>".to_string()
                } else {
                    ingress.join(",")
                }
            }
            _ => "<none>".to_string(),
        };

        let ports = spec
            .and_then(|s| s.ports.as_ref())
            .filter(|p| !p.is_empty())
            .map(|ports| {
                ports
                    .iter()
                    .map(|p| format!("{}/{}", p.port, p.protocol.as_deref().unwrap_or("TCP")))
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_else(|| "<none>".to_string());

        let selector = format_pairs(spec.and_then(|s| s.selector.as_ref()));

        vec![
            service_type,
            cluster_ip,
            external_ip,
            ports,
            ctx.age(&service.metadata),
            selector,
        ]
    }
}

pub struct ConfigMaps;

impl ResourceKind for ConfigMaps {
    type Object = ConfigMap;

    const SINGULAR: &'static str = "configmap";
    const PLURAL: &'static str = "configmaps";
    const ALIASES: &'static [&'static str] = &["cm"];
    const COLUMNS: &'static [&'static str] = &["NAME", "DATA", "AGE"];
    const NARROW_COLUMNS: usize = 3;

    fn cells(cm: &ConfigMap, ctx: &RowContext) -> Vec<String> {
        let data = cm.data.as_ref().map_or(0, |d| d.len())
            + cm.binary_data.as_ref().map_or(0, |d| d.len());
        vec![data.to_string(), ctx.age(&cm.metadata)]
    }
}

pub struct Secrets;

impl ResourceKind for Secrets {
    type Object = Secret;

    const SINGULAR: &'static str = "secret";
    const PLURAL: &'static str = "secrets";
    const COLUMNS: &'static [&'static str] = &["NAME", "TYPE", "DATA", "AGE"];
    const NARROW_COLUMNS: usize = 4;

    fn cells(secret: &Secret, ctx: &RowContext) -> Vec<String> {
        let secret_type = secret
            .type_
            .clone()
            .unwrap_or_else(|| "Opaque".to_string());
        let data = secret.data.as_ref().map_or(0, |d| d.len())
            + secret.string_data.as_ref().map_or(0, |d| d.len());
        vec![secret_type, data.to_string(), ctx.age(&secret.metadata)]
    }
}

pub struct ServiceAccounts;

impl ResourceKind for ServiceAccounts {
    type Object = ServiceAccount;

    const SINGULAR: &'static str = "serviceaccount";
    const PLURAL: &'static str = "serviceaccounts";
    const ALIASES: &'static [&'static str] = &["sa"];
    const COLUMNS: &'static [&'static str] = &["NAME", "SECRETS", "AGE"];
    const NARROW_COLUMNS: usize = 3;

    fn cells(sa: &ServiceAccount, ctx: &RowContext) -> Vec<String> {
        let secrets = sa.secrets.as_ref().map_or(0, |s| s.len());
        vec![secrets.to_string(), ctx.age(&sa.metadata)]
    }
}

/// Runtime handle for a supported resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Service,
    ConfigMap,
    Secret,
    ServiceAccount,
}

impl Kind {
    /// Every supported kind, in `get all` order
    pub const ALL: &'static [Kind] = &[
        Kind::Service,
        Kind::ConfigMap,
        Kind::Secret,
        Kind::ServiceAccount,
    ];

    pub fn singular(self) -> &'static str {
        match self {
            Kind::Service => Services::SINGULAR,
            Kind::ConfigMap => ConfigMaps::SINGULAR,
            Kind::Secret => Secrets::SINGULAR,
            Kind::ServiceAccount => ServiceAccounts::SINGULAR,
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            Kind::Service => Services::PLURAL,
            Kind::ConfigMap => ConfigMaps::PLURAL,
            Kind::Secret => Secrets::PLURAL,
            Kind::ServiceAccount => ServiceAccounts::PLURAL,
        }
    }

    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Kind::Service => Services::ALIASES,
            Kind::ConfigMap => ConfigMaps::ALIASES,
            Kind::Secret => Secrets::ALIASES,
            Kind::ServiceAccount => ServiceAccounts::ALIASES,
        }
    }

    pub fn api_version(self) -> &'static str {
        match self {
            Kind::Service => <Service as k8s_openapi::Resource>::API_VERSION,
            Kind::ConfigMap => <ConfigMap as k8s_openapi::Resource>::API_VERSION,
            Kind::Secret => <Secret as k8s_openapi::Resource>::API_VERSION,
            Kind::ServiceAccount => <ServiceAccount as k8s_openapi::Resource>::API_VERSION,
        }
    }

    pub fn kind_name(self) -> &'static str {
        match self {
            Kind::Service => <Service as k8s_openapi::Resource>::KIND,
            Kind::ConfigMap => <ConfigMap as k8s_openapi::Resource>::KIND,
            Kind::Secret => <Secret as k8s_openapi::Resource>::KIND,
            Kind::ServiceAccount => <ServiceAccount as k8s_openapi::Resource>::KIND,
        }
    }

    /// Look up a kind by singular, plural or short name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Kind> {
        let name = name.to_lowercase();
        Kind::ALL.iter().copied().find(|kind| {
            kind.singular() == name || kind.plural() == name || kind.aliases().contains(&name.as_str())
        })
    }

    /// Resolve a comma-separated kind list; `all` expands to every kind
    pub fn parse_list(spec: &str) -> Result<Vec<Kind>, String> {
        let mut kinds = Vec::new();
        for part in spec.split(',') {
            let name = part.trim();
            if name.is_empty() {
                continue;
            }
            if name.eq_ignore_ascii_case("all") {
                for kind in Kind::ALL {
                    if !kinds.contains(kind) {
                        kinds.push(*kind);
                    }
                }
                continue;
            }
            let kind = Kind::from_name(name)
                .ok_or_else(|| format!("the server doesn't have a resource type \"{}\"", name))?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if kinds.is_empty() {
            return Err("no resource type given".to_string());
        }
        Ok(kinds)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}
