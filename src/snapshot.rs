// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Snapshot access
//!
//! A snapshot is a directory tree captured from a cluster (for example a
//! must-gather), laid out as:
//!
//! ```text
//! <root>/namespaces/<namespace>/<api-group>/<kind-plural>.yaml
//! ```
//!
//! Each file holds one `{apiVersion, items: [...]}` list document. This
//! module resolves namespace scopes against that tree and loads collections.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::kubernetes::ResourceKind;

/// Failure to load a collection file
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The per-kind file is missing (or unreadable) for this namespace
    #[error("No resources found in {namespace} namespace.")]
    NotFound {
        namespace: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a valid list of the expected kind
    #[error("Error when trying to unmarshal file {}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Which namespaces a query covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceScope {
    Single(String),
    All,
}

impl NamespaceScope {
    pub fn is_all(&self) -> bool {
        matches!(self, NamespaceScope::All)
    }
}

impl fmt::Display for NamespaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceScope::Single(ns) => write!(f, "{} namespace", ns),
            NamespaceScope::All => f.write_str("all namespaces"),
        }
    }
}

/// List document stored per (namespace, kind)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ResourceCollection<T> {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<T>,
}

impl<T> Default for ResourceCollection<T> {
    fn default() -> Self {
        Self {
            api_version: String::new(),
            items: Vec::new(),
        }
    }
}

/// `items: null` is an empty list
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A snapshot rooted at a directory
#[derive(Debug, Clone)]
pub struct Snapshot {
    root: PathBuf,
}

impl Snapshot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a kind's collection file in a namespace
    pub fn collection_path<K: ResourceKind>(&self, namespace: &str) -> PathBuf {
        self.root.join(K::collection_file(namespace))
    }

    /// Expand a scope into concrete namespace names
    ///
    /// `All` lists the `namespaces/` directory in whatever order the
    /// filesystem returns; a missing directory yields no namespaces.
    /// `Single` is returned as-is without checking that it exists.
    pub fn namespaces(&self, scope: &NamespaceScope) -> Vec<String> {
        match scope {
            NamespaceScope::Single(ns) => vec![ns.clone()],
            NamespaceScope::All => {
                let dir = self.root.join("namespaces");
                let entries = match std::fs::read_dir(&dir) {
                    Ok(entries) => entries,
                    Err(e) => {
                        debug!(path = %dir.display(), error = %e, "No namespaces directory");
                        return Vec::new();
                    }
                };
                entries
                    .filter_map(|entry| entry.ok())
                    // Follows symlinks, so linked namespace directories are listed too
                    .filter(|entry| entry.path().is_dir())
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect()
            }
        }
    }

    /// Load a kind's collection for one namespace
    pub fn load<K: ResourceKind>(
        &self,
        namespace: &str,
    ) -> Result<ResourceCollection<K::Object>, SnapshotError> {
        let path = self.collection_path::<K>(namespace);
        // Only I/O failures mean "not found"; undecodable bytes are malformed
        let content = std::fs::read(&path).map_err(|source| SnapshotError::NotFound {
            namespace: namespace.to_string(),
            path: path.clone(),
            source,
        })?;

        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(ResourceCollection::default());
        }

        let collection: ResourceCollection<K::Object> = serde_yaml::from_slice(&content)
            .map_err(|source| SnapshotError::Malformed {
                path: path.clone(),
                source,
            })?;

        debug!(
            path = %path.display(),
            items = collection.items.len(),
            "Loaded collection"
        );
        Ok(collection)
    }
}
