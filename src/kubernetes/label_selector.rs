// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Label selector parsing and matching
//!
//! Evaluates equality-based label selectors against the labels of snapshot
//! resources, the same way the API server would for a `-l` query.
//!
//! Supported clauses (comma-separated, all must hold):
//! - `key=value`: label present with exactly this value
//! - `key!=value`: label absent, or present with a different value
//! - `key`: label present with any value
//! - `!key`: label absent
//!
//! A clause that does not parse, or whose key or value is not valid label
//! syntax, never matches. This makes the whole selector match nothing rather
//! than failing the query.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// Label key: optional DNS subdomain prefix, then a name segment
static LABEL_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*/)?[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$",
    )
    .expect("label key pattern is valid")
});

/// Label value: empty, or alphanumeric at both ends
static LABEL_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?)?$")
        .expect("label value pattern is valid")
});

/// A single selector clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Equals { key: String, value: String },
    NotEquals { key: String, value: String },
    Exists(String),
    NotExists(String),
    /// Unparseable clause, kept verbatim for diagnostics
    Malformed(String),
}

impl Requirement {
    fn parse(clause: &str) -> Self {
        let malformed = || Requirement::Malformed(clause.to_string());

        if let Some(key) = clause.strip_prefix('!') {
            let key = key.trim();
            return if valid_key(key) {
                Requirement::NotExists(key.to_string())
            } else {
                malformed()
            };
        }

        if let Some((key, value)) = clause.split_once("!=") {
            let (key, value) = (key.trim(), value.trim());
            return if valid_key(key) && valid_value(value) {
                Requirement::NotEquals {
                    key: key.to_string(),
                    value: value.to_string(),
                }
            } else {
                malformed()
            };
        }

        if let Some((key, value)) = clause.split_once('=') {
            let (key, value) = (key.trim(), value.trim());
            return if valid_key(key) && valid_value(value) {
                Requirement::Equals {
                    key: key.to_string(),
                    value: value.to_string(),
                }
            } else {
                malformed()
            };
        }

        if valid_key(clause) {
            Requirement::Exists(clause.to_string())
        } else {
            malformed()
        }
    }

    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Equals { key, value } => labels.get(key) == Some(value),
            Requirement::NotEquals { key, value } => labels.get(key) != Some(value),
            Requirement::Exists(key) => labels.contains_key(key),
            Requirement::NotExists(key) => !labels.contains_key(key),
            Requirement::Malformed(_) => false,
        }
    }
}

fn valid_key(key: &str) -> bool {
    key.len() <= 317 && LABEL_KEY.is_match(key)
}

fn valid_value(value: &str) -> bool {
    value.len() <= 63 && LABEL_VALUE.is_match(value)
}

/// Parsed label selector, built once per invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Parse a selector expression such as `"app=nginx,tier!=db,!canary"`
    ///
    /// Never fails: malformed clauses are kept and evaluate to false.
    pub fn parse(spec: &str) -> Self {
        let mut requirements = Vec::new();

        for part in spec.split(',') {
            let clause = part.trim();
            if clause.is_empty() {
                continue;
            }

            let requirement = Requirement::parse(clause);
            if let Requirement::Malformed(ref raw) = requirement {
                warn!(clause = %raw, "Malformed label selector clause, nothing will match");
            }
            requirements.push(requirement);
        }

        Self { requirements }
    }

    /// Selector with no clauses (matches everything)
    pub fn everything() -> Self {
        Self::default()
    }

    /// Check whether a label set satisfies every clause
    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        if self.requirements.is_empty() {
            return true;
        }
        let empty = BTreeMap::new();
        let labels = labels.unwrap_or(&empty);
        self.requirements.iter().all(|r| r.matches(labels))
    }
}
