// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Query engine: `get <kind> [name]` against a snapshot
//!
//! For each namespace in scope the kind's collection is loaded, filtered
//! lazily by label selector and name, and every match is handed to the
//! output renderer as it is found.

use std::io::Write;

use anyhow::Result;
use k8s_openapi::Metadata;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::debug;

use crate::kubernetes::{
    ConfigMaps, Kind, LabelSelector, ResourceKind, RowContext, Secrets, ServiceAccounts, Services,
    reference_time,
};
use crate::output::{OutputMode, Renderer};
use crate::snapshot::{NamespaceScope, Snapshot, SnapshotError};

/// Everything a single `get` needs, read once from the command line
#[derive(Debug, Clone)]
pub struct GetOptions<'a> {
    pub scope: &'a NamespaceScope,
    /// Exact resource name; `None` lists everything
    pub name: Option<&'a str>,
    pub selector: &'a LabelSelector,
    pub output: &'a OutputMode,
    pub show_labels: bool,
    /// Part of a multi-kind listing: prefix names, suppress empty notices
    pub aggregate: bool,
}

/// Lazy iterator over the resources of one collection that pass the filters
///
/// Stops after the first name match, so duplicated names in a collection
/// only ever yield the first occurrence.
pub struct Matches<'a, T> {
    items: std::slice::Iter<'a, T>,
    selector: &'a LabelSelector,
    name: Option<&'a str>,
    done: bool,
}

/// Filter a collection by label selector and optional exact name
pub fn filter<'a, T>(
    items: &'a [T],
    selector: &'a LabelSelector,
    name: Option<&'a str>,
) -> Matches<'a, T>
where
    T: Metadata<Ty = ObjectMeta>,
{
    Matches {
        items: items.iter(),
        selector,
        name: name.filter(|n| !n.is_empty()),
        done: false,
    }
}

impl<'a, T> Iterator for Matches<'a, T>
where
    T: Metadata<Ty = ObjectMeta>,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        for item in self.items.by_ref() {
            let meta = item.metadata();
            if !self.selector.matches(meta.labels.as_ref()) {
                continue;
            }
            if let Some(name) = self.name {
                if meta.name.as_deref() != Some(name) {
                    continue;
                }
                self.done = true;
            }
            return Some(item);
        }

        self.done = true;
        None
    }
}

/// Run a query for one resource kind and write the rendered result
///
/// Returns `Ok(true)` when nothing matched. A missing collection file is an
/// error for a single namespace but skipped when querying all namespaces; a
/// malformed file is always an error.
pub fn get<K: ResourceKind>(
    snapshot: &Snapshot,
    options: &GetOptions<'_>,
    out: &mut dyn Write,
) -> Result<bool> {
    let mut renderer = Renderer::<K>::new(options);

    for namespace in snapshot.namespaces(options.scope) {
        let collection = match snapshot.load::<K>(&namespace) {
            Ok(collection) => collection,
            Err(SnapshotError::NotFound { path, .. }) if options.scope.is_all() => {
                debug!(namespace = %namespace, path = %path.display(), "No collection file, skipping");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let ctx = RowContext {
            now: reference_time(&snapshot.collection_path::<K>(&namespace)),
        };

        for object in filter(&collection.items, options.selector, options.name) {
            renderer.accept(object, &ctx, out)?;
        }

        if !options.scope.is_all() {
            break;
        }
    }

    debug!(kind = K::PLURAL, matches = renderer.len(), "Query complete");
    renderer.finish(out)
}

/// Run [`get`] for a kind chosen at runtime
pub fn get_kind(
    kind: Kind,
    snapshot: &Snapshot,
    options: &GetOptions<'_>,
    out: &mut dyn Write,
) -> Result<bool> {
    match kind {
        Kind::Service => get::<Services>(snapshot, options, out),
        Kind::ConfigMap => get::<ConfigMaps>(snapshot, options, out),
        Kind::Secret => get::<Secrets>(snapshot, options, out),
        Kind::ServiceAccount => get::<ServiceAccounts>(snapshot, options, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::testing::*;
    use k8s_openapi::api::core::v1::Service;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn svc(name: &str, labels: &[(&str, &str)]) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("foo".to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect::<BTreeMap<_, _>>(),
                ),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn names<'a>(matches: impl Iterator<Item = &'a Service>) -> Vec<&'a str> {
        matches
            .map(|s| s.metadata.name.as_deref().unwrap())
            .collect()
    }

    /// `foo` has services a (tier=web) and b (tier=db); `bar` has no services file
    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let yaml = list(&[
            service_yaml("a", "foo", &[("tier", "web")]),
            service_yaml("b", "foo", &[("tier", "db")]),
        ]);
        write_collection(dir.path(), "foo", "services.yaml", &yaml);
        std::fs::create_dir_all(dir.path().join("namespaces/bar/core")).unwrap();
        dir
    }

    fn run(
        dir: &TempDir,
        scope: NamespaceScope,
        name: Option<&str>,
        selector: &str,
        output: &str,
    ) -> (Result<bool>, String) {
        let selector = LabelSelector::parse(selector);
        let output: OutputMode = output.parse().unwrap();
        let options = GetOptions {
            scope: &scope,
            name,
            selector: &selector,
            output: &output,
            show_labels: false,
            aggregate: false,
        };
        let mut out = Vec::new();
        let result = get::<Services>(&Snapshot::new(dir.path()), &options, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_filter_by_selector() {
        let items = vec![svc("a", &[("tier", "web")]), svc("b", &[("tier", "db")])];
        let selector = LabelSelector::parse("tier=web");
        assert_eq!(names(filter(&items, &selector, None)), vec!["a"]);
    }

    #[test]
    fn test_filter_by_name() {
        let items = vec![svc("a", &[]), svc("b", &[])];
        let selector = LabelSelector::everything();
        assert_eq!(names(filter(&items, &selector, Some("b"))), vec!["b"]);
        assert!(names(filter(&items, &selector, Some("c"))).is_empty());
        assert_eq!(names(filter(&items, &selector, Some(""))), vec!["a", "b"]);
    }

    #[test]
    fn test_filter_stops_at_first_name_match() {
        let mut first = svc("a", &[("copy", "first")]);
        first.metadata.uid = Some("1".to_string());
        let mut second = svc("a", &[("copy", "second")]);
        second.metadata.uid = Some("2".to_string());
        let items = vec![first, svc("b", &[]), second];

        let selector = LabelSelector::everything();
        let matched: Vec<&Service> = filter(&items, &selector, Some("a")).collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].metadata.uid.as_deref(), Some("1"));
    }

    #[test]
    fn test_filter_selector_applies_before_name() {
        let items = vec![svc("a", &[("tier", "db")]), svc("a", &[("tier", "web")])];
        let selector = LabelSelector::parse("tier=web");
        let matched: Vec<&Service> = filter(&items, &selector, Some("a")).collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(
            matched[0].metadata.labels.as_ref().unwrap()["tier"],
            "web"
        );
    }

    #[test]
    fn test_filter_is_lazy() {
        let items = vec![svc("a", &[]), svc("b", &[])];
        let selector = LabelSelector::everything();
        let mut matches = filter(&items, &selector, None);
        assert_eq!(matches.next().unwrap().metadata.name.as_deref(), Some("a"));
        assert_eq!(matches.next().unwrap().metadata.name.as_deref(), Some("b"));
        assert!(matches.next().is_none());
        assert!(matches.next().is_none());
    }

    #[test]
    fn test_selector_table_single_namespace() {
        let dir = fixture();
        let (result, output) = run(&dir, NamespaceScope::Single("foo".into()), None, "tier=web", "");
        assert!(!result.unwrap());

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0].split_whitespace().collect::<Vec<_>>(),
            ["NAME", "TYPE", "CLUSTER-IP", "EXTERNAL-IP", "PORT(S)", "AGE"]
        );
        let row: Vec<&str> = lines[1].split_whitespace().collect();
        assert_eq!(row.len(), 6);
        assert_eq!(&row[..5], ["a", "ClusterIP", "172.30.0.1", "<none>", "80/TCP"]);
    }

    #[test]
    fn test_all_namespaces_skips_missing_file() {
        let dir = fixture();
        let (result, output) = run(&dir, NamespaceScope::All, None, "", "");
        assert!(!result.unwrap());

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAMESPACE"));
        assert!(lines[1].starts_with("foo"));
        assert!(lines[2].starts_with("foo"));
        assert!(!output.contains("bar"));
    }

    #[test]
    fn test_single_namespace_missing_file_is_fatal() {
        let dir = fixture();
        let (result, output) = run(&dir, NamespaceScope::Single("bar".into()), None, "", "");
        let err = result.unwrap_err();
        let snapshot_err = err.downcast_ref::<SnapshotError>().unwrap();
        assert!(matches!(snapshot_err, SnapshotError::NotFound { .. }));
        assert_eq!(err.to_string(), "No resources found in bar namespace.");
        assert!(output.is_empty());
    }

    #[test]
    fn test_malformed_file_is_fatal_under_all_namespaces() {
        let dir = fixture();
        write_collection(dir.path(), "bar", "services.yaml", "items: [[[");
        let (result, _) = run(&dir, NamespaceScope::All, None, "", "");
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SnapshotError>(),
            Some(SnapshotError::Malformed { .. })
        ));
    }

    #[test]
    fn test_undecodable_file_is_fatal_in_both_scopes() {
        let dir = fixture();
        std::fs::write(
            dir.path().join("namespaces/bar/core/services.yaml"),
            b"\xff\xfe",
        )
        .unwrap();

        for scope in [NamespaceScope::All, NamespaceScope::Single("bar".into())] {
            let (result, _) = run(&dir, scope, None, "", "");
            let err = result.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<SnapshotError>(),
                Some(SnapshotError::Malformed { .. })
            ));
            assert!(err.to_string().ends_with("namespaces/bar/core/services.yaml"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_namespace_listed_under_all_namespaces() {
        let real = fixture();
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("namespaces")).unwrap();
        std::os::unix::fs::symlink(
            real.path().join("namespaces/foo"),
            dir.path().join("namespaces/foo"),
        )
        .unwrap();

        let (result, all) = run(&dir, NamespaceScope::All, None, "tier=web", "name");
        assert!(!result.unwrap());
        let (result, single) =
            run(&dir, NamespaceScope::Single("foo".into()), None, "tier=web", "name");
        assert!(!result.unwrap());
        assert_eq!(all, "service/a\n");
        assert_eq!(all, single);
    }

    #[test]
    fn test_name_output_printed_once_for_duplicates() {
        let dir = TempDir::new().unwrap();
        let yaml = list(&[
            service_yaml("a", "foo", &[]),
            service_yaml("b", "foo", &[]),
            service_yaml("a", "foo", &[]),
        ]);
        write_collection(dir.path(), "foo", "services.yaml", &yaml);

        let (result, output) = run(&dir, NamespaceScope::Single("foo".into()), Some("a"), "", "name");
        assert!(!result.unwrap());
        assert_eq!(output, "service/a\n");
    }

    #[test]
    fn test_no_match_reports_empty() {
        let dir = fixture();
        let (result, output) =
            run(&dir, NamespaceScope::Single("foo".into()), None, "tier=cache", "");
        assert!(result.unwrap());
        assert_eq!(output, "No resources found in foo namespace.\n");
    }

    #[test]
    fn test_malformed_selector_matches_nothing() {
        let dir = fixture();
        let (result, output) = run(&dir, NamespaceScope::Single("foo".into()), None, "tier==web", "name");
        assert!(result.unwrap());
        assert_eq!(output, "No resources found in foo namespace.\n");
    }

    #[test]
    fn test_yaml_single_resource_by_name() {
        let dir = fixture();
        let (result, output) = run(&dir, NamespaceScope::Single("foo".into()), Some("b"), "", "yaml");
        assert!(!result.unwrap());

        let doc: serde_json::Value = serde_yaml::from_str(&output).unwrap();
        assert_eq!(doc["kind"], "Service");
        assert_eq!(doc["metadata"]["name"], "b");
        assert_eq!(doc["metadata"]["labels"]["tier"], "db");
    }

    #[test]
    fn test_json_list_across_namespaces() {
        let dir = fixture();
        let yaml = list(&[service_yaml("c", "baz", &[])]);
        write_collection(dir.path(), "baz", "services.yaml", &yaml);

        let (result, output) = run(&dir, NamespaceScope::All, None, "", "json");
        assert!(!result.unwrap());

        let doc: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(doc["apiVersion"], "v1");
        let mut names: Vec<&str> = doc["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["metadata"]["name"].as_str().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_jsonpath_by_selector() {
        let dir = fixture();
        let (result, output) = run(
            &dir,
            NamespaceScope::Single("foo".into()),
            None,
            "tier!=web",
            "jsonpath={range .items[*]}{.metadata.name}={.spec.clusterIP}{\"\\n\"}{end}",
        );
        assert!(!result.unwrap());
        assert_eq!(output, "b=172.30.0.1\n");
    }

    #[test]
    fn test_row_count_matches_filtered_items() {
        let dir = fixture();
        for (selector, expected) in [("", 2), ("tier", 2), ("tier=db", 1), ("!tier", 0)] {
            let (result, output) = run(&dir, NamespaceScope::Single("foo".into()), None, selector, "wide");
            if expected == 0 {
                assert!(result.unwrap());
                continue;
            }
            assert!(!result.unwrap());
            let lines: Vec<&str> = output.lines().collect();
            assert_eq!(lines.len(), expected + 1, "selector {:?}", selector);
            assert_eq!(lines[0].split_whitespace().count(), 7);
        }
    }

    #[test]
    fn test_get_kind_dispatch_and_prefix() {
        let dir = fixture();
        write_collection(
            dir.path(),
            "foo",
            "configmaps.yaml",
            "apiVersion: v1\nitems:\n- apiVersion: v1\n  kind: ConfigMap\n  metadata:\n    name: settings\n    namespace: foo\n  data:\n    a: \"1\"\n",
        );

        let scope = NamespaceScope::Single("foo".into());
        let selector = LabelSelector::everything();
        let output = OutputMode::Table;
        let options = GetOptions {
            scope: &scope,
            name: None,
            selector: &selector,
            output: &output,
            show_labels: false,
            aggregate: true,
        };
        let snapshot = Snapshot::new(dir.path());

        let mut out = Vec::new();
        assert!(!get_kind(Kind::ConfigMap, &snapshot, &options, &mut out).unwrap());
        let output = String::from_utf8(out).unwrap();
        let row: Vec<&str> = output.lines().nth(1).unwrap().split_whitespace().collect();
        assert_eq!(&row[..2], ["configmap/settings", "1"]);

        // Aggregate listings stay quiet when a kind has no matches
        write_collection(dir.path(), "foo", "serviceaccounts.yaml", "apiVersion: v1\nitems: []\n");
        let mut out = Vec::new();
        assert!(get_kind(Kind::ServiceAccount, &snapshot, &options, &mut out).unwrap());
        assert!(out.is_empty());
    }
}
