// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;
pub mod config;
mod kubernetes;
mod output;
mod query;
mod snapshot;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};
use tracing_subscriber::prelude::*;

use cli::{Args, Command};
use config::Config;
use kubernetes::{Kind, LabelSelector};
use output::{OutputMode, TableFormatter};
use query::GetOptions;
use snapshot::{NamespaceScope, Snapshot, SnapshotError};

/// Initialize logging to stderr, keeping stdout for rendered output
fn init_logging(verbose: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let filter = if verbose { "k8snap=debug" } else { "k8snap=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(&args) {
        // Snapshot errors are printed exactly as kubectl users expect them
        match e.downcast_ref::<SnapshotError>() {
            Some(err) => eprintln!("{}", err),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    match &args.command {
        Command::Get {
            kinds,
            name,
            output,
            selector,
            show_labels,
        } => {
            let output = output.clone().unwrap_or_default();
            run_get(
                args,
                kinds,
                name.as_deref(),
                &output,
                selector.as_deref(),
                *show_labels,
            )
        }
        Command::Use { path } => run_use(path, args.namespace.clone()),
        Command::ApiResources => {
            println!("{}", api_resources());
            Ok(())
        }
    }
}

fn run_get(
    args: &Args,
    kinds: &str,
    name: Option<&str>,
    output: &OutputMode,
    selector: Option<&str>,
    show_labels: bool,
) -> Result<()> {
    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring unreadable config");
        Config::default()
    });

    let root = args
        .snapshot
        .clone()
        .or(config.snapshot_path)
        .context("No snapshot selected: pass --snapshot <DIR> or run `k8snap use <DIR>`")?;

    let scope = if args.all_namespaces {
        NamespaceScope::All
    } else {
        NamespaceScope::Single(
            args.namespace
                .clone()
                .or(config.namespace)
                .unwrap_or_else(|| "default".to_string()),
        )
    };

    let kinds = Kind::parse_list(kinds).map_err(anyhow::Error::msg)?;
    let selector = selector.map(LabelSelector::parse).unwrap_or_default();
    let snapshot = Snapshot::new(root);
    debug!(root = %snapshot.root().display(), scope = %scope, kinds = kinds.len(), "Running get");

    let options = GetOptions {
        scope: &scope,
        name,
        selector: &selector,
        output,
        show_labels,
        aggregate: kinds.len() > 1,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    get_kinds(&snapshot, &kinds, &options, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Run the engine once per kind; returns `true` when every kind came up empty
///
/// Tables are separated by a blank line. In an aggregate listing a single
/// notice is printed when nothing matched at all.
fn get_kinds(
    snapshot: &Snapshot,
    kinds: &[Kind],
    options: &GetOptions<'_>,
    out: &mut dyn Write,
) -> Result<bool> {
    let mut all_empty = true;

    for &kind in kinds {
        let empty = if options.output.is_table() {
            // Tables are only known to be non-empty once rendered
            let mut table = Vec::new();
            let empty = query::get_kind(kind, snapshot, options, &mut table)?;
            if !empty {
                if !all_empty {
                    writeln!(out)?;
                }
                out.write_all(&table)?;
            } else if !options.aggregate {
                out.write_all(&table)?;
            }
            empty
        } else {
            query::get_kind(kind, snapshot, options, out)?
        };
        all_empty &= empty;
    }

    if all_empty && options.aggregate {
        writeln!(out, "No resources found in {}.", options.scope)?;
    }
    Ok(all_empty)
}

fn run_use(path: &Path, namespace: Option<String>) -> Result<()> {
    let root = path
        .canonicalize()
        .with_context(|| format!("Snapshot directory not found: {}", path.display()))?;
    if !root.is_dir() {
        anyhow::bail!("Not a directory: {}", root.display());
    }
    if !root.join("namespaces").is_dir() {
        warn!(path = %root.display(), "No namespaces/ directory, this does not look like a snapshot");
    }

    let mut config = Config::load()?;
    config.use_snapshot(root.clone(), namespace)?;

    println!("Now using snapshot {}", root.display());
    if let Some(ns) = &config.namespace {
        println!("Default namespace: {}", ns);
    }
    Ok(())
}

/// Table of supported kinds, in the shape of `kubectl api-resources`
fn api_resources() -> String {
    let headers: Vec<String> = ["NAME", "SHORTNAMES", "APIVERSION", "NAMESPACED", "KIND"]
        .iter()
        .map(|h| h.to_string())
        .collect();

    let rows: Vec<Vec<String>> = Kind::ALL
        .iter()
        .map(|kind| {
            vec![
                kind.plural().to_string(),
                kind.aliases().join(","),
                kind.api_version().to_string(),
                "true".to_string(),
                kind.kind_name().to_string(),
            ]
        })
        .collect();

    TableFormatter::format(&headers, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::testing::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_collection(
            dir.path(),
            "foo",
            "services.yaml",
            &list(&[service_yaml("a", "foo", &[("tier", "web")])]),
        );
        write_collection(
            dir.path(),
            "foo",
            "configmaps.yaml",
            "apiVersion: v1\nitems:\n- apiVersion: v1\n  kind: ConfigMap\n  metadata:\n    name: settings\n    namespace: foo\n",
        );
        write_collection(dir.path(), "foo", "secrets.yaml", "apiVersion: v1\nitems: []\n");
        write_collection(dir.path(), "foo", "serviceaccounts.yaml", "apiVersion: v1\nitems: []\n");
        dir
    }

    fn run_kinds(dir: &TempDir, kinds: &str, selector: &str, output: &str) -> (bool, String) {
        let kinds = Kind::parse_list(kinds).unwrap();
        let scope = NamespaceScope::Single("foo".to_string());
        let selector = LabelSelector::parse(selector);
        let output: OutputMode = output.parse().unwrap();
        let options = GetOptions {
            scope: &scope,
            name: None,
            selector: &selector,
            output: &output,
            show_labels: false,
            aggregate: kinds.len() > 1,
        };
        let mut out = Vec::new();
        let empty = get_kinds(&Snapshot::new(dir.path()), &kinds, &options, &mut out).unwrap();
        (empty, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_get_all_separates_tables() {
        let dir = fixture();
        let (empty, output) = run_kinds(&dir, "all", "", "");
        assert!(!empty);

        let blocks: Vec<&str> = output.split("\n\n").collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_with("NAME"));
        assert!(blocks[0].contains("service/a"));
        assert!(blocks[1].contains("configmap/settings"));
        assert!(!output.contains("No resources found"));
    }

    #[test]
    fn test_get_all_empty_prints_single_notice() {
        let dir = fixture();
        let (empty, output) = run_kinds(&dir, "svc,cm", "tier=none", "");
        assert!(empty);
        assert_eq!(output, "No resources found in foo namespace.\n");
    }

    #[test]
    fn test_single_kind_empty_notice_is_kept() {
        let dir = fixture();
        let (empty, output) = run_kinds(&dir, "secrets", "", "");
        assert!(empty);
        assert_eq!(output, "No resources found in foo namespace.\n");
    }

    #[test]
    fn test_get_all_name_output() {
        let dir = fixture();
        let (empty, output) = run_kinds(&dir, "all", "", "name");
        assert!(!empty);
        assert_eq!(output, "service/a\nconfigmap/settings\n");
    }

    #[test]
    fn test_api_resources_lists_every_kind() {
        let table = api_resources();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), Kind::ALL.len() + 1);
        assert!(lines[1].starts_with("services"));
        assert!(table.contains("svc"));
        assert!(table.contains("ServiceAccount"));
    }
}
