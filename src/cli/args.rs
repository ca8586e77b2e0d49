// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputMode;

#[derive(Parser, Debug)]
#[command(name = "k8snap")]
#[command(author, version, about = "Query Kubernetes cluster snapshots offline, kubectl style")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Snapshot root directory (overrides the one selected with `use`)
    #[arg(long, global = true, value_name = "DIR")]
    pub snapshot: Option<PathBuf>,

    /// Namespace to query
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    /// Query every namespace in the snapshot
    #[arg(short = 'A', long, global = true)]
    pub all_namespaces: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Display one or many resources
    Get {
        /// Resource kind, a comma-separated list of kinds, or `all`
        kinds: String,

        /// Only show the resource with this name
        name: Option<String>,

        /// Output format: wide, name, yaml, json or jsonpath=<template>
        #[arg(short, long, value_name = "FORMAT")]
        output: Option<OutputMode>,

        /// Label selector, e.g. "app=web,tier!=db,!canary"
        #[arg(short = 'l', long, value_name = "SELECTOR")]
        selector: Option<String>,

        /// Append a LABELS column to table output
        #[arg(long)]
        show_labels: bool,
    },

    /// Select the snapshot (and, with -n, the namespace) used by later commands
    Use {
        /// Snapshot root directory
        path: PathBuf,
    },

    /// List the supported resource kinds
    ApiResources,
}
