// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration persistence for k8snap
//!
//! Remembers the snapshot selected with `k8snap use` so later invocations
//! don't need `--snapshot` every time. Stored under ~/.k8snap/:
//! - ~/.k8snap/config.json - user configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Get the base k8snap directory (~/.k8snap/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".k8snap"))
        .context("Could not determine home directory")
}

/// k8snap configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Snapshot root used when `--snapshot` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,

    /// Namespace used when `-n` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl Config {
    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Get the config file path (~/.k8snap/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }

    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Write atomically: temp file in the same directory, then rename
    fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .context("Config path has no parent directory")?;
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
        temp.write_all(content.as_bytes())
            .context("Failed to write config")?;
        temp.persist(path)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Select a snapshot (and optionally a namespace) and save
    pub fn use_snapshot(&mut self, path: PathBuf, namespace: Option<String>) -> Result<()> {
        self.snapshot_path = Some(path);
        if namespace.is_some() {
            self.namespace = namespace;
        }
        self.save()
    }
}
