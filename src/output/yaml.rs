use anyhow::{Context, Result};
use serde::Serialize;

pub struct YamlFormatter;

impl YamlFormatter {
    pub fn format<T: Serialize>(value: &T) -> Result<String> {
        serde_yaml::to_string(value).context("Failed to serialize resource to YAML")
    }
}
