mod json;
mod jsonpath;
mod table;
mod yaml;

pub use json::JsonFormatter;
pub use jsonpath::Template;
pub use table::TableFormatter;
pub use yaml::YamlFormatter;

use std::io::Write;
use std::str::FromStr;

use anyhow::Result;
use k8s_openapi::Metadata;
use serde::Serialize;

use crate::kubernetes::{ResourceKind, RowContext, format_pairs};
use crate::query::GetOptions;
use crate::snapshot::ResourceCollection;

/// How matched resources are printed
#[derive(Debug, Clone, Default, PartialEq)]
pub enum OutputMode {
    #[default]
    Table,
    Wide,
    Name,
    Yaml,
    Json,
    JsonPath(Template),
}

impl OutputMode {
    /// Whether matches are projected into table rows
    pub fn is_table(&self) -> bool {
        matches!(self, OutputMode::Table | OutputMode::Wide)
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "table" => Ok(OutputMode::Table),
            "wide" => Ok(OutputMode::Wide),
            "name" => Ok(OutputMode::Name),
            "yaml" => Ok(OutputMode::Yaml),
            "json" => Ok(OutputMode::Json),
            _ => match s.strip_prefix("jsonpath=") {
                Some(expr) => Template::parse(expr)
                    .map(OutputMode::JsonPath)
                    .map_err(|e| format!("error parsing jsonpath {}: {}", expr, e)),
                None => Err(format!(
                    "unable to match a printer suitable for the output format \"{}\", \
                     allowed formats are: json,jsonpath,name,wide,yaml",
                    s
                )),
            },
        }
    }
}

/// Column headers for a kind under the given options
pub fn headers<K: ResourceKind>(options: &GetOptions<'_>) -> Vec<String> {
    let columns = match options.output {
        OutputMode::Wide => K::COLUMNS,
        _ => &K::COLUMNS[..K::NARROW_COLUMNS],
    };

    let mut headers = Vec::with_capacity(columns.len() + 2);
    if options.scope.is_all() {
        headers.push("NAMESPACE".to_string());
    }
    headers.extend(columns.iter().map(|c| c.to_string()));
    if options.show_labels {
        headers.push("LABELS".to_string());
    }
    headers
}

/// Project one resource into a display row matching [`headers`]
pub fn project_row<K: ResourceKind>(
    object: &K::Object,
    ctx: &RowContext,
    options: &GetOptions<'_>,
) -> Vec<String> {
    let meta = object.metadata();
    let mut row = Vec::with_capacity(K::COLUMNS.len() + 2);

    if options.scope.is_all() {
        row.push(meta.namespace.clone().unwrap_or_default());
    }

    let name = meta.name.as_deref().unwrap_or_default();
    if options.aggregate {
        row.push(format!("{}/{}", K::SINGULAR, name));
    } else {
        row.push(name.to_string());
    }

    let mut cells = K::cells(object, ctx);
    if !matches!(options.output, OutputMode::Wide) {
        cells.truncate(K::NARROW_COLUMNS - 1);
    }
    row.extend(cells);

    if options.show_labels {
        row.push(format_pairs(meta.labels.as_ref()));
    }
    row
}

/// Either the single requested resource or a list document of all matches
#[derive(Serialize)]
#[serde(untagged)]
enum Selected<'a, T: Serialize> {
    Single(&'a T),
    List(ResourceCollection<&'a T>),
}

/// Consumes matches as the filter yields them and renders the final output
pub struct Renderer<'a, K: ResourceKind> {
    options: &'a GetOptions<'a>,
    rows: Vec<Vec<String>>,
    matches: Vec<K::Object>,
}

impl<'a, K: ResourceKind> Renderer<'a, K> {
    pub fn new(options: &'a GetOptions<'a>) -> Self {
        Self {
            options,
            rows: Vec::new(),
            matches: Vec::new(),
        }
    }

    /// Take one match. Name output is printed immediately.
    pub fn accept(&mut self, object: &K::Object, ctx: &RowContext, out: &mut dyn Write) -> Result<()> {
        match self.options.output {
            OutputMode::Table | OutputMode::Wide => {
                self.rows.push(project_row::<K>(object, ctx, self.options));
            }
            OutputMode::Name => {
                let name = object.metadata().name.as_deref().unwrap_or_default();
                writeln!(out, "{}/{}", K::SINGULAR, name)?;
                self.matches.push(object.clone());
            }
            OutputMode::Yaml | OutputMode::Json | OutputMode::JsonPath(_) => {
                self.matches.push(object.clone());
            }
        }
        Ok(())
    }

    /// Number of resources accepted so far
    pub fn len(&self) -> usize {
        self.rows.len() + self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the final output; returns `true` when nothing matched
    pub fn finish(self, out: &mut dyn Write) -> Result<bool> {
        if self.is_empty() {
            if !self.options.aggregate {
                writeln!(out, "No resources found in {}.", self.options.scope)?;
            }
            return Ok(true);
        }

        if self.options.output.is_table() {
            let headers = headers::<K>(self.options);
            writeln!(out, "{}", TableFormatter::format(&headers, &self.rows))?;
            return Ok(false);
        }

        let selected = if self.options.name.is_some() {
            Selected::Single(&self.matches[0])
        } else {
            Selected::List(ResourceCollection {
                api_version: "v1".to_string(),
                items: self.matches.iter().collect(),
            })
        };

        match self.options.output {
            OutputMode::Yaml => write!(out, "{}", YamlFormatter::format(&selected)?)?,
            OutputMode::Json => writeln!(out, "{}", JsonFormatter::format(&selected)?)?,
            OutputMode::JsonPath(template) => {
                let value = serde_json::to_value(&selected)?;
                write!(out, "{}", template.render(&value))?;
            }
            OutputMode::Name | OutputMode::Table | OutputMode::Wide => {}
        }
        Ok(false)
    }
}
