//! JSONPath templates for `-o jsonpath=...`
//!
//! Supports the kubectl subset that covers day-to-day use:
//!
//! - `{.metadata.name}` - field access (`$` or `@` prefix allowed)
//! - `{.items[0]}`, `{.items[-1]}` - array index
//! - `{.items[*]}`, `{.items[]}`, `{.metadata.labels.*}` - wildcard
//! - `{.metadata.labels['app.kubernetes.io/name']}` - quoted field name
//! - `{"\n"}` - string literal
//! - `{range .items[*]}...{end}` - iterate with each value as the root
//!
//! Text outside braces is copied verbatim. Missing fields render nothing.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed action in template {0:?}")]
    Unclosed(String),
    #[error("unterminated string literal in {0:?}")]
    UnterminatedString(String),
    #[error("unexpected {{end}} in template")]
    UnexpectedEnd,
    #[error("missing {{end}} for {{range {0}}}")]
    MissingEnd(String),
    #[error("invalid path {0:?}")]
    InvalidPath(String),
}

/// Parsed path segment
#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    /// Object field access: `.name` or `['name']`
    Field(String),
    /// Array index, negative counts from the end
    Index(i64),
    /// Every element of an array or value of an object
    Wildcard,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Path(Vec<PathSegment>),
    Range {
        path: Vec<PathSegment>,
        body: Vec<Node>,
    },
}

/// A parsed template, ready to render against any JSON value
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut root: Vec<Node> = Vec::new();
        // Open `{range}` actions, innermost last: (expression, path, body so far)
        let mut open: Vec<(String, Vec<PathSegment>, Vec<Node>)> = Vec::new();
        let mut text = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((start, c)) = chars.next() {
            if c != '{' {
                text.push(c);
                continue;
            }

            let action = consume_action(&mut chars)
                .ok_or_else(|| TemplateError::Unclosed(source[start..].to_string()))?;
            let action = action.trim();

            let body = match open.last_mut() {
                Some((_, _, body)) => body,
                None => &mut root,
            };
            if !text.is_empty() {
                body.push(Node::Text(std::mem::take(&mut text)));
            }

            if action == "end" {
                let (_, path, range_body) = open.pop().ok_or(TemplateError::UnexpectedEnd)?;
                let parent = match open.last_mut() {
                    Some((_, _, body)) => body,
                    None => &mut root,
                };
                parent.push(Node::Range {
                    path,
                    body: range_body,
                });
            } else if let Some(expr) = action.strip_prefix("range ") {
                let expr = expr.trim();
                open.push((expr.to_string(), parse_path(expr)?, Vec::new()));
            } else if action.starts_with('"') {
                body.push(Node::Text(parse_literal(action)?));
            } else {
                body.push(Node::Path(parse_path(action)?));
            }
        }

        if let Some((expr, _, _)) = open.last() {
            return Err(TemplateError::MissingEnd(expr.clone()));
        }
        if !text.is_empty() {
            root.push(Node::Text(text));
        }

        Ok(Self { nodes: root })
    }

    /// Render the template against a JSON value
    pub fn render(&self, root: &Value) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, root, &mut out);
        out
    }
}

/// Consume up to the closing brace of an action, honoring quoted strings
fn consume_action(chars: &mut std::iter::Peekable<std::str::CharIndices>) -> Option<String> {
    let mut action = String::new();
    let mut in_quote = false;
    let mut escaped = false;

    for (_, c) in chars.by_ref() {
        if in_quote {
            action.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quote = false;
            }
            continue;
        }
        match c {
            '}' => return Some(action),
            '"' => {
                in_quote = true;
                action.push(c);
            }
            _ => action.push(c),
        }
    }
    None
}

/// Decode a `"..."` literal with `\n`, `\t`, `\"` and `\\` escapes
fn parse_literal(action: &str) -> Result<String, TemplateError> {
    let inner = action
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| TemplateError::UnterminatedString(action.to_string()))?;

    let mut literal = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            literal.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => literal.push('\n'),
            Some('t') => literal.push('\t'),
            Some('r') => literal.push('\r'),
            Some(other) => literal.push(other),
            None => return Err(TemplateError::UnterminatedString(action.to_string())),
        }
    }
    Ok(literal)
}

/// Parse `.a.b[0]['c.d'].*` into segments
fn parse_path(expr: &str) -> Result<Vec<PathSegment>, TemplateError> {
    let invalid = || TemplateError::InvalidPath(expr.to_string());
    let mut chars = expr.trim().chars().peekable();
    if matches!(chars.peek(), Some('$') | Some('@')) {
        chars.next();
    }

    let mut segments = Vec::new();
    while let Some(&c) = chars.peek() {
        match c {
            '.' => {
                chars.next();
                if chars.peek() == Some(&'*') {
                    chars.next();
                    segments.push(PathSegment::Wildcard);
                    continue;
                }
                let field = consume_field_name(&mut chars);
                if field.is_empty() {
                    // `..` (recursive descent) is not supported
                    if chars.peek() == Some(&'.') {
                        return Err(invalid());
                    }
                } else {
                    segments.push(PathSegment::Field(field));
                }
            }
            '[' => {
                chars.next();
                segments.push(parse_bracket_segment(&mut chars).ok_or_else(invalid)?);
            }
            _ => return Err(invalid()),
        }
    }

    Ok(segments)
}

/// Read a dotted-path field up to the next `.`, `[` or other punctuation
///
/// Letters, digits, `_` and `-` are accepted; keys containing dots or
/// slashes need the `['...']` form.
fn consume_field_name(chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
    let mut field = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '_' || c == '-' {
            field.push(c);
            chars.next();
        } else {
            break;
        }
    }
    field
}

/// Parse a bracket segment and consume the closing bracket
fn parse_bracket_segment(chars: &mut std::iter::Peekable<std::str::Chars>) -> Option<PathSegment> {
    let segment = match *chars.peek()? {
        '*' => {
            chars.next();
            PathSegment::Wildcard
        }
        quote @ ('\'' | '"') => {
            chars.next();
            let mut field = String::new();
            loop {
                let c = chars.next()?;
                if c == quote {
                    break;
                }
                field.push(c);
            }
            PathSegment::Field(field)
        }
        _ => {
            let mut index_str = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_digit() || (c == '-' && index_str.is_empty()) {
                    index_str.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            if index_str.is_empty() {
                PathSegment::Wildcard
            } else {
                PathSegment::Index(index_str.parse().ok()?)
            }
        }
    };

    // Must have closing bracket
    if chars.next()? != ']' {
        return None;
    }
    Some(segment)
}

fn select<'v>(root: &'v Value, path: &[PathSegment]) -> Vec<&'v Value> {
    let mut current = vec![root];
    for segment in path {
        let mut next = Vec::new();
        for value in current {
            match segment {
                PathSegment::Field(name) => {
                    if let Some(v) = value.as_object().and_then(|o| o.get(name)) {
                        next.push(v);
                    }
                }
                PathSegment::Index(idx) => {
                    if let Value::Array(items) = value {
                        let len = items.len() as i64;
                        let idx = if *idx < 0 { len + idx } else { *idx };
                        if (0..len).contains(&idx) {
                            next.push(&items[idx as usize]);
                        }
                    }
                }
                PathSegment::Wildcard => match value {
                    Value::Array(items) => next.extend(items.iter()),
                    Value::Object(map) => next.extend(map.values()),
                    _ => {}
                },
            }
        }
        current = next;
    }
    current
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn render_nodes(nodes: &[Node], current: &Value, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Path(path) => {
                let values: Vec<String> = select(current, path).into_iter().map(format_value).collect();
                out.push_str(&values.join(" "));
            }
            Node::Range { path, body } => {
                for value in select(current, path) {
                    match value {
                        Value::Array(items) => {
                            for item in items {
                                render_nodes(body, item, out);
                            }
                        }
                        other => render_nodes(body, other, out),
                    }
                }
            }
        }
    }
}
