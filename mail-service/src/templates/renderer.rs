//! Template rendering with variable substitution

use serde_json::{Map, Value};
use thiserror::Error;

/// Template rendering failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// Referenced variable is not present in the data
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    /// Tag contents are not a property path
    #[error("Invalid expression: {0:?}")]
    InvalidExpression(String),

    /// `<%` without a closing `%>`
    #[error("Unterminated tag at byte {offset}")]
    Unterminated { offset: usize },

    /// Evaluation tags (`<% ... %>`) are not supported
    #[error("Unsupported tag at byte {offset}")]
    UnsupportedTag { offset: usize },
}

/// How an interpolated value is written to the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interpolation {
    /// `<%= expr %>` or `${expr}`
    Raw,
    /// `<%- expr %>`
    Escaped,
}

/// One step of a property path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

/// Renders text templates against JSON data
///
/// # Syntax
/// - `<%= name %>` - value of `name`, written as-is
/// - `<%- name %>` - value of `name`, HTML-escaped
/// - `${name}` - same as `<%= name %>`
/// - `user.name`, `items[0]`, `items.0` - nested lookups
///
/// Any path that does not resolve fails the whole render with
/// [`TemplateError::UndefinedVariable`]. `null` renders as an empty string.
pub struct TemplateRenderer;

impl TemplateRenderer {
    /// Render a template with the provided data
    pub fn render(template: &str, data: &Map<String, Value>) -> Result<String, TemplateError> {
        let mut output = String::with_capacity(template.len());
        let mut rest = template;
        let mut consumed = 0;

        while let Some(tag) = next_tag(rest, consumed)? {
            output.push_str(&rest[..tag.start]);

            let text = stringify(lookup(data, tag.expr)?);
            match tag.mode {
                Interpolation::Raw => output.push_str(&text),
                Interpolation::Escaped => push_escaped(&mut output, &text),
            }

            consumed += tag.start + tag.len;
            rest = &rest[tag.start + tag.len..];
        }

        output.push_str(rest);
        Ok(output)
    }

    /// Extract all variable paths referenced by a template
    ///
    /// Returns each path once, in order of first appearance.
    pub fn extract_variables(template: &str) -> Result<Vec<String>, TemplateError> {
        let mut variables: Vec<String> = Vec::new();
        let mut rest = template;
        let mut consumed = 0;

        while let Some(tag) = next_tag(rest, consumed)? {
            parse_path(tag.expr)?;
            if !variables.iter().any(|v| v == tag.expr) {
                variables.push(tag.expr.to_string());
            }

            consumed += tag.start + tag.len;
            rest = &rest[tag.start + tag.len..];
        }

        Ok(variables)
    }
}

/// Interpolation tag found in a template
struct Tag<'t> {
    /// Byte position of the opening delimiter within the scanned text
    start: usize,
    /// Length of the whole tag, delimiters included
    len: usize,
    expr: &'t str,
    mode: Interpolation,
}

/// Find the next `<%= %>`, `<%- %>` or `${ }` tag in `rest`
///
/// `offset` is the position of `rest` within the full template and is only
/// used for error reporting. An unclosed `${` is left as plain text.
fn next_tag(rest: &str, offset: usize) -> Result<Option<Tag<'_>>, TemplateError> {
    let mut from = 0;

    loop {
        let erb = rest[from..].find("<%").map(|i| i + from);
        let es = rest[from..].find("${").map(|i| i + from);

        let start = match (erb, es) {
            (None, None) => return Ok(None),
            (Some(e), Some(s)) => e.min(s),
            (Some(p), None) | (None, Some(p)) => p,
        };
        let tag = &rest[start + 2..];

        if es == Some(start) {
            match tag.find('}') {
                Some(end) => {
                    return Ok(Some(Tag {
                        start,
                        len: 2 + end + 1,
                        expr: tag[..end].trim(),
                        mode: Interpolation::Raw,
                    }))
                }
                None => {
                    from = start + 2;
                    continue;
                }
            }
        }

        let at = offset + start;
        let mode = match tag.as_bytes().first() {
            Some(b'=') => Interpolation::Raw,
            Some(b'-') => Interpolation::Escaped,
            _ if tag.contains("%>") => return Err(TemplateError::UnsupportedTag { offset: at }),
            _ => return Err(TemplateError::Unterminated { offset: at }),
        };

        let body = &tag[1..];
        let end = body
            .find("%>")
            .ok_or(TemplateError::Unterminated { offset: at })?;

        // "<%" + mode char + expression + "%>"
        return Ok(Some(Tag {
            start,
            len: 2 + 1 + end + 2,
            expr: body[..end].trim(),
            mode,
        }));
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Parse `a.b[0].c` into path segments
fn parse_path(expr: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let invalid = || TemplateError::InvalidExpression(expr.to_string());
    let mut segments = Vec::new();

    for part in expr.split('.') {
        let (head, mut brackets) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };

        if !is_identifier(head) {
            return Err(invalid());
        }
        segments.push(Segment::Key(head));

        while !brackets.is_empty() {
            let close = brackets.find(']').ok_or_else(invalid)?;
            let index = brackets[1..close].trim().parse().map_err(|_| invalid())?;
            segments.push(Segment::Index(index));
            brackets = &brackets[close + 1..];
            if !brackets.is_empty() && !brackets.starts_with('[') {
                return Err(invalid());
            }
        }
    }

    Ok(segments)
}

fn lookup<'a>(data: &'a Map<String, Value>, expr: &str) -> Result<&'a Value, TemplateError> {
    let segments = parse_path(expr)?;
    let undefined = || TemplateError::UndefinedVariable(expr.to_string());

    let mut iter = segments.into_iter();
    let mut current = match iter.next() {
        Some(Segment::Key(key)) => data.get(key).ok_or_else(undefined)?,
        _ => return Err(TemplateError::InvalidExpression(expr.to_string())),
    };

    for segment in iter {
        current = match (current, segment) {
            (Value::Object(map), Segment::Key(key)) => map.get(key),
            (Value::Array(items), Segment::Index(index)) => items.get(index),
            (Value::Array(items), Segment::Key(key)) => {
                key.parse::<usize>().ok().and_then(|index| items.get(index))
            }
            _ => None,
        }
        .ok_or_else(undefined)?;
    }

    Ok(current)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

fn push_escaped(output: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#39;"),
            _ => output.push(c),
        }
    }
}
