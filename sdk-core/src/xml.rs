//! Minimal XML element tree for platform responses
//!
//! Responses are small, so the whole document is materialized into an
//! [`Element`] tree. Names are matched on their local part; namespace
//! prefixes are kept but ignored by lookups.
//!
//! Paths follow a small subset of ElementTree syntax: `a/b/c` walks
//! children, a leading `.//` searches all descendants for the first step,
//! `*` matches any name, and a step may carry one `[@attr='value']`
//! predicate.

use crate::error::{HealthVaultError, Result};
use std::borrow::Cow;
use std::str::FromStr;
use xmlparser::{ElementEnd, Token, Tokenizer};

/// Deepest element nesting accepted by [`parse`]
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    prefix: String,
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

/// Parse a complete document and return its root element.
///
/// Documents nested deeper than [`MAX_DEPTH`] are rejected.
pub fn parse(document: &str) -> Result<Element> {
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    for token in Tokenizer::from(document) {
        let token = token.map_err(|e| HealthVaultError::parse("document", e.to_string()))?;
        match token {
            Token::ElementStart { prefix, local, .. } => {
                if root.is_some() {
                    return Err(HealthVaultError::parse(
                        local.as_str(),
                        "content after the root element",
                    ));
                }
                if stack.len() >= MAX_DEPTH {
                    return Err(HealthVaultError::parse(
                        local.as_str(),
                        format!("nesting deeper than {MAX_DEPTH} elements"),
                    ));
                }
                stack.push(Element::new(prefix.as_str(), local.as_str()));
            }
            Token::Attribute {
                prefix,
                local,
                value,
                ..
            } => {
                if let Some(element) = stack.last_mut() {
                    let name = if prefix.as_str().is_empty() {
                        local.as_str().to_string()
                    } else {
                        format!("{}:{}", prefix.as_str(), local.as_str())
                    };
                    element
                        .attributes
                        .push((name, unescape(value.as_str())?.into_owned()));
                }
            }
            Token::ElementEnd { end, .. } => {
                if let ElementEnd::Open = end {
                    continue;
                }
                let element = stack
                    .pop()
                    .ok_or_else(|| HealthVaultError::parse("document", "unbalanced end tag"))?;
                if let ElementEnd::Close(_, local) = end {
                    if local.as_str() != element.name {
                        return Err(HealthVaultError::parse(
                            &element.name,
                            format!("closed by </{}>", local.as_str()),
                        ));
                    }
                }
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Token::Text { text } => {
                if let Some(element) = stack.last_mut() {
                    element.text.push_str(&unescape(text.as_str())?);
                }
            }
            Token::Cdata { text, .. } => {
                if let Some(element) = stack.last_mut() {
                    element.text.push_str(text.as_str());
                }
            }
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(HealthVaultError::parse(&open.name, "element never closed"));
    }
    root.ok_or_else(|| HealthVaultError::parse("document", "no root element"))
}

impl Element {
    pub fn new(prefix: &str, name: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Local name, without namespace prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Trimmed text content; `None` when empty
    pub fn text(&self) -> Option<&str> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    pub fn find(&self, path: &str) -> Option<&Element> {
        self.find_all(path).into_iter().next()
    }

    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        let (descendant, rest) = match path.strip_prefix(".//") {
            Some(rest) => (true, rest),
            None => (false, path.strip_prefix("./").unwrap_or(path)),
        };
        let steps: Vec<Step<'_>> = rest.split('/').map(Step::parse).collect();
        let Some((first, remaining)) = steps.split_first() else {
            return Vec::new();
        };

        let mut current: Vec<&Element> = if descendant {
            let mut all = Vec::new();
            self.collect_descendants(&mut all);
            all.into_iter().filter(|e| e.matches(first)).collect()
        } else {
            self.children.iter().filter(|c| c.matches(first)).collect()
        };

        for step in remaining {
            current = current
                .into_iter()
                .flat_map(|e| e.children.iter().filter(move |c| c.matches(step)))
                .collect();
        }
        current
    }

    /// Element at `path`, or a parse error naming the missing element
    pub fn required(&self, path: &str) -> Result<&Element> {
        self.find(path).ok_or_else(|| {
            HealthVaultError::parse(path, format!("required element missing under <{}>", self.name))
        })
    }

    /// Text at `path`, or `None`
    pub fn text_at(&self, path: &str) -> Option<String> {
        self.find(path).and_then(Element::text).map(str::to_string)
    }

    /// Non-empty texts of every match of `path`
    pub fn texts_at(&self, path: &str) -> Vec<String> {
        self.find_all(path)
            .into_iter()
            .filter_map(Element::text)
            .map(str::to_string)
            .collect()
    }

    /// Convert this element's text, failing on absent or malformed values
    pub fn parse_text<T>(&self) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let text = self
            .text()
            .ok_or_else(|| HealthVaultError::parse(&self.name, "empty value"))?;
        text.parse::<T>()
            .map_err(|e| HealthVaultError::parse(&self.name, format!("{text:?}: {e}")))
    }

    pub fn int_at(&self, path: &str) -> Result<Option<i64>> {
        self.optional(path, Element::parse_text::<i64>)
    }

    pub fn float_at(&self, path: &str) -> Result<Option<f64>> {
        self.optional(path, Element::parse_text::<f64>)
    }

    /// xs:boolean at `path`: `true`/`false`/`1`/`0`
    pub fn bool_at(&self, path: &str) -> Result<Option<bool>> {
        self.optional(path, |e| match e.text().map(str::to_ascii_lowercase).as_deref() {
            Some("true") | Some("1") => Ok(true),
            Some("false") | Some("0") => Ok(false),
            other => Err(HealthVaultError::parse(
                &e.name,
                format!("{other:?} is not a boolean"),
            )),
        })
    }

    /// Apply `parser` to the element at `path` when it exists
    pub fn optional<'a, T, F>(&'a self, path: &str, parser: F) -> Result<Option<T>>
    where
        F: FnOnce(&'a Element) -> Result<T>,
    {
        self.find(path).map(parser).transpose()
    }

    /// Apply `parser` to every match of `path`
    pub fn all<'a, T, F>(&'a self, path: &str, parser: F) -> Result<Vec<T>>
    where
        F: Fn(&'a Element) -> Result<T>,
    {
        self.find_all(path).into_iter().map(parser).collect()
    }

    fn collect_descendants<'a>(&'a self, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            out.push(child);
            child.collect_descendants(out);
        }
    }

    fn matches(&self, step: &Step<'_>) -> bool {
        if step.name != "*" && step.name != self.name {
            return false;
        }
        match step.predicate {
            Some((attr, value)) => self.attr(attr) == Some(value),
            None => true,
        }
    }
}

struct Step<'p> {
    name: &'p str,
    predicate: Option<(&'p str, &'p str)>,
}

impl<'p> Step<'p> {
    fn parse(step: &'p str) -> Self {
        let Some((name, rest)) = step.split_once('[') else {
            return Self {
                name: step,
                predicate: None,
            };
        };
        let predicate = rest
            .strip_suffix(']')
            .and_then(|p| p.strip_prefix('@'))
            .and_then(|p| p.split_once('='))
            .map(|(attr, value)| (attr, value.trim_matches(|c| c == '\'' || c == '"')));
        Self { name, predicate }
    }
}

/// Escape text for use inside element content or attribute values
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Resolve predefined and numeric character references
pub fn unescape(text: &str) -> Result<Cow<'_, str>> {
    if !text.contains('&') {
        return Ok(Cow::Borrowed(text));
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let end = tail
            .find(';')
            .ok_or_else(|| HealthVaultError::parse("text", "unterminated entity reference"))?;
        let entity = &tail[..end];
        let resolved = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32).ok_or_else(|| {
                    HealthVaultError::parse("text", format!("unknown entity &{entity};"))
                })?
            }
        };
        out.push(resolved);
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    Ok(Cow::Owned(out))
}
