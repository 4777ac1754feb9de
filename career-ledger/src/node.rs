//! Key-value node format used for persistence
//!
//! A node has a name, an ordered list of `key = value` pairs and ordered
//! child nodes. The text form is the host's brace format:
//!
//! ```text
//! SCENARIO
//! {
//! 	NewGame = False
//! 	CURRENCY_TRANSACTION
//! 	{
//! 		reason = ContractReward
//! 		fundingDelta = 100
//! 	}
//! }
//! ```
//!
//! The root node returned by [`ConfigNode::parse`] is unnamed and holds the
//! top-level values and nodes of the text.
//!
//! Characters with structural meaning are backslash-escaped on write: `\`,
//! `{`, `}`, the second `/` of a `//`, `=` inside keys and names, and line
//! breaks (`\n`, `\r`). Unknown escapes are read back verbatim. Whitespace
//! around keys and values is not preserved.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One `key = value` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeValue {
    /// Key
    pub key: String,
    /// Raw string value
    pub value: String,
}

/// Generic key-value node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigNode {
    name: String,
    values: Vec<NodeValue>,
    nodes: Vec<ConfigNode>,
}

impl ConfigNode {
    /// Create an empty node
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Node name (empty for a parsed root)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First value stored under `key`
    pub fn get_value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.key == key)
            .map(|v| v.value.as_str())
    }

    /// All values stored under `key`, in order
    pub fn get_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.values
            .iter()
            .filter(move |v| v.key == key)
            .map(|v| v.value.as_str())
    }

    /// First value under `key` parsed as `T`; `None` if absent or unparseable
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get_value(key).and_then(|v| v.trim().parse().ok())
    }

    /// First value under `key` read as a boolean, accepting any letter case
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        let value = self.get_value(key)?.trim();
        if value.eq_ignore_ascii_case("true") {
            Some(true)
        } else if value.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }

    /// Whether any value is stored under `key`
    pub fn has_value(&self, key: &str) -> bool {
        self.values.iter().any(|v| v.key == key)
    }

    /// Replace the first value under `key`. Returns `false` if there was none.
    pub fn set_value(&mut self, key: &str, value: impl Into<String>) -> bool {
        match self.values.iter_mut().find(|v| v.key == key) {
            Some(existing) => {
                existing.value = value.into();
                true
            }
            None => false,
        }
    }

    /// Append a value, even if `key` is already present
    pub fn add_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.push(NodeValue {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Set the value if `key` is present, add it otherwise
    ///
    /// Repeated writes never produce duplicate keys.
    pub fn set_or_add_value(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if !self.set_value(key, value.clone()) {
            self.add_value(key, value);
        }
    }

    /// All key-value pairs, in order
    pub fn values(&self) -> &[NodeValue] {
        &self.values
    }

    /// Remove every key-value pair
    pub fn clear_values(&mut self) {
        self.values.clear();
    }

    /// First child node called `name`
    pub fn get_node(&self, name: &str) -> Option<&ConfigNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// All child nodes called `name`, in order
    pub fn get_nodes<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ConfigNode> + 'a {
        self.nodes.iter().filter(move |n| n.name == name)
    }

    /// All child nodes, in order
    pub fn nodes(&self) -> &[ConfigNode] {
        &self.nodes
    }

    /// Mutable access to the child nodes
    pub fn nodes_mut(&mut self) -> &mut [ConfigNode] {
        &mut self.nodes
    }

    /// Append a child node
    pub fn add_node(&mut self, node: ConfigNode) {
        self.nodes.push(node);
    }

    /// Remove every child node
    pub fn clear_nodes(&mut self) {
        self.nodes.clear();
    }

    /// Render in the brace text format
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if self.name.is_empty() {
            self.write_body(&mut out, 0);
        } else {
            self.write_node(&mut out, 0);
        }
        out
    }

    fn write_node(&self, out: &mut String, depth: usize) {
        let indent = "\t".repeat(depth);
        out.push_str(&indent);
        out.push_str(&escape(&self.name, true));
        out.push('\n');
        out.push_str(&indent);
        out.push_str("{\n");
        self.write_body(out, depth + 1);
        out.push_str(&indent);
        out.push_str("}\n");
    }

    fn write_body(&self, out: &mut String, depth: usize) {
        let indent = "\t".repeat(depth);
        for v in &self.values {
            out.push_str(&indent);
            out.push_str(&escape(&v.key, true));
            out.push_str(" = ");
            out.push_str(&escape(&v.value, false));
            out.push('\n');
        }
        for node in &self.nodes {
            node.write_node(out, depth);
        }
    }

    /// Parse the brace text format into an unnamed root node
    pub fn parse(text: &str) -> Result<ConfigNode> {
        let mut stack: Vec<(ConfigNode, usize)> = vec![(ConfigNode::default(), 0)];
        let mut pending: Option<(String, usize)> = None;

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;

            for token in tokenize(line) {
                match token {
                    Token::Open => {
                        let (name, _) = pending.take().ok_or_else(|| {
                            Error::parse(line_no, "'{' without a node name")
                        })?;
                        stack.push((ConfigNode::new(unescape(&name)), line_no));
                    }
                    Token::Close => {
                        if let Some((name, _)) = pending.take() {
                            return Err(Error::parse(
                                line_no,
                                format!("node name '{}' has no body", name),
                            ));
                        }
                        if stack.len() == 1 {
                            return Err(Error::parse(line_no, "unmatched '}'"));
                        }
                        if let Some((node, _)) = stack.pop() {
                            if let Some((parent, _)) = stack.last_mut() {
                                parent.add_node(node);
                            }
                        }
                    }
                    Token::Text(text) => {
                        if let Some((name, _)) = &pending {
                            return Err(Error::parse(
                                line_no,
                                format!("expected '{{' after node name '{}'", name),
                            ));
                        }
                        match split_assignment(text) {
                            Some((key, value)) => {
                                let key = key.trim();
                                if key.is_empty() {
                                    return Err(Error::parse(line_no, "empty key"));
                                }
                                if let Some((current, _)) = stack.last_mut() {
                                    current.add_value(unescape(key), unescape(value.trim()));
                                }
                            }
                            None => pending = Some((text.to_string(), line_no)),
                        }
                    }
                }
            }
        }

        if let Some((name, line)) = pending {
            return Err(Error::parse(line, format!("node name '{}' has no body", name)));
        }
        if stack.len() > 1 {
            let (node, line) = &stack[stack.len() - 1];
            return Err(Error::parse(*line, format!("node '{}' is never closed", node.name)));
        }

        Ok(stack.pop().map(|(root, _)| root).unwrap_or_default())
    }
}

impl fmt::Display for ConfigNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

enum Token<'a> {
    Open,
    Close,
    Text(&'a str),
}

/// Split one line into braces and trimmed text runs, dropping any comment
///
/// Escaped characters never act as braces or comment markers.
fn tokenize(line: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut end = line.len();
    let mut chars = line.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '\\' => {
                chars.next();
            }
            '/' if matches!(chars.peek(), Some((_, '/'))) => {
                end = pos;
                break;
            }
            '{' | '}' => {
                push_text(&mut tokens, &line[start..pos]);
                tokens.push(if ch == '{' { Token::Open } else { Token::Close });
                start = pos + 1;
            }
            _ => {}
        }
    }

    push_text(&mut tokens, &line[start..end]);
    tokens
}

fn push_text<'a>(tokens: &mut Vec<Token<'a>>, text: &'a str) {
    let text = text.trim();
    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }
}

/// Split at the first unescaped `=`
fn split_assignment(text: &str) -> Option<(&str, &str)> {
    let mut chars = text.char_indices();
    while let Some((pos, ch)) = chars.next() {
        match ch {
            '\\' => {
                chars.next();
            }
            '=' => return Some((&text[..pos], &text[pos + 1..])),
            _ => {}
        }
    }
    None
}

fn escape(text: &str, in_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous = None;

    for ch in text.chars() {
        match ch {
            '\\' | '{' | '}' => {
                out.push('\\');
                out.push(ch);
            }
            '=' if in_key => out.push_str("\\="),
            '/' if previous == Some('/') => out.push_str("\\/"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
        previous = Some(ch);
    }
    out
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(c @ ('\\' | '{' | '}' | '/' | '=')) => out.push(c),
            Some(c) => {
                out.push('\\');
                out.push(c);
            }
            None => out.push('\\'),
        }
    }
    out
}
