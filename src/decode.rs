//! YAML document decoding into the JSON document tree.
//!
//! Plain scalars resolve with YAML 1.1 rules, the way the Kubernetes API
//! server reads manifests: `yes`/`on` are booleans, `0644` is octal, `1_000`
//! is an integer. Quoted and block scalars stay strings. Mapping keys are
//! stringified, merge keys (`<<`) are applied, aliases are expanded and
//! duplicate keys are rejected.
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::sync::OnceLock;
use yaml_rust2::parser::{Event, EventReceiver, Parser, Tag};
use yaml_rust2::scanner::TScalarStyle;

use crate::error::{GatekeeperError, Result};

const MERGE_KEY: &str = "<<";
const CORE_TAG_HANDLES: &[&str] = &["tag:yaml.org,2002:", "!!"];

const NULL_WORDS: &[&str] = &["", "~", "null", "Null", "NULL"];
const TRUE_WORDS: &[&str] = &[
    "y", "Y", "yes", "Yes", "YES", "true", "True", "TRUE", "on", "On", "ON",
];
const FALSE_WORDS: &[&str] = &[
    "n", "N", "no", "No", "NO", "false", "False", "FALSE", "off", "Off", "OFF",
];
const NON_FINITE_WORDS: &[&str] = &[
    ".inf", ".Inf", ".INF", "+.inf", "+.Inf", "+.INF", "-.inf", "-.Inf", "-.INF", ".nan", ".NaN",
    ".NAN",
];

/// Largest magnitude at which every integral `f64` is exact.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Decode a single YAML document.
///
/// Empty and comment-only documents decode to `Value::Null`.
pub fn decode(bytes: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(bytes)
        .map_err(|err| malformed(format!("document is not UTF-8: {err}")))?;
    let mut builder = TreeBuilder::default();
    Parser::new_from_str(text)
        .load(&mut builder, true)
        .map_err(|err| malformed(err.to_string()))?;
    builder.finish()
}

fn malformed(message: impl Into<String>) -> GatekeeperError {
    GatekeeperError::MalformedInput(message.into())
}

enum Key {
    Name(String),
    Merge,
}

enum Frame {
    Sequence {
        anchor: usize,
        items: Vec<Value>,
    },
    Mapping {
        anchor: usize,
        entries: Map<String, Value>,
        key: Option<Key>,
        merges: Vec<Value>,
    },
}

impl Frame {
    fn close(self) -> Result<(usize, Value)> {
        match self {
            Frame::Sequence { anchor, items } => Ok((anchor, Value::Array(items))),
            Frame::Mapping {
                anchor,
                mut entries,
                merges,
                ..
            } => {
                // Explicit keys win over merged ones; earlier merge sources
                // win over later ones.
                for source in merges {
                    match source {
                        Value::Object(map) => merge_absent(&mut entries, map),
                        Value::Array(maps) => {
                            for map in maps {
                                let Value::Object(map) = map else {
                                    return Err(malformed("merge sequence holds a non-mapping"));
                                };
                                merge_absent(&mut entries, map);
                            }
                        }
                        _ => return Err(malformed("merge value must be a mapping")),
                    }
                }
                Ok((anchor, Value::Object(entries)))
            }
        }
    }
}

fn merge_absent(entries: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        entries.entry(key).or_insert(value);
    }
}

/// Builds one document tree from parser events.
#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Frame>,
    anchors: HashMap<usize, Value>,
    documents: usize,
    root: Option<Value>,
    error: Option<GatekeeperError>,
}

impl EventReceiver for TreeBuilder {
    fn on_event(&mut self, event: Event) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.handle(event) {
            self.error = Some(err);
        }
    }
}

impl TreeBuilder {
    fn finish(self) -> Result<Value> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(self.root.unwrap_or(Value::Null))
    }

    fn handle(&mut self, event: Event) -> Result<()> {
        match event {
            Event::DocumentStart { .. } => {
                self.documents += 1;
                if self.documents > 1 {
                    return Err(malformed("chunk holds more than one document"));
                }
            }
            Event::Scalar(text, style, anchor, tag) => {
                let plain = style == TScalarStyle::Plain;
                if plain && tag.is_none() && text == MERGE_KEY && self.expects_key() {
                    return self.set_merge_key();
                }
                let value = resolve_scalar(text, plain, tag.as_ref())?;
                self.complete(anchor, value)?;
            }
            Event::Alias(id) => {
                let value = self
                    .anchors
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| malformed("alias refers to an unknown anchor"))?;
                self.complete(0, value)?;
            }
            Event::SequenceStart(anchor, _) => self.stack.push(Frame::Sequence {
                anchor,
                items: Vec::new(),
            }),
            Event::MappingStart(anchor, _) => self.stack.push(Frame::Mapping {
                anchor,
                entries: Map::new(),
                key: None,
                merges: Vec::new(),
            }),
            Event::SequenceEnd | Event::MappingEnd => {
                let frame = self
                    .stack
                    .pop()
                    .ok_or_else(|| malformed("unbalanced collection end"))?;
                let (anchor, value) = frame.close()?;
                self.complete(anchor, value)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn expects_key(&self) -> bool {
        matches!(self.stack.last(), Some(Frame::Mapping { key: None, .. }))
    }

    fn set_merge_key(&mut self) -> Result<()> {
        if let Some(Frame::Mapping { key, .. }) = self.stack.last_mut() {
            *key = Some(Key::Merge);
        }
        Ok(())
    }

    /// Attach a finished node to its parent (or make it the root).
    fn complete(&mut self, anchor: usize, value: Value) -> Result<()> {
        if anchor != 0 {
            self.anchors.insert(anchor, value.clone());
        }
        match self.stack.last_mut() {
            None => self.root = Some(value),
            Some(Frame::Sequence { items, .. }) => items.push(value),
            Some(Frame::Mapping {
                entries,
                key,
                merges,
                ..
            }) => match key.take() {
                None => *key = Some(Key::Name(key_to_string(value)?)),
                Some(Key::Merge) => merges.push(value),
                Some(Key::Name(name)) => {
                    if entries.contains_key(&name) {
                        return Err(malformed(format!("duplicate mapping key {name:?}")));
                    }
                    entries.insert(name, value);
                }
            },
        }
        Ok(())
    }
}

fn resolve_scalar(text: String, plain: bool, tag: Option<&Tag>) -> Result<Value> {
    if let Some(tag) = tag.filter(|tag| CORE_TAG_HANDLES.contains(&tag.handle.as_str())) {
        return resolve_tagged(text, &tag.suffix);
    }
    if !plain {
        return Ok(Value::String(text));
    }
    if NULL_WORDS.contains(&text.as_str()) {
        return Ok(Value::Null);
    }
    if let Some(flag) = bool_value(&text) {
        return Ok(Value::Bool(flag));
    }
    if let Some(number) = number_value(&text)? {
        return Ok(Value::Number(number));
    }
    Ok(Value::String(text))
}

fn resolve_tagged(text: String, suffix: &str) -> Result<Value> {
    let invalid = || malformed(format!("{text:?} is not a valid !!{suffix}"));
    match suffix {
        "null" => Ok(Value::Null),
        "bool" => bool_value(&text).map(Value::Bool).ok_or_else(invalid),
        "int" => int_value(&text.replace('_', ""))
            .map(Value::Number)
            .ok_or_else(invalid),
        "float" => number_value(&text)?.map(Value::Number).ok_or_else(invalid),
        _ => Ok(Value::String(text)),
    }
}

fn bool_value(text: &str) -> Option<bool> {
    if TRUE_WORDS.contains(&text) {
        Some(true)
    } else if FALSE_WORDS.contains(&text) {
        Some(false)
    } else {
        None
    }
}

fn number_value(text: &str) -> Result<Option<Number>> {
    if NON_FINITE_WORDS.contains(&text) {
        return Err(malformed(format!("number {text} has no JSON representation")));
    }
    if !text.starts_with(|ch: char| ch.is_ascii_digit() || matches!(ch, '+' | '-' | '.')) {
        return Ok(None);
    }
    let compact = text.replace('_', "");
    if let Some(number) = int_value(&compact) {
        return Ok(Some(number));
    }
    if !float_pattern().is_match(&compact) {
        return Ok(None);
    }
    Ok(compact.parse::<f64>().ok().and_then(float_number))
}

/// Integers in decimal, `0x`, `0o`, `0b` or leading-zero octal notation.
fn int_value(text: &str) -> Option<Number> {
    let (negative, unsigned) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (radix, digits) = if let Some(rest) = strip_radix_prefix(unsigned, 'x') {
        (16, rest)
    } else if let Some(rest) = strip_radix_prefix(unsigned, 'o') {
        (8, rest)
    } else if let Some(rest) = strip_radix_prefix(unsigned, 'b') {
        (2, rest)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_digit(radix)) {
        return None;
    }
    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    if negative {
        i64::try_from(-i128::from(magnitude)).ok().map(Number::from)
    } else {
        Some(Number::from(magnitude))
    }
}

fn strip_radix_prefix(text: &str, marker: char) -> Option<&str> {
    let rest = text.strip_prefix('0')?;
    rest.strip_prefix(marker)
        .or_else(|| rest.strip_prefix(marker.to_ascii_uppercase()))
}

/// Integral floats serialize as integers, as a YAML-to-JSON conversion does.
fn float_number(value: f64) -> Option<Number> {
    if value.fract() == 0.0 && value.abs() < MAX_EXACT_FLOAT_INT {
        return Some(Number::from(value as i64));
    }
    Number::from_f64(value)
}

fn float_pattern() -> &'static Regex {
    static FLOAT: OnceLock<Regex> = OnceLock::new();
    FLOAT.get_or_init(|| {
        Regex::new(r"^[-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?$")
            .expect("regex for YAML floats")
    })
}

fn key_to_string(key: Value) -> Result<String> {
    match key {
        Value::String(text) => Ok(text),
        Value::Null => Ok("null".to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Array(_) | Value::Object(_) => Err(malformed("mapping keys must be scalars")),
    }
}
