//! The site configuration document: an ordered mapping of named sections
//! to opaque YAML values.
//!
//! The store is deliberately schema-agnostic — section shape validation
//! belongs to callers. The one structural rule enforced here is that
//! mapping keys are always plain text, so the on-disk serialization stays
//! stable and readable by foreign tools. YAML permits non-string keys
//! (`true:`, `2024:`); [`Document::normalize_keys`] rewrites them before
//! every serialization.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Errors produced by the document codec.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The content is not valid YAML, or not a mapping at the top level.
    #[error("failed to parse document: {0}")]
    Parse(String),

    /// The document could not be serialized.
    #[error("failed to serialize document: {0}")]
    Serialize(String),
}

/// The full structured site configuration.
///
/// Top-level keys are section names (`theme`, `hero`, ...); each section's
/// value is opaque structured data that is replaced wholesale on write.
/// Equality is structural, which is what every dirtiness computation in
/// this crate relies on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Mapping);

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a document from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Parse`] if the text is not valid YAML or
    /// the top level is not a mapping.
    pub fn from_yaml_str(content: &str) -> Result<Self, DocumentError> {
        let value: Value =
            serde_yaml::from_str(content).map_err(|err| DocumentError::Parse(err.to_string()))?;
        match value {
            Value::Mapping(mapping) => Ok(Self(mapping)),
            Value::Null => Ok(Self::default()),
            other => Err(DocumentError::Parse(format!(
                "expected a mapping at the top level, got {}",
                value_kind(&other)
            ))),
        }
    }

    /// Serializes the document to YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Serialize`] if serialization fails.
    pub fn to_yaml_string(&self) -> Result<String, DocumentError> {
        serde_yaml::to_string(&self.0).map_err(|err| DocumentError::Serialize(err.to_string()))
    }

    /// Returns the named section's value, if present.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Replaces the named section wholesale.
    pub fn set_section(&mut self, name: &str, value: Value) {
        self.0.insert(Value::String(name.to_string()), value);
    }

    /// Iterates over `(section name, value)` pairs in document order.
    ///
    /// Sections whose key is not a plain string (possible in a
    /// hand-edited file before normalization) are skipped.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0
            .iter()
            .filter_map(|(key, value)| key.as_str().map(|name| (name, value)))
    }

    /// Returns `true` if the document has no sections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Looks up a field by dot-separated path (`"theme.colors.accent"`).
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.section(first)?;
        for segment in segments {
            current = current.as_mapping()?.get(segment)?;
        }
        Some(current)
    }

    /// Sets a field by dot-separated path, creating intermediate mappings
    /// as needed. A non-mapping value encountered along the path is
    /// replaced by a mapping.
    pub fn set_path(&mut self, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('.').collect();
        let Some((first, rest)) = segments.split_first() else {
            return;
        };
        if rest.is_empty() {
            self.set_section(first, value);
            return;
        }
        let root = self
            .0
            .entry(Value::String((*first).to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        set_path_in(root, rest, value);
    }

    /// Rewrites every mapping key in the document to its plain-text form.
    ///
    /// Runs before every serialization in the store so that boolean,
    /// numeric, or otherwise typed keys never reach the on-disk form.
    pub fn normalize_keys(&mut self) {
        let mapping = std::mem::take(&mut self.0);
        self.0 = normalize_mapping(mapping);
    }
}

fn set_path_in(target: &mut Value, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if !matches!(target, Value::Mapping(_)) {
        *target = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(mapping) = target else {
        unreachable!("target coerced to mapping above");
    };
    if rest.is_empty() {
        mapping.insert(Value::String((*first).to_string()), value);
        return;
    }
    let next = mapping
        .entry(Value::String((*first).to_string()))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    set_path_in(next, rest, value);
}

fn normalize_mapping(mapping: Mapping) -> Mapping {
    let mut normalized = Mapping::with_capacity(mapping.len());
    for (key, value) in mapping {
        normalized.insert(Value::String(key_to_text(&key)), normalize_value(value));
    }
    normalized
}

fn normalize_value(value: Value) -> Value {
    match value {
        Value::Mapping(mapping) => Value::Mapping(normalize_mapping(mapping)),
        Value::Sequence(items) => {
            Value::Sequence(items.into_iter().map(normalize_value).collect())
        },
        Value::Tagged(mut tagged) => {
            tagged.value = normalize_value(tagged.value);
            Value::Tagged(tagged)
        },
        other => other,
    }
}

/// Renders a mapping key as plain text. String keys pass through; scalar
/// keys use their YAML scalar rendering; structured keys fall back to
/// their single-line YAML form.
fn key_to_text(key: &Value) -> String {
    match key {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|text| text.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
