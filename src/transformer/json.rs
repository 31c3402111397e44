//! JSON field rewriter.

use super::TransformError;
use crate::config::{FieldRule, TransformConfig, DATA_FIELD};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

/// Rewrites named fields anywhere inside a JSON document.
///
/// Rules are leaf substitutions: a matched key gets its replacement bound
/// verbatim, and neither the original value nor the replacement is walked.
/// Independently of the rules, a `"data"` key bound to `null` always becomes
/// `{}`, and that check runs before the rule lookup.
#[derive(Debug, Clone, Default)]
pub struct JsonTransformer {
    /// Replacement values keyed by field name
    rules: HashMap<String, JsonValue>,
}

impl JsonTransformer {
    /// Create a transformer from the rule table of a configuration.
    pub fn new(config: &TransformConfig) -> Self {
        Self::from_rules(&config.rules)
    }

    /// Create a transformer from a list of rules. The first rule for a name wins.
    pub fn from_rules(rules: &[FieldRule]) -> Self {
        let mut table = HashMap::with_capacity(rules.len());
        for rule in rules {
            table
                .entry(rule.name.clone())
                .or_insert_with(|| rule.replacement.clone());
        }
        Self { rules: table }
    }

    /// Number of distinct field names this transformer rewrites.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Return a rewritten copy of `value`. The input is never modified.
    pub fn transform(&self, value: &JsonValue) -> JsonValue {
        match value {
            JsonValue::Array(items) => {
                JsonValue::Array(items.iter().map(|item| self.transform(item)).collect())
            }
            JsonValue::Object(map) => JsonValue::Object(self.transform_object(map)),
            JsonValue::Null | JsonValue::Bool(_) | JsonValue::Number(_) | JsonValue::String(_) => {
                value.clone()
            }
        }
    }

    fn transform_object(&self, map: &Map<String, JsonValue>) -> Map<String, JsonValue> {
        let mut out = Map::with_capacity(map.len());
        for (key, value) in map {
            let rewritten = if key == DATA_FIELD && value.is_null() {
                JsonValue::Object(Map::new())
            } else if let Some(replacement) = self.rules.get(key) {
                replacement.clone()
            } else {
                self.transform(value)
            };
            out.insert(key.clone(), rewritten);
        }
        out
    }

    /// Parse `text`, rewrite it and serialize the result compactly.
    pub fn transform_text(&self, text: &str) -> Result<String, TransformError> {
        let json: JsonValue = serde_json::from_str(text)?;
        let transformed = self.transform(&json);
        Ok(serde_json::to_string(&transformed)?)
    }
}

/// Rewrite `value` with the rules of `config`.
pub fn transform(value: &JsonValue, config: &TransformConfig) -> JsonValue {
    JsonTransformer::new(config).transform(value)
}
