//! Configuration types for the response override layer.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;

/// Field name that receives the built-in `null -> {}` treatment.
pub const DATA_FIELD: &str = "data";

/// Main configuration: global settings plus the field rule table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Configuration version
    pub version: String,
    /// Global settings
    pub settings: Settings,
    /// Field rules (first rule wins for a given name)
    pub rules: Vec<FieldRule>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            settings: Settings::default(),
            rules: vec![],
        }
    }
}

impl TransformConfig {
    /// The in-source default rule table.
    ///
    /// Flips `success` to the string `"1"` and blanks `errorCode`, which is
    /// what the stock install ships with.
    pub fn builtin() -> Self {
        Self {
            rules: vec![
                FieldRule::new("success", JsonValue::String("1".to_string())),
                FieldRule::new("errorCode", JsonValue::String(String::new())),
            ],
            ..Self::default()
        }
    }

    /// Parse a YAML configuration and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON configuration and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the rule table and settings for configuration errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.name.as_str()) {
                return Err(ConfigError::DuplicateField(rule.name.clone()));
            }
            // The built-in rule turns `data: null` into `{}`; any other
            // replacement would then fire on the next pass.
            if rule.name == DATA_FIELD && !is_empty_object(&rule.replacement) {
                return Err(ConfigError::DataRuleBreaksIdempotence(
                    rule.replacement.clone(),
                ));
            }
        }

        if !(100..=599).contains(&self.settings.forced_status) {
            return Err(ConfigError::InvalidStatus(self.settings.forced_status));
        }

        if self.settings.rewrite_json && self.settings.json_content_types.is_empty() {
            return Err(ConfigError::NoJsonContentTypes);
        }

        Ok(())
    }

    /// Whether a content-type header value denotes a JSON body.
    pub fn is_json_content_type(&self, content_type: Option<&str>) -> bool {
        let Some(content_type) = content_type else {
            return false;
        };
        let content_type = content_type.to_ascii_lowercase();
        self.settings
            .json_content_types
            .iter()
            .any(|ct| content_type.contains(&ct.to_ascii_lowercase()))
    }
}

fn is_empty_object(value: &JsonValue) -> bool {
    value.as_object().is_some_and(|map| map.is_empty())
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Override the status and ok accessors
    pub force_status: bool,
    /// Status code reported while forcing
    pub forced_status: u16,
    /// Status phrase of rebuilt fetch replies
    pub forced_status_text: String,
    /// Rewrite JSON bodies with the rule table
    pub rewrite_json: bool,
    /// Content-type fragments that mark a body as JSON
    pub json_content_types: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            force_status: true,
            forced_status: 200,
            forced_status_text: "OK".to_string(),
            rewrite_json: true,
            json_content_types: vec!["application/json".to_string()],
        }
    }
}

/// A single field substitution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Object key to match, at any depth
    pub name: String,
    /// Value bound in place of the original (never recursed into)
    pub replacement: JsonValue,
}

impl FieldRule {
    pub fn new(name: impl Into<String>, replacement: JsonValue) -> Self {
        Self {
            name: name.into(),
            replacement,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("duplicate field rule: {0}")]
    DuplicateField(String),

    #[error("a rule for \"data\" may only replace with {{}}, got {0}")]
    DataRuleBreaksIdempotence(JsonValue),

    #[error("forced status {0} is not a valid HTTP status")]
    InvalidStatus(u16),

    #[error("json rewriting is enabled but no JSON content types are configured")]
    NoJsonContentTypes,

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}
