// src/adapter/config.rs
//! Adapter settings schema and values
//!
//! Adapters describe their settings with a [`ConfigSchema`]. Fields marked
//! `aeris_managed` are stored in Aeris's own config file and handed to the
//! adapter at startup; the rest belong to the backend and go through
//! `Adapter::set_config`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigValue {
    String(String),
    Bool(bool),
    Integer(i64),
    StringList(Vec<String>),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(s) => write!(f, "{}", s),
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Integer(i) => write!(f, "{}", i),
            ConfigValue::StringList(items) => write!(f, "{}", items.join(":")),
        }
    }
}

impl ConfigValue {
    /// Parse user input for a field of the given type
    pub fn parse_for(field_type: &ConfigFieldType, input: &str) -> Result<ConfigValue> {
        let input = input.trim();
        match field_type {
            ConfigFieldType::Text | ConfigFieldType::ExecutablePath => {
                Ok(ConfigValue::String(input.to_string()))
            }
            ConfigFieldType::Toggle => match input.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(ConfigValue::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(ConfigValue::Bool(false)),
                _ => Err(Error::Config(format!("Expected a boolean, got '{}'", input))),
            },
            ConfigFieldType::Number => input
                .parse::<i64>()
                .map(ConfigValue::Integer)
                .map_err(|_| Error::Config(format!("Expected an integer, got '{}'", input))),
            ConfigFieldType::Select(options) => {
                if options.iter().any(|o| o == input) {
                    Ok(ConfigValue::String(input.to_string()))
                } else {
                    Err(Error::Config(format!(
                        "'{}' is not one of: {}",
                        input,
                        options.join(", ")
                    )))
                }
            }
            ConfigFieldType::PathList => Ok(ConfigValue::StringList(
                input
                    .split([':', ','])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ConfigFieldType {
    #[default]
    Text,
    Toggle,
    Number,
    Select(Vec<String>),
    PathList,
    ExecutablePath,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigField {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    pub field_type: ConfigFieldType,
    #[serde(default)]
    pub default: Option<ConfigValue>,
    #[serde(default)]
    pub section: Option<String>,
    /// Stored by Aeris rather than by the backend
    #[serde(default)]
    pub aeris_managed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub adapter_id: String,
    pub fields: Vec<ConfigField>,
}

impl ConfigSchema {
    pub fn field(&self, key: &str) -> Option<&ConfigField> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Configuration holding every field's default
    pub fn defaults(&self) -> AdapterConfig {
        let values = self
            .fields
            .iter()
            .filter_map(|f| f.default.clone().map(|v| (f.key.clone(), v)))
            .collect();
        AdapterConfig { values }
    }

    /// Validate a raw value against the named field
    pub fn parse_value(&self, key: &str, input: &str) -> Result<ConfigValue> {
        let field = self.field(key).ok_or_else(|| {
            Error::Config(format!(
                "Unknown setting '{}' for adapter '{}'",
                key, self.adapter_id
            ))
        })?;
        ConfigValue::parse_for(&field.field_type, input)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default)]
    pub values: HashMap<String, ConfigValue>,
}

impl AdapterConfig {
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(ConfigValue::as_bool).unwrap_or(default)
    }

    pub fn set(&mut self, key: impl Into<String>, value: ConfigValue) {
        self.values.insert(key.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ConfigSchema {
        ConfigSchema {
            adapter_id: "demo".to_string(),
            fields: vec![
                ConfigField {
                    key: "executable_path".to_string(),
                    label: "Binary path".to_string(),
                    field_type: ConfigFieldType::ExecutablePath,
                    aeris_managed: true,
                    ..Default::default()
                },
                ConfigField {
                    key: "parallel".to_string(),
                    label: "Parallel downloads".to_string(),
                    field_type: ConfigFieldType::Toggle,
                    default: Some(ConfigValue::Bool(true)),
                    ..Default::default()
                },
                ConfigField {
                    key: "channel".to_string(),
                    label: "Channel".to_string(),
                    field_type: ConfigFieldType::Select(vec![
                        "stable".to_string(),
                        "testing".to_string(),
                    ]),
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn test_parse_toggle() {
        let t = ConfigFieldType::Toggle;
        assert_eq!(ConfigValue::parse_for(&t, "yes").unwrap(), ConfigValue::Bool(true));
        assert_eq!(ConfigValue::parse_for(&t, "OFF").unwrap(), ConfigValue::Bool(false));
        assert!(ConfigValue::parse_for(&t, "maybe").is_err());
    }

    #[test]
    fn test_parse_number_and_paths() {
        assert_eq!(
            ConfigValue::parse_for(&ConfigFieldType::Number, " 8 ").unwrap(),
            ConfigValue::Integer(8)
        );
        assert!(ConfigValue::parse_for(&ConfigFieldType::Number, "eight").is_err());
        assert_eq!(
            ConfigValue::parse_for(&ConfigFieldType::PathList, "/a:/b, /c").unwrap(),
            ConfigValue::StringList(vec!["/a".into(), "/b".into(), "/c".into()])
        );
    }

    #[test]
    fn test_schema_parse_value() {
        let schema = schema();
        assert_eq!(
            schema.parse_value("channel", "testing").unwrap(),
            ConfigValue::String("testing".to_string())
        );
        assert!(schema.parse_value("channel", "nightly").is_err());
        assert!(matches!(
            schema.parse_value("missing", "x"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let defaults = schema().defaults();
        assert_eq!(defaults.values.len(), 1);
        assert!(defaults.bool_or("parallel", false));
        assert!(!defaults.bool_or("unknown", false));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ConfigValue::StringList(vec!["/a".into(), "/b".into()]).to_string(),
            "/a:/b"
        );
        assert_eq!(ConfigValue::Integer(4).to_string(), "4");
    }
}
