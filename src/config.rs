//! # Facet Request Configuration
//!
//! Parses and validates a decimal histogram request. A request arrives as a
//! JSON object using the established facet field names and is turned into a
//! typed [`FacetConfig`] before any document is collected, so an invalid
//! request never reaches a partition.
//!
//! ## Accepted Fields
//!
//! | Field                          | Default | Meaning                              |
//! |--------------------------------|---------|--------------------------------------|
//! | `field`                        |         | numeric field, both bucket and weight|
//! | `key_field` / `keyField`       |         | field that selects the bucket        |
//! | `value_field` / `valueField`   |         | field whose value is accumulated     |
//! | `key_script` / `keyScript`     |         | expression that selects the bucket   |
//! | `value_script` / `valueScript` |         | expression whose value is accumulated|
//! | `lang`, `params`               |         | script language and parameters       |
//! | `interval`                     | `0.0`   | bucket width in interval mode        |
//! | `offset`                       | `0.0`   | value shift in interval mode         |
//! | `nbin`                         | `0`     | non-zero selects fixed-range mode    |
//! | `xmin`, `xmax`                 | `1, -1` | fixed-range bounds                   |
//! | `order` / `comparator`         | `key`   | presentation order                   |
//!
//! ## Source Selection
//!
//! A complete key/value script pair wins over fields. Otherwise `key_field`
//! (or `field`) names the bucket field, and `value_field`, if present, names
//! a separate weight field.

use crate::binning::BinningMode;
use crate::error::{HistogramError, Result};
use crate::order::OrderPolicy;
use crate::source::Script;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// Raw facet request as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacetRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(alias = "keyField", skip_serializing_if = "Option::is_none")]
    pub key_field: Option<String>,
    #[serde(alias = "valueField", skip_serializing_if = "Option::is_none")]
    pub value_field: Option<String>,
    #[serde(alias = "keyScript", skip_serializing_if = "Option::is_none")]
    pub key_script: Option<String>,
    #[serde(alias = "valueScript", skip_serializing_if = "Option::is_none")]
    pub value_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
    pub interval: f64,
    pub offset: f64,
    pub nbin: i32,
    pub xmin: f64,
    pub xmax: f64,
    #[serde(alias = "comparator")]
    pub order: String,
}

impl Default for FacetRequest {
    fn default() -> Self {
        Self {
            field: None,
            key_field: None,
            value_field: None,
            key_script: None,
            value_script: None,
            lang: None,
            params: Map::new(),
            interval: 0.0,
            offset: 0.0,
            nbin: 0,
            xmin: 1.0,
            xmax: -1.0,
            order: OrderPolicy::Key.to_string(),
        }
    }
}

impl FacetRequest {
    /// Parse a request from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| HistogramError::config(format!("malformed facet request: {}", e)))
    }

    /// Validate the request and resolve it into a typed configuration.
    pub fn validate(&self) -> Result<FacetConfig> {
        let source = self.value_source()?;
        let binning = if self.nbin != 0 {
            BinningMode::fixed_range(self.nbin, self.xmin, self.xmax)?
        } else {
            BinningMode::interval(self.interval, self.offset)?
        };
        let order: OrderPolicy = self.order.parse()?;

        let config = FacetConfig {
            binning,
            source,
            order,
        };
        debug!("Validated facet request: {}", config);
        Ok(config)
    }

    fn value_source(&self) -> Result<ValueSource> {
        match (&self.key_script, &self.value_script) {
            (Some(key), Some(value)) => {
                return Ok(ValueSource::Script {
                    key: self.script(key),
                    value: self.script(value),
                })
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(HistogramError::config(
                    "[key_script] and [value_script] must be provided together",
                ))
            }
            (None, None) => {}
        }

        let key_field = self
            .key_field
            .as_ref()
            .or(self.field.as_ref())
            .ok_or_else(|| HistogramError::config("[field] is required for decimal histogram facet"))?;

        Ok(match &self.value_field {
            Some(value_field) => ValueSource::KeyValueFields {
                key_field: key_field.clone(),
                value_field: value_field.clone(),
            },
            None => ValueSource::Field(key_field.clone()),
        })
    }

    fn script(&self, source: &str) -> Script {
        Script {
            source: source.to_string(),
            lang: self.lang.clone(),
            params: self.params.clone(),
        }
    }
}

/// Where each document's bucket value and weight come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSource {
    /// One field is both bucket value and weight.
    Field(String),
    /// One field selects the bucket, another is accumulated.
    KeyValueFields {
        key_field: String,
        value_field: String,
    },
    /// Two expressions, bound per partition by an expression engine.
    Script { key: Script, value: Script },
}

impl ValueSource {
    /// Field names that must be mapped in the searched partitions.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ValueSource::Field(field) => vec![field.as_str()],
            ValueSource::KeyValueFields {
                key_field,
                value_field,
            } => vec![key_field.as_str(), value_field.as_str()],
            ValueSource::Script { .. } => Vec::new(),
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, ValueSource::Script { .. })
    }
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Field(field) => write!(f, "field [{}]", field),
            ValueSource::KeyValueFields {
                key_field,
                value_field,
            } => write!(f, "key field [{}], value field [{}]", key_field, value_field),
            ValueSource::Script { key, value } => write!(
                f,
                "key script [{}], value script [{}] ({})",
                key.source,
                value.source,
                key.lang.as_deref().unwrap_or("default")
            ),
        }
    }
}

/// A validated facet request.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetConfig {
    pub binning: BinningMode,
    pub source: ValueSource,
    pub order: OrderPolicy,
}

impl fmt::Display for FacetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} over {}, order {}", self.binning, self.source, self.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_error(json: &str) -> String {
        match FacetRequest::from_json(json).and_then(|r| r.validate()) {
            Err(HistogramError::Config(msg)) => msg,
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let request = FacetRequest::from_json("{}").unwrap();
        assert_eq!(request, FacetRequest::default());
        assert_eq!(request.xmin, 1.0);
        assert_eq!(request.xmax, -1.0);
        assert_eq!(request.order, "key");
    }

    #[test]
    fn test_interval_field_request() {
        let config = FacetRequest::from_json(r#"{"field": "price", "interval": 0.5, "offset": 0.25}"#)
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(config.binning, BinningMode::interval(0.5, 0.25).unwrap());
        assert_eq!(config.source, ValueSource::Field("price".into()));
        assert_eq!(config.order, OrderPolicy::Key);
    }

    #[test]
    fn test_fixed_range_request_with_legacy_names() {
        let config = FacetRequest::from_json(
            r#"{"keyField": "age", "valueField": "score", "nbin": 4, "xmin": 0, "xmax": 100, "comparator": "reverseCount"}"#,
        )
        .unwrap()
        .validate()
        .unwrap();
        assert_eq!(config.binning, BinningMode::fixed_range(4, 0.0, 100.0).unwrap());
        assert_eq!(
            config.source,
            ValueSource::KeyValueFields {
                key_field: "age".into(),
                value_field: "score".into()
            }
        );
        assert_eq!(config.source.fields(), vec!["age", "score"]);
        assert_eq!(config.order, OrderPolicy::ReverseCount);
    }

    #[test]
    fn test_key_field_overrides_field() {
        let config = FacetRequest::from_json(r#"{"field": "a", "key_field": "b", "interval": 1}"#)
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(config.source, ValueSource::Field("b".into()));
    }

    #[test]
    fn test_script_request() {
        let config = FacetRequest::from_json(
            r#"{"key_script": "doc.x", "value_script": "doc.y * factor", "lang": "expr", "params": {"factor": 2}, "interval": 1, "field": "ignored"}"#,
        )
        .unwrap()
        .validate()
        .unwrap();
        match config.source {
            ValueSource::Script { key, value } => {
                assert_eq!(key.source, "doc.x");
                assert_eq!(value.lang.as_deref(), Some("expr"));
                assert_eq!(value.params["factor"], 2);
            }
            other => panic!("expected script source, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(
            config_error(r#"{"interval": 1}"#),
            "[field] is required for decimal histogram facet"
        );
        assert!(config_error(r#"{"field": "x"}"#).starts_with("[interval] must be greater than 0.0"));
        assert!(config_error(r#"{"field": "x", "interval": -2}"#).contains("[interval]"));
        assert!(config_error(r#"{"field": "x", "nbin": 3}"#).contains("[xmax]"));
        assert!(config_error(r#"{"field": "x", "nbin": -1, "xmin": 0, "xmax": 1}"#).contains("[nbin]"));
        assert!(config_error(r#"{"key_script": "doc.x", "interval": 1}"#).contains("[value_script]"));
        assert_eq!(
            config_error(r#"{"field": "x", "interval": 1, "order": "random"}"#),
            "no order policy found for [random]"
        );
        assert!(config_error(r#"{"field": 7}"#).starts_with("malformed facet request"));
    }
}
