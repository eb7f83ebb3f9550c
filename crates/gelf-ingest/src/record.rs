// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structured message records produced by the parser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field name holding the short message text.
pub const FIELD_MESSAGE: &str = "message";
/// Field name holding the message source (GELF `host`).
pub const FIELD_SOURCE: &str = "source";
/// Field name holding the message timestamp.
pub const FIELD_TIMESTAMP: &str = "timestamp";
/// Field name holding the long message text.
pub const FIELD_FULL_MESSAGE: &str = "full_message";

/// Names payload fields can never set.
pub const RESERVED_FIELDS: &[&str] = &[
    "_id",
    FIELD_MESSAGE,
    FIELD_SOURCE,
    FIELD_TIMESTAMP,
    FIELD_FULL_MESSAGE,
    "streams",
    "gl2_source_input",
    "gl2_source_node",
    "gl2_remote_ip",
    "gl2_remote_port",
];

/// Check whether a field name is reserved.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

/// Typed value of an additional field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value as a float. Integers beyond 2^53 in magnitude are
    /// rounded to the nearest representable value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(n) => Some(*n),
            Self::Integer(n) => Some(*n as f64),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

/// A parsed log message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Short human-readable text.
    pub message: String,
    /// Originating host.
    pub source: String,
    /// When the message was generated (or received, if the sender gave none).
    pub timestamp: DateTime<Utc>,
    /// Additional typed fields.
    pub fields: BTreeMap<String, FieldValue>,
}

impl MessageRecord {
    pub fn new(
        message: impl Into<String>,
        source: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            message: message.into(),
            source: source.into(),
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    /// Look up a field, including the built-in attributes.
    pub fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            FIELD_MESSAGE => Some(FieldValue::Text(self.message.clone())),
            FIELD_SOURCE => Some(FieldValue::Text(self.source.clone())),
            _ => self.fields.get(name).cloned(),
        }
    }

    /// Check whether a field is already set.
    pub fn has_field(&self, name: &str) -> bool {
        matches!(name, FIELD_MESSAGE | FIELD_SOURCE | FIELD_TIMESTAMP)
            || self.fields.contains_key(name)
    }

    /// Set a field, overwriting any previous value.
    ///
    /// Text values are trimmed; a value that is empty after trimming is not
    /// stored.
    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let value = match value.into() {
            FieldValue::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return;
                }
                if trimmed.len() == text.len() {
                    FieldValue::Text(text)
                } else {
                    FieldValue::Text(trimmed.to_string())
                }
            }
            other => other,
        };
        self.fields.insert(name.into(), value);
    }

    /// Short text and source are both set.
    pub fn is_complete(&self) -> bool {
        self.incomplete_reason().is_none()
    }

    /// Why the record is incomplete, if it is.
    pub fn incomplete_reason(&self) -> Option<&'static str> {
        if self.message.trim().is_empty() {
            Some("missing short message")
        } else if self.source.trim().is_empty() {
            Some("missing source")
        } else {
            None
        }
    }
}
