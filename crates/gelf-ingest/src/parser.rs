// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! GELF payload parser.
//!
//! Turns a complete (possibly compressed) GELF JSON payload into a
//! [`MessageRecord`]:
//!
//! - `short_message` and `host` become the record's message and source
//! - `timestamp` (seconds since epoch, fractional allowed) sets the record
//!   timestamp when positive, otherwise the current time is used
//! - `full_message`, `file`, `line`, `level` and `facility` are copied when
//!   present and valid
//! - every other field is copied with its leading `_` stripped, unless the
//!   name is reserved or already set

use crate::chunk::SourceRef;
use crate::error::IngestError;
use crate::payload::{self, DEFAULT_DECOMPRESS_SIZE_LIMIT};
use crate::record::{is_reserved, FieldValue, MessageRecord, FIELD_FULL_MESSAGE};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// Parser for GELF payloads.
#[derive(Debug, Clone)]
pub struct GelfParser {
    decompress_size_limit: usize,
}

impl Default for GelfParser {
    fn default() -> Self {
        Self::new(DEFAULT_DECOMPRESS_SIZE_LIMIT)
    }
}

impl GelfParser {
    /// Create a parser inflating compressed payloads up to `decompress_size_limit` bytes.
    pub fn new(decompress_size_limit: usize) -> Self {
        Self {
            decompress_size_limit,
        }
    }

    /// Parse a payload into a record.
    ///
    /// Fails with [`IngestError::MalformedPayload`] if the payload cannot be
    /// decompressed, is not a JSON object, or carries a non-text `host`,
    /// `short_message` or `message`. A record missing mandatory fields is
    /// still returned; see [`MessageRecord::is_complete`].
    pub fn parse(&self, payload: &[u8], source: &SourceRef) -> Result<MessageRecord, IngestError> {
        let json = payload::decompress(payload, self.decompress_size_limit)?;

        let node: Value = serde_json::from_slice(&json)
            .map_err(|e| IngestError::MalformedPayload(format!("invalid JSON: {}", e)))?;
        let Value::Object(node) = node else {
            return Err(IngestError::MalformedPayload(
                "payload is not a JSON object".to_string(),
            ));
        };

        check_required_types(&node)?;
        Ok(build_record(&node, source))
    }
}

/// Fields copied by dedicated rules, never through the generic loop.
const WELL_KNOWN_FIELDS: &[&str] = &["file", "line", "level", "facility"];

/// Reject mandatory fields that are present but not text.
fn check_required_types(node: &Map<String, Value>) -> Result<(), IngestError> {
    let invalid = |name: &str, value: &Value| {
        IngestError::MalformedPayload(format!("invalid \"{}\": {}", name, value))
    };

    if let Some(host) = node.get("host").filter(|v| !v.is_string()) {
        return Err(invalid("host", host));
    }

    match (node.get("short_message"), node.get("message")) {
        (Some(short), _) if !short.is_string() => Err(invalid("short_message", short)),
        (None, Some(message)) if !message.is_string() => Err(invalid("message", message)),
        _ => Ok(()),
    }
}

fn build_record(node: &Map<String, Value>, source: &SourceRef) -> MessageRecord {
    let timestamp = timestamp_value(node)
        .filter(|ts| *ts > 0.0)
        .map(datetime_from_secs)
        .unwrap_or_else(Utc::now);

    let short_message = text_value(node, "short_message")
        .filter(|s| !s.trim().is_empty())
        .or_else(|| text_value(node, "message"))
        .unwrap_or_default();
    let host = text_value(node, "host").unwrap_or_default();

    let mut record = MessageRecord::new(short_message, host, timestamp);

    if let Some(full) = string_value(node, "full_message").filter(|s| !s.is_empty()) {
        record.add_field(FIELD_FULL_MESSAGE, full);
    }

    if let Some(file) = string_value(node, "file").filter(|s| !s.is_empty()) {
        record.add_field("file", file);
    }

    let line = long_value(node, "line");
    if line > -1 {
        record.add_field("line", line);
    }

    // Level and facility are defaulted later in the pipeline when absent.
    let level = long_value(node, "level");
    if level > -1 {
        record.add_field("level", level);
    }

    if let Some(facility) = string_value(node, "facility").filter(|s| !s.is_empty()) {
        record.add_field("facility", facility);
    }

    record.add_field("gl2_source_input", source.input_id());
    if let Some(remote) = source.remote() {
        record.add_field("gl2_remote_ip", remote.ip().to_string());
        record.add_field("gl2_remote_port", i64::from(remote.port()));
    }

    for (name, value) in node {
        if name == "version" {
            continue;
        }

        let key = match name.strip_prefix('_') {
            Some(stripped) if !stripped.is_empty() => stripped,
            _ => name.as_str(),
        };

        if key == "short_message" || key == "host" || WELL_KNOWN_FIELDS.contains(&key) {
            continue;
        }

        if record.has_field(key) || is_reserved(key) {
            continue;
        }

        let field_value = match value {
            Value::Object(_) | Value::Array(_) => FieldValue::Text(value.to_string()),
            Value::Number(n) => match n.as_i64() {
                Some(i) if !n.is_f64() => FieldValue::Integer(i),
                _ => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Bool(b) => FieldValue::Text(b.to_string()),
            Value::Null => {
                tracing::debug!(field = %key, "Field is null, skipping");
                continue;
            }
        };

        record.add_field(key, field_value);
    }

    record
}

/// Text of a field; `None` unless it is a JSON string.
fn text_value<'a>(node: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    node.get(name).and_then(Value::as_str)
}

/// Text of a field; `None` if absent or null.
fn string_value(node: &Map<String, Value>, name: &str) -> Option<String> {
    match node.get(name)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(_) | Value::Array(_) => Some(String::new()),
    }
}

/// Integer value of a field; -1 if absent or not integral.
fn long_value(node: &Map<String, Value>, name: &str) -> i64 {
    match node.get(name) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(-1),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(-1),
        _ => -1,
    }
}

/// Timestamp in seconds; numeric strings are accepted.
fn timestamp_value(node: &Map<String, Value>) -> Option<f64> {
    match node.get("timestamp")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(ts) => Some(ts),
            Err(_) => {
                tracing::debug!(timestamp = %s, "Unable to parse timestamp");
                None
            }
        },
        _ => None,
    }
}

fn datetime_from_secs(secs: f64) -> DateTime<Utc> {
    let millis = (secs * 1000.0).round() as i64;
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use std::net::SocketAddr;

    fn parse(json: &str) -> MessageRecord {
        GelfParser::default()
            .parse(json.as_bytes(), &SourceRef::new("test-input"))
            .unwrap()
    }

    #[test]
    fn test_parse_basic_message() {
        let before = Utc::now();
        let record =
            parse(r#"{"short_message":"hi","host":"h1","_custom":"x","timestamp":0}"#);
        let after = Utc::now();

        assert_eq!(record.message, "hi");
        assert_eq!(record.source, "h1");
        assert_eq!(record.fields.get("custom"), Some(&FieldValue::from("x")));
        assert!(record.timestamp >= before && record.timestamp <= after);
        assert!(record.is_complete());
    }

    #[test]
    fn test_positive_timestamp() {
        let record = parse(r#"{"short_message":"hi","host":"h1","timestamp":1500646980.661}"#);
        assert_eq!(record.timestamp.timestamp_millis(), 1_500_646_980_661);

        let record = parse(r#"{"short_message":"hi","host":"h1","timestamp":"1500646980.661"}"#);
        assert_eq!(record.timestamp.timestamp_millis(), 1_500_646_980_661);
    }

    #[test]
    fn test_non_numeric_timestamp_defaults_to_now() {
        let before = Utc::now();
        let record = parse(r#"{"short_message":"hi","host":"h1","timestamp":"yesterday"}"#);
        assert!(record.timestamp >= before);
        assert!(!record.fields.contains_key("timestamp"));
    }

    #[test]
    fn test_underscore_prefix_rules() {
        let record = parse(r#"{"short_message":"hi","host":"h1","_":"kept","_a":"1","__b":"2"}"#);

        assert_eq!(record.fields.get("_"), Some(&FieldValue::from("kept")));
        assert_eq!(record.fields.get("a"), Some(&FieldValue::from("1")));
        // Only a single marker is stripped.
        assert_eq!(record.fields.get("_b"), Some(&FieldValue::from("2")));
    }

    #[test]
    fn test_value_coercion() {
        let record = parse(
            r#"{"short_message":"hi","host":"h1",
                "_int":9001,"_float":1.5,"_text":"t","_bool":true,
                "_obj":{"k":[1,2]},"_arr":[1,"a"],"_null":null}"#,
        );

        assert_eq!(record.fields.get("int"), Some(&FieldValue::Integer(9001)));
        assert_eq!(record.fields.get("float"), Some(&FieldValue::Float(1.5)));
        assert_eq!(record.fields.get("text"), Some(&FieldValue::from("t")));
        assert_eq!(record.fields.get("bool"), Some(&FieldValue::from("true")));
        assert_eq!(
            record.fields.get("obj"),
            Some(&FieldValue::from(r#"{"k":[1,2]}"#))
        );
        assert_eq!(record.fields.get("arr"), Some(&FieldValue::from(r#"[1,"a"]"#)));
        assert!(!record.fields.contains_key("null"));
    }

    #[test]
    fn test_well_known_fields() {
        let record = parse(
            r#"{"short_message":"hi","host":"h1","full_message":"long text",
                "file":"main.rs","line":42,"level":3,"facility":"kernel"}"#,
        );

        assert_eq!(record.fields.get("full_message"), Some(&FieldValue::from("long text")));
        assert_eq!(record.fields.get("file"), Some(&FieldValue::from("main.rs")));
        assert_eq!(record.fields.get("line"), Some(&FieldValue::Integer(42)));
        assert_eq!(record.fields.get("level"), Some(&FieldValue::Integer(3)));
        assert_eq!(record.fields.get("facility"), Some(&FieldValue::from("kernel")));
    }

    #[test]
    fn test_empty_file_and_negative_line_skipped() {
        let record = parse(r#"{"short_message":"hi","host":"h1","file":"","line":-1}"#);
        assert!(!record.fields.contains_key("file"));
        assert!(!record.fields.contains_key("line"));
    }

    #[test]
    fn test_reserved_and_duplicate_fields_skipped() {
        let record = parse(
            r#"{"short_message":"hi","host":"h1","version":"1.1",
                "_source":"spoofed","_message":"spoofed","_host":"spoofed",
                "_gl2_source_input":"spoofed","_line":7,"line":42}"#,
        );

        assert_eq!(record.source, "h1");
        assert_eq!(record.message, "hi");
        assert!(!record.fields.contains_key("version"));
        assert!(!record.fields.contains_key("host"));
        assert!(!record.fields.contains_key("short_message"));
        assert_eq!(
            record.fields.get("gl2_source_input"),
            Some(&FieldValue::from("test-input"))
        );
        assert_eq!(record.fields.get("line"), Some(&FieldValue::Integer(42)));
    }

    #[test]
    fn test_rejected_well_known_fields_not_copied_generically() {
        let record = parse(
            r#"{"short_message":"hi","host":"h1","file":"  ","line":-1,
                "level":-5,"facility":"","_note":"   "}"#,
        );

        for name in ["file", "line", "level", "facility", "note"] {
            assert!(!record.fields.contains_key(name), "{} should be skipped", name);
        }
    }

    #[test]
    fn test_generic_text_is_trimmed() {
        let record = parse(r#"{"short_message":"hi","host":"h1","_env":" prod "}"#);
        assert_eq!(record.fields.get("env"), Some(&FieldValue::from("prod")));
    }

    #[test]
    fn test_non_text_required_fields_are_malformed() {
        let parser = GelfParser::default();
        let source = SourceRef::new("test");

        for json in [
            r#"{"short_message":42,"host":"h1"}"#,
            r#"{"short_message":"hi","host":123}"#,
            r#"{"short_message":"hi","host":true}"#,
            r#"{"short_message":null,"host":"h1"}"#,
            r#"{"message":{"nested":1},"host":"h1"}"#,
        ] {
            assert!(
                matches!(
                    parser.parse(json.as_bytes(), &source),
                    Err(IngestError::MalformedPayload(_))
                ),
                "{} should be malformed",
                json
            );
        }
    }

    #[test]
    fn test_custom_version_field_allowed() {
        let record = parse(r#"{"short_message":"hi","host":"h1","version":"1.1","_version":"3.11"}"#);
        assert_eq!(record.fields.get("version"), Some(&FieldValue::from("3.11")));
    }

    #[test]
    fn test_message_field_fallback() {
        let record = parse(r#"{"message":"from message","host":"h1"}"#);
        assert_eq!(record.message, "from message");

        let record = parse(r#"{"short_message":" ","message":"from message","host":"h1"}"#);
        assert_eq!(record.message, "from message");
    }

    #[test]
    fn test_missing_fields_yield_incomplete_record() {
        let record = parse(r#"{"short_message":"hi"}"#);
        assert!(!record.is_complete());

        let record = parse(r#"{"host":"h1"}"#);
        assert!(!record.is_complete());
    }

    #[test]
    fn test_source_ref_fields() {
        let addr: SocketAddr = "192.168.1.7:40000".parse().unwrap();
        let source = SourceRef::new("udp-main").with_remote(addr);
        let record = GelfParser::default()
            .parse(br#"{"short_message":"hi","host":"h1"}"#, &source)
            .unwrap();

        assert_eq!(record.fields.get("gl2_source_input"), Some(&FieldValue::from("udp-main")));
        assert_eq!(record.fields.get("gl2_remote_ip"), Some(&FieldValue::from("192.168.1.7")));
        assert_eq!(record.fields.get("gl2_remote_port"), Some(&FieldValue::Integer(40000)));
    }

    #[test]
    fn test_gzip_payload() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(br#"{"short_message":"zipped","host":"h1"}"#).unwrap();
        let payload = enc.finish().unwrap();

        let record = GelfParser::default()
            .parse(&payload, &SourceRef::new("test"))
            .unwrap();
        assert_eq!(record.message, "zipped");
    }

    #[test]
    fn test_malformed_payloads() {
        let parser = GelfParser::default();
        let source = SourceRef::new("test");

        for payload in [
            &b"{not json"[..],
            &b"[1,2,3]"[..],
            &b"not even close"[..],
            &b"{\"short_message\":\"\xff\xfe\"}"[..],
            &b""[..],
        ] {
            assert!(
                matches!(
                    parser.parse(payload, &source),
                    Err(IngestError::MalformedPayload(_))
                ),
                "payload {:?} should be malformed",
                payload
            );
        }
    }

    #[test]
    fn test_decompress_limit_applies() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&vec![b' '; 2048]).unwrap();
        let payload = enc.finish().unwrap();

        let result = GelfParser::new(1024).parse(&payload, &SourceRef::new("test"));
        assert!(matches!(result, Err(IngestError::MalformedPayload(_))));
    }
}
