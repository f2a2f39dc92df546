//! Points and InfluxDB line protocol
//!
//! ```text
//! logging,logger=app,level=INFO message="test2." 1767225600000000
//! ```
//!
//! Timestamps are written with microsecond precision.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

/// One time-stamped measurement: tags, fields and a timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
    timestamp: DateTime<Utc>,
}

impl Point {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Set a tag, replacing an earlier value for the same key
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.tags.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.tags.push((key, value)),
        }
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn field_value(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Encode as one line of line protocol
    ///
    /// Tags with empty values are dropped; a point needs at least one field.
    pub fn to_line(&self) -> Result<String> {
        if self.measurement.is_empty() {
            return Err(Error::Validation("point has no measurement".to_string()));
        }
        if self.fields.is_empty() {
            return Err(Error::Validation(format!(
                "point for measurement '{}' has no fields",
                self.measurement
            )));
        }

        let mut line = escape(&self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            if key.is_empty() || value.is_empty() {
                continue;
            }
            line.push(',');
            line.push_str(&escape(key, KEY_SPECIALS));
            line.push('=');
            line.push_str(&escape(value, KEY_SPECIALS));
        }

        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", escape(key, KEY_SPECIALS), encode_field(value)))
            .collect();
        line.push(' ');
        line.push_str(&fields.join(","));

        line.push(' ');
        line.push_str(&self.timestamp.timestamp_micros().to_string());

        Ok(line)
    }
}

const KEY_SPECIALS: &[char] = &[',', '=', ' '];

fn escape(s: &str, specials: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c if specials.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

fn encode_field(value: &FieldValue) -> String {
    match value {
        FieldValue::String(s) => {
            let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{}\"", escaped)
        }
        FieldValue::Integer(i) => format!("{}i", i),
        FieldValue::Float(f) => f.to_string(),
        FieldValue::Boolean(b) => b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_767_225_600, 123_456_000).unwrap()
    }

    #[test]
    fn test_basic_line() {
        let line = Point::new("logging")
            .tag("logger", "app")
            .tag("level", "INFO")
            .field("message", "test2.")
            .timestamp(at_epoch())
            .to_line()
            .unwrap();
        assert_eq!(
            line,
            "logging,logger=app,level=INFO message=\"test2.\" 1767225600123456"
        );
    }

    #[test]
    fn test_escaping() {
        let line = Point::new("my logs,v2")
            .tag("file name", "a=b,c")
            .field("message", r#"say "hi" \o/"#)
            .timestamp(at_epoch())
            .to_line()
            .unwrap();
        assert_eq!(
            line,
            r#"my\ logs\,v2,file\ name=a\=b\,c message="say \"hi\" \\o/" 1767225600123456"#
        );
    }

    #[test]
    fn test_trailing_backslash_does_not_escape_separator() {
        let line = Point::new("logging")
            .tag("dir", "C:\\")
            .tag("level", "INFO")
            .field("message", "x")
            .timestamp(at_epoch())
            .to_line()
            .unwrap();
        assert!(!line.contains("C:\\,"));
        assert_eq!(
            line,
            r#"logging,dir=C:\\,level=INFO message="x" 1767225600123456"#
        );

        let line = Point::new(r"a\b")
            .tag(r"k\", "v")
            .field(r"f\", 1i64)
            .timestamp(at_epoch())
            .to_line()
            .unwrap();
        assert_eq!(line, r"a\\b,k\\=v f\\=1i 1767225600123456");
    }

    #[test]
    fn test_field_types() {
        let line = Point::new("m")
            .field("i", 42i64)
            .field("f", 1.5f64)
            .field("b", true)
            .timestamp(at_epoch())
            .to_line()
            .unwrap();
        assert_eq!(line, "m i=42i,f=1.5,b=true 1767225600123456");
    }

    #[test]
    fn test_empty_tags_are_dropped_and_tags_replace() {
        let point = Point::new("m")
            .tag("shard_id", "")
            .tag("bot", "a")
            .tag("bot", "b")
            .field("message", "x")
            .timestamp(at_epoch());
        assert_eq!(point.tag_value("bot"), Some("b"));
        assert_eq!(point.to_line().unwrap(), "m,bot=b message=\"x\" 1767225600123456");
    }

    #[test]
    fn test_point_without_fields_is_rejected() {
        assert!(Point::new("m").tag("a", "b").to_line().is_err());
        assert!(Point::new("").field("a", 1i64).to_line().is_err());
    }
}
