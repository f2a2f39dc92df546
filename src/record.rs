//! Log records read back from InfluxDB

use crate::error::{Error, Result};
use crate::query::{FluxRow, MESSAGE_FIELD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag holding the record's level
pub const LEVEL_TAG: &str = "level";

/// A log record as stored: time, level, message and every other tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub time: DateTime<Utc>,
    pub level: String,
    pub message: String,
    /// All other tags (InfluxDB stores tag values as text)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl LogRecord {
    /// Map a decoded row
    ///
    /// `time` comes from `_time`, `level` from the `level` tag and
    /// `message` from `_value` when `_field` is `message`. Rows without a
    /// `_time` column cannot be mapped.
    pub fn from_row(row: FluxRow) -> Result<Self> {
        let time = row
            .time
            .ok_or_else(|| Error::Decode("row has no _time column".to_string()))?;

        let message = match (row.field.as_deref(), row.value) {
            (Some(MESSAGE_FIELD), Some(value)) => value,
            _ => String::new(),
        };

        let mut level = String::new();
        let mut extra = BTreeMap::new();
        for (key, value) in row.tags {
            if key == LEVEL_TAG {
                level = value;
            } else {
                extra.insert(key, value);
            }
        }

        Ok(Self {
            time,
            level,
            message,
            extra,
        })
    }

    /// Look up a value by name, including `time`, `level` and `message`
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "time" => Some(self.time.to_rfc3339()),
            LEVEL_TAG => Some(self.level.clone()),
            MESSAGE_FIELD => Some(self.message.clone()),
            _ => self.extra.get(key).cloned(),
        }
    }
}

impl TryFrom<FluxRow> for LogRecord {
    type Error = Error;

    fn try_from(row: FluxRow) -> Result<Self> {
        Self::from_row(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn row(field: &str, value: &str, tags: &[(&str, &str)]) -> FluxRow {
        FluxRow {
            time: Some(
                DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
            ),
            measurement: Some("logging".to_string()),
            field: Some(field.to_string()),
            value: Some(value.to_string()),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_row_mapping() {
        let record = LogRecord::from_row(row(
            "message",
            "test2.",
            &[("level", "INFO"), ("building", "b1"), ("logger", "app")],
        ))
        .unwrap();

        assert_eq!(record.level, "INFO");
        assert_eq!(record.message, "test2.");
        assert_eq!(record.extra.len(), 2);
        assert_eq!(record.get("building").as_deref(), Some("b1"));
        assert_eq!(record.get("message").as_deref(), Some("test2."));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn test_non_message_field_leaves_message_empty() {
        let record = LogRecord::from_row(row("count", "3", &[])).unwrap();
        assert_eq!(record.message, "");
        assert_eq!(record.level, "");
    }

    #[test]
    fn test_row_without_time() {
        let mut r = row("message", "x", &[]);
        r.time = None;
        assert_eq!(
            LogRecord::from_row(r).unwrap_err().kind(),
            ErrorKind::Transport
        );
    }

    #[test]
    fn test_serialize_omits_empty_extra() {
        let record = LogRecord::from_row(row("message", "hi", &[("level", "WARN")])).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["level"], "WARN");
        assert!(json.get("extra").is_none());
    }
}
