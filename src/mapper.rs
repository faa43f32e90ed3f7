//! Conversion of leveled-logger records into GELF messages.
//!
//! [`convert`] never fails. Each record field is handled on its own and a
//! field that cannot be converted leaves `__<field>Error` and
//! `__<field>ErrorJSON` behind instead of aborting the whole message.

use crate::error::FieldError;
use crate::flatten::flatten;
use crate::gelf::{syslog_severity, GelfMessage, GELF_VERSION};
use crate::record::{lookup, normalize_field_name, value_kind, LogRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Record keys with dedicated GELF handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KnownField {
    Version,
    Name,
    Hostname,
    Msg,
    Time,
    Id,
    Level,
    Src,
    Err,
    Custom,
}

impl KnownField {
    fn from_name(name: &str) -> Self {
        match name {
            "v" => KnownField::Version,
            "name" => KnownField::Name,
            "hostname" => KnownField::Hostname,
            "msg" => KnownField::Msg,
            "time" => KnownField::Time,
            "id" => KnownField::Id,
            "level" => KnownField::Level,
            "src" => KnownField::Src,
            "err" => KnownField::Err,
            _ => KnownField::Custom,
        }
    }
}

/// Convert a log record into a GELF message.
///
/// **Parameters**
/// - `record`: the record to convert; it is only read.
///
/// **Returns**
/// - A flat [`GelfMessage`] that always holds `version`, `hostname`,
///   `timestamp`, `short_message` and `facility`, plus whatever the record
///   contributes.
///
/// Field names are matched after stripping all leading underscores. When a
/// record carries both `foo` and `_foo`, the unprefixed key is used and the
/// alias is ignored.
pub fn convert(record: &LogRecord) -> GelfMessage {
    let mut message = GelfMessage::with_defaults();

    for (key, value) in record {
        let name = normalize_field_name(key);
        if name != key && record.contains_key(name) {
            continue;
        }

        if let Err(e) = apply_field(&mut message, record, name, value) {
            message.insert(format!("__{}Error", name), e.to_string());
            message.insert(
                format!("__{}ErrorJSON", name),
                serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string()),
            );
        }
    }

    message
}

fn apply_field(
    message: &mut GelfMessage,
    record: &LogRecord,
    name: &str,
    value: &Value,
) -> Result<(), FieldError> {
    match KnownField::from_name(name) {
        KnownField::Version => {
            message.insert("version", GELF_VERSION);
        }
        KnownField::Name => {
            message.insert("facility", scalar(name, value)?.clone());
        }
        KnownField::Hostname => {
            message.insert("host", scalar(name, value)?.clone());
        }
        KnownField::Msg => {
            let text = scalar(name, value)?;
            // `err.message` takes over short_message, whatever the key order
            if err_message(record).is_none() && !text.is_null() {
                message.insert("short_message", text_of(text));
            }
        }
        KnownField::Time => {
            let timestamp = value
                .as_str()
                .and_then(parse_time)
                .ok_or_else(|| FieldError::InvalidDate { value: text_of(value) })?;
            message.insert("timestamp", timestamp);
        }
        KnownField::Id => {
            message.insert("id", scalar(name, value)?.clone());
        }
        KnownField::Level => {
            add_custom_field(message, name, value);
            message.insert("level", syslog_severity(value).as_number());
        }
        KnownField::Src => {
            if let Value::Object(src) = value {
                let present = |key: &str| src.get(key).filter(|v| is_present_scalar(v)).cloned();
                if let Some(line) = present("line") {
                    message.insert("line", line);
                }
                if let Some(file) = present("file") {
                    message.insert("file", file);
                }
                if let Some(func) = present("func") {
                    message.insert_additional("func", func);
                }
            }
            add_custom_field(message, name, value);
        }
        KnownField::Err => {
            if let Value::Object(err) = value {
                let prefix = lookup(record, "msg")
                    .filter(|msg| is_truthy(msg))
                    .map(|msg| format!("{}\n", text_of(msg)))
                    .unwrap_or_default();
                if let Some(text) = err_message(record) {
                    message.insert("short_message", format!("{}{}", prefix, text_of(text)));
                }
                if let Some(stack) = err.get("stack").filter(|v| is_truthy(v)) {
                    message.insert("full_message", format!("{}{}", prefix, text_of(stack)));
                }
            }
            add_custom_field(message, name, value);
        }
        KnownField::Custom => add_custom_field(message, name, value),
    }
    Ok(())
}

/// Emit `value` as `_name`, flattening objects and arrays into
/// `_name.path.to.leaf` entries.
fn add_custom_field(message: &mut GelfMessage, name: &str, value: &Value) {
    match value {
        Value::Object(_) | Value::Array(_) => {
            for (key, leaf) in flatten(&format!("_{}", name), value) {
                message.insert(key, leaf);
            }
        }
        scalar => message.insert_additional(name, scalar.clone()),
    }
}

/// `err.message` when the record's `err` is an object carrying one.
fn err_message(record: &LogRecord) -> Option<&Value> {
    lookup(record, "err")
        .and_then(Value::as_object)
        .and_then(|err| err.get("message"))
        .filter(|v| is_truthy(v))
}

fn scalar<'a>(field: &str, value: &'a Value) -> Result<&'a Value, FieldError> {
    match value {
        Value::Object(_) | Value::Array(_) => Err(FieldError::NotScalar {
            field: field.to_string(),
            kind: value_kind(value),
        }),
        scalar => Ok(scalar),
    }
}

fn is_present_scalar(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Object(_) | Value::Array(_))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse a record timestamp into fractional epoch seconds.
///
/// RFC 3339 is what leveled loggers write; RFC 2822 and zone-less ISO
/// forms (read as UTC) are accepted too.
fn parse_time(text: &str) -> Option<f64> {
    let text = text.trim();
    let millis = DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_rfc2822(text))
        .map(|dt| dt.timestamp_millis())
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .or_else(|| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                })
                .map(|naive| Utc.from_utc_datetime(&naive).timestamp_millis())
        })?;
    Some(millis as f64 / 1000.0)
}
