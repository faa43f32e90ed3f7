use serde_json::{Map, Value};

/// A structured log record as produced by a leveled JSON logger.
///
/// There is no fixed schema; well-known keys (`v`, `name`, `hostname`,
/// `msg`, `time`, `id`, `level`, `src`, `err`) get special treatment when
/// converted to GELF and everything else becomes an additional field.
pub type LogRecord = Map<String, Value>;

/// Facility used for records synthesized from unusable input.
pub const INVALID_RECORD_NAME: &str = "gelf-log-sink";

/// Leveled-logger `warn`, the level given to synthesized records.
pub const INVALID_RECORD_LEVEL: u64 = 40;

/// Input that could not be used as a record as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidInput {
    /// The value exactly as it was written.
    pub raw: Value,
    /// Why it was rejected.
    pub reason: String,
}

impl InvalidInput {
    /// Diagnostic record carrying the rejected input, so it still reaches
    /// the log server instead of being dropped.
    pub fn into_record(self) -> LogRecord {
        let mut record = LogRecord::new();
        record.insert("name".to_string(), Value::from(INVALID_RECORD_NAME));
        record.insert("invalidRecord".to_string(), self.raw);
        record.insert("short_message".to_string(), Value::from(self.reason));
        record.insert("level".to_string(), Value::from(INVALID_RECORD_LEVEL));
        record
    }
}

/// Turn a written value into a record.
///
/// Objects are used directly. Strings are parsed as JSON-encoded records.
/// Anything else, including strings that do not hold a JSON object, is
/// rejected with an [`InvalidInput`].
pub fn parse_input(raw: Value) -> Result<LogRecord, InvalidInput> {
    match raw {
        Value::Object(record) => Ok(record),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(record)) => Ok(record),
            Ok(other) => Err(InvalidInput {
                reason: format!("invalid type {}", value_kind(&other)),
                raw: Value::String(text),
            }),
            Err(e) => Err(InvalidInput {
                reason: format!("invalid JSON record: {}", e),
                raw: Value::String(text),
            }),
        },
        other => Err(InvalidInput {
            reason: format!("invalid type {}", value_kind(&other)),
            raw: other,
        }),
    }
}

/// Strip every leading `_` from a field name.
///
/// `_foo`, `__foo` and `___foo` all become `foo`, so no caller key can land
/// on a `__`-prefixed diagnostic field.
pub fn normalize_field_name(name: &str) -> &str {
    name.trim_start_matches('_')
}

/// Find the value of the field that normalizes to `name`.
///
/// An exact key wins over its underscore-prefixed aliases.
pub fn lookup<'a>(record: &'a LogRecord, name: &str) -> Option<&'a Value> {
    record.get(name).or_else(|| {
        record
            .iter()
            .find(|(key, _)| normalize_field_name(key) == name)
            .map(|(_, value)| value)
    })
}

/// Short, human readable name for the JSON type of `value`.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
