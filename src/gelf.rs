use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// GELF payload version written into every message.
pub const GELF_VERSION: &str = "1.0";

/// Event name handed to the transport for every message.
pub const GELF_LOG_EVENT: &str = "gelf.log";

pub const DEFAULT_SHORT_MESSAGE: &str = "no_message";
pub const DEFAULT_FACILITY: &str = "gelf";

/// Keys that GELF reserves at the top level. Anything else is an
/// additional field and must start with `_`.
pub const RESERVED_KEYS: [&str; 10] = [
    "version",
    "host",
    "short_message",
    "full_message",
    "timestamp",
    "level",
    "facility",
    "line",
    "file",
    "id",
];

/// A flat GELF message: string keys mapped to scalar JSON values.
///
/// Keys are kept sorted so serialized output is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GelfMessage {
    fields: BTreeMap<String, Value>,
}

impl GelfMessage {
    /// Message pre-filled with `version`, `hostname`, `timestamp`,
    /// `short_message` and `facility`.
    pub fn with_defaults() -> Self {
        let mut message = GelfMessage::default();
        message.insert("version", GELF_VERSION);
        message.insert("hostname", local_hostname());
        message.insert("timestamp", now_epoch_seconds());
        message.insert("short_message", DEFAULT_SHORT_MESSAGE);
        message.insert("facility", DEFAULT_FACILITY);
        message
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Set an additional field; `name` is written with a leading `_`.
    pub fn insert_additional(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(format!("_{}", name), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Name of the local machine, resolved once per process.
pub fn local_hostname() -> &'static str {
    static HOSTNAME: OnceLock<String> = OnceLock::new();
    HOSTNAME.get_or_init(|| {
        hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string())
    })
}

/// Current wall-clock time as fractional seconds since the epoch.
pub fn now_epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Numeric levels used by leveled JSON loggers (higher is more severe).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoggerLevel {
    Trace = 10,
    Debug = 20,
    Info = 30,
    Warn = 40,
    Error = 50,
    Fatal = 60,
}

impl LoggerLevel {
    pub fn from_number(level: f64) -> Option<LoggerLevel> {
        match level {
            l if l == 10.0 => Some(LoggerLevel::Trace),
            l if l == 20.0 => Some(LoggerLevel::Debug),
            l if l == 30.0 => Some(LoggerLevel::Info),
            l if l == 40.0 => Some(LoggerLevel::Warn),
            l if l == 50.0 => Some(LoggerLevel::Error),
            l if l == 60.0 => Some(LoggerLevel::Fatal),
            _ => None,
        }
    }

    /// Parse a raw record value. Numeric strings are accepted as well as
    /// numbers, since producers are not consistent about it.
    pub fn from_value(value: &Value) -> Option<LoggerLevel> {
        match value {
            Value::Number(n) => n.as_f64().and_then(LoggerLevel::from_number),
            Value::String(s) => s.trim().parse::<f64>().ok().and_then(LoggerLevel::from_number),
            _ => None,
        }
    }

    pub fn as_number(self) -> u8 {
        self as u8
    }

    /// GELF (syslog) severity for this level.
    pub fn to_syslog(self) -> SyslogSeverity {
        match self {
            LoggerLevel::Trace | LoggerLevel::Debug => SyslogSeverity::Debug,
            LoggerLevel::Info => SyslogSeverity::Informational,
            LoggerLevel::Warn => SyslogSeverity::Notice,
            LoggerLevel::Error => SyslogSeverity::Error,
            LoggerLevel::Fatal => SyslogSeverity::Alert,
        }
    }
}

/// Syslog severities as carried in the GELF `level` field (lower is more
/// severe).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SyslogSeverity {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Informational = 6,
    Debug = 7,
}

impl SyslogSeverity {
    pub fn as_number(self) -> u8 {
        self as u8
    }
}

/// Map a raw `level` value onto a GELF severity. Unknown values are
/// reported as informational.
pub fn syslog_severity(level: &Value) -> SyslogSeverity {
    LoggerLevel::from_value(level)
        .map(LoggerLevel::to_syslog)
        .unwrap_or(SyslogSeverity::Informational)
}
