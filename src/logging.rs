//! Structured logging for the insight client.
//!
//! One JSON object per line on stderr, so stdout stays free for CLI output.
//! Filtering is by level (`LOG_LEVEL`) and by domain (`LOG_DOMAINS`, a
//! comma-separated list or "all").

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Gateway, // Remote calls and decoding
    Store,   // History mutations
    Trend,   // Chart recomputation
    Session, // Task lifecycle, ordering guard
    System,  // Startup, shutdown
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Gateway => "gateway",
            Domain::Store => "store",
            Domain::Trend => "trend",
            Domain::Session => "session",
            Domain::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

fn sanitize_fields(mut fields: Map<String, Value>) -> Map<String, Value> {
    let redacted = Value::String("[REDACTED]".to_string());
    for key in ["authorization", "Authorization", "api_key"] {
        if fields.contains_key(key) {
            fields.insert(key.to_string(), redacted.clone());
        }
    }
    fields
}

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    let line = render(level, domain, event, fields);
    let stderr = std::io::stderr();
    let mut w = stderr.lock();
    let _ = writeln!(w, "{}", line);
}

fn render(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) -> String {
    let mut data = sanitize_fields(fields);
    let msg = data.remove("msg").unwrap_or(Value::String(String::new()));

    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    entry.insert("data".to_string(), Value::Object(data));
    Value::Object(entry).to_string()
}

// =============================================================================
// Domain helpers
// =============================================================================

pub fn log_request(method: &str, url: &str) {
    log(
        Level::Debug,
        Domain::Gateway,
        "request",
        obj(&[("method", v_str(method)), ("url", v_str(url))]),
    );
}

pub fn log_gateway_failure(op: &str, kind: &str, detail: &str) {
    log(
        Level::Warn,
        Domain::Gateway,
        "failure",
        obj(&[
            ("op", v_str(op)),
            ("kind", v_str(kind)),
            ("msg", v_str(detail)),
        ]),
    );
}

pub fn log_store_change(event: &str, revision: u64, history_len: usize) {
    log(
        Level::Info,
        Domain::Store,
        event,
        obj(&[
            ("revision", json!(revision)),
            ("history_len", json!(history_len)),
        ]),
    );
}

pub fn log_trend(points: usize, latest_pct: Option<f64>) {
    log(
        Level::Trace,
        Domain::Trend,
        "recompute",
        obj(&[
            ("points", json!(points)),
            ("latest_pct", latest_pct.map(v_num).unwrap_or(Value::Null)),
        ]),
    );
}

// =============================================================================
// Field helpers
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}
