//! Access log record parsing
//!
//! Each traffic line written by the load balancer is one JSON object:
//!
//! ```text
//! {"pool":"blue","release":"v1.2","status":200,"upstream_status":"200",
//!  "upstream_addr":"172.18.0.3:3000","request_time":"0.004"}
//! ```
//!
//! Anything that is not a JSON object (startup banners, blank lines) is
//! skipped without noise.

use serde_json::{Map, Value};

/// Pool identity used when the record carries none
pub const UNKNOWN_POOL: &str = "unknown";

/// One parsed access log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Pool that served the request ("blue", "green", or "unknown")
    pub pool: String,
    /// Release identifier of the serving pool
    pub release: String,
    /// Response status returned to the client
    pub status: u16,
    /// Status reported by the upstream(s), as logged
    pub upstream_status: String,
    /// Address of the upstream that handled the request
    pub upstream_address: String,
    /// Request duration, as logged
    pub request_time: String,
}

impl Observation {
    /// Whether the record names a concrete pool
    pub fn has_known_pool(&self) -> bool {
        is_known_pool(&self.pool)
    }
}

pub fn is_known_pool(pool: &str) -> bool {
    !pool.trim().is_empty() && pool != UNKNOWN_POOL
}

/// A record that decoded but carries an unusable field
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("status {0} is not a number")]
    NonNumericStatus(String),
    #[error("status {0} is outside the valid range")]
    StatusOutOfRange(String),
}

/// Parse one raw line.
///
/// Returns `Ok(None)` for lines that are not a JSON object and
/// `Err` for records whose status cannot be coerced to a number.
pub fn parse_line(line: &str) -> Result<Option<Observation>, RecordError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let fields = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(fields)) => fields,
        _ => return Ok(None),
    };

    let status = coerce_status(fields.get("status"))?;

    Ok(Some(Observation {
        pool: text_field(&fields, "pool").unwrap_or_else(|| UNKNOWN_POOL.to_string()),
        release: text_field(&fields, "release").unwrap_or_else(|| UNKNOWN_POOL.to_string()),
        status,
        upstream_status: text_field(&fields, "upstream_status").unwrap_or_default(),
        upstream_address: text_field(&fields, "upstream_addr").unwrap_or_default(),
        request_time: text_field(&fields, "request_time").unwrap_or_else(|| "0".to_string()),
    }))
}

/// Strings are taken as-is, numbers are rendered, null counts as missing.
fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn coerce_status(value: Option<&Value>) -> Result<u16, RecordError> {
    let number = match value {
        None | Some(Value::Null) => return Ok(0),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() => f.trunc() as i64,
                    _ => return Err(RecordError::NonNumericStatus(n.to_string())),
                }
            }
        }
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| RecordError::NonNumericStatus(s.clone()))?,
        Some(other) => return Err(RecordError::NonNumericStatus(other.to_string())),
    };

    u16::try_from(number).map_err(|_| RecordError::StatusOutOfRange(number.to_string()))
}
