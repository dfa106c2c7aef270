//! Health and metrics record types and their line encoding.

use std::fmt;
use std::str::FromStr;

use chrono::{Local, TimeZone};

use warden_core::ResourceStats;

use crate::error::{JournalError, JournalResult};

/// Token written for a value that could not be sampled.
pub const NOT_AVAILABLE: &str = "N/A";

const HUMAN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Timestamp ──────────────────────────────────────────────────────

/// Wall-clock time in both human-readable and epoch-seconds form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    pub human: String,
    pub unix: i64,
}

impl Timestamp {
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            human: now.format(HUMAN_FORMAT).to_string(),
            unix: now.timestamp(),
        }
    }

    /// Build from epoch seconds, rendering in local time.
    pub fn from_unix(unix: i64) -> Self {
        let human = Local
            .timestamp_opt(unix, 0)
            .single()
            .map(|t| t.format(HUMAN_FORMAT).to_string())
            .unwrap_or_else(|| unix.to_string());
        Self { human, unix }
    }
}

// ── Field ──────────────────────────────────────────────────────────

/// A best-effort value: either sampled, or recorded as unavailable.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Available(T),
    Unavailable,
}

impl<T> Field<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Field::Available(_))
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Field::Available(v) => Some(v),
            Field::Unavailable => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Field::Available(v) => Field::Available(f(v)),
            Field::Unavailable => Field::Unavailable,
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Field::Unavailable, Field::Available)
    }
}

impl<T: fmt::Display> fmt::Display for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Available(v) => v.fmt(f),
            Field::Unavailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl<T: FromStr> Field<T> {
    fn parse(raw: &str) -> Result<Self, String> {
        if raw == NOT_AVAILABLE {
            return Ok(Field::Unavailable);
        }
        raw.parse::<T>()
            .map(Field::Available)
            .map_err(|_| format!("unparseable field {raw:?}"))
    }
}

/// Percentages are rendered with two decimals, without the `%` sign.
fn render_percent(field: &Field<f64>) -> String {
    match field {
        Field::Available(v) => format!("{v:.2}"),
        Field::Unavailable => NOT_AVAILABLE.to_string(),
    }
}

fn render<T: fmt::Display>(field: &Field<T>) -> String {
    match field {
        Field::Available(v) => sanitize(&v.to_string()),
        Field::Unavailable => NOT_AVAILABLE.to_string(),
    }
}

/// Keep one record per line with a fixed column count.
fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            ',' => ';',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect()
}

// ── Health ─────────────────────────────────────────────────────────

/// Observed liveness of the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Up,
    Down,
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Up => "UP",
            HealthStatus::Down => "DOWN",
            HealthStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(HealthStatus::Up),
            "DOWN" => Ok(HealthStatus::Down),
            "UNKNOWN" => Ok(HealthStatus::Unknown),
            other => Err(format!("unknown status {other:?}")),
        }
    }
}

/// One persisted liveness observation.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthRecord {
    pub timestamp: Timestamp,
    pub status: HealthStatus,
    /// Only set when `status` is `Up`.
    pub response_time_ms: Option<u64>,
    /// Only set when `status` is `Down`.
    pub error: Option<String>,
}

impl HealthRecord {
    pub fn up(timestamp: Timestamp, response_time_ms: u64) -> Self {
        Self {
            timestamp,
            status: HealthStatus::Up,
            response_time_ms: Some(response_time_ms),
            error: None,
        }
    }

    pub fn down(timestamp: Timestamp, error: impl Into<String>) -> Self {
        Self {
            timestamp,
            status: HealthStatus::Down,
            response_time_ms: None,
            error: Some(error.into()),
        }
    }

    pub fn unknown(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            status: HealthStatus::Unknown,
            response_time_ms: None,
            error: None,
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == HealthStatus::Up
    }

    /// `timestamp,timestamp_unix,status,response_time_ms,error`
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{}",
            sanitize(&self.timestamp.human),
            self.timestamp.unix,
            self.status,
            self.response_time_ms.unwrap_or(0),
            self.error.as_deref().map(sanitize).unwrap_or_default(),
        )
    }

    pub fn from_line(line: &str) -> JournalResult<Self> {
        let cols: Vec<&str> = line.trim_end_matches(['\n', '\r']).split(',').collect();
        if cols.len() != 5 {
            return Err(JournalError::parse(
                line,
                format!("expected 5 columns, found {}", cols.len()),
            ));
        }
        let unix = cols[1]
            .parse::<i64>()
            .map_err(|e| JournalError::parse(line, e.to_string()))?;
        let status = cols[2]
            .parse::<HealthStatus>()
            .map_err(|e| JournalError::parse(line, e))?;
        let response_time_ms = match status {
            HealthStatus::Up => Some(
                cols[3]
                    .parse::<u64>()
                    .map_err(|e| JournalError::parse(line, e.to_string()))?,
            ),
            _ => None,
        };
        let error = (!cols[4].is_empty()).then(|| cols[4].to_string());

        Ok(Self {
            timestamp: Timestamp {
                human: cols[0].to_string(),
                unix,
            },
            status,
            response_time_ms,
            error,
        })
    }
}

// ── Metrics ────────────────────────────────────────────────────────

/// One persisted resource and usage sample.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRecord {
    pub timestamp: Timestamp,
    pub cpu_percent: Field<f64>,
    pub memory_usage: Field<String>,
    pub memory_percent: Field<f64>,
    pub network_io: Field<String>,
    pub block_io: Field<String>,
    pub db_size: Field<String>,
    pub node_count: Field<u64>,
    pub relationship_count: Field<u64>,
}

impl MetricsRecord {
    /// Assemble a record. Resource stats degrade as a unit.
    pub fn new(
        timestamp: Timestamp,
        resources: Option<ResourceStats>,
        db_size: Field<String>,
        node_count: Field<u64>,
        relationship_count: Field<u64>,
    ) -> Self {
        let (cpu_percent, memory_usage, memory_percent, network_io, block_io) = match resources {
            Some(r) => (
                Field::Available(r.cpu_percent),
                Field::Available(r.memory_usage),
                Field::Available(r.memory_percent),
                Field::Available(r.network_io),
                Field::Available(r.block_io),
            ),
            None => (
                Field::Unavailable,
                Field::Unavailable,
                Field::Unavailable,
                Field::Unavailable,
                Field::Unavailable,
            ),
        };
        Self {
            timestamp,
            cpu_percent,
            memory_usage,
            memory_percent,
            network_io,
            block_io,
            db_size,
            node_count,
            relationship_count,
        }
    }

    pub fn to_line(&self) -> String {
        [
            sanitize(&self.timestamp.human),
            self.timestamp.unix.to_string(),
            render_percent(&self.cpu_percent),
            render(&self.memory_usage),
            render_percent(&self.memory_percent),
            render(&self.network_io),
            render(&self.block_io),
            render(&self.db_size),
            render(&self.node_count),
            render(&self.relationship_count),
        ]
        .join(",")
    }

    pub fn from_line(line: &str) -> JournalResult<Self> {
        let cols: Vec<&str> = line.trim_end_matches(['\n', '\r']).split(',').collect();
        if cols.len() != 10 {
            return Err(JournalError::parse(
                line,
                format!("expected 10 columns, found {}", cols.len()),
            ));
        }
        let unix = cols[1]
            .parse::<i64>()
            .map_err(|e| JournalError::parse(line, e.to_string()))?;
        let err = |reason: String| JournalError::parse(line, reason);

        Ok(Self {
            timestamp: Timestamp {
                human: cols[0].to_string(),
                unix,
            },
            cpu_percent: Field::parse(cols[2]).map_err(err)?,
            memory_usage: Field::parse(cols[3]).map_err(err)?,
            memory_percent: Field::parse(cols[4]).map_err(err)?,
            network_io: Field::parse(cols[5]).map_err(err)?,
            block_io: Field::parse(cols[6]).map_err(err)?,
            db_size: Field::parse(cols[7]).map_err(err)?,
            node_count: Field::parse(cols[8]).map_err(err)?,
            relationship_count: Field::parse(cols[9]).map_err(err)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> Timestamp {
        Timestamp {
            human: "2026-10-17 09:30:00".to_string(),
            unix: 1_792_229_400,
        }
    }

    #[test]
    fn up_record_survives_reparse() {
        let record = HealthRecord::up(ts(), 42);
        let line = record.to_line();
        assert_eq!(line, "2026-10-17 09:30:00,1792229400,UP,42,");

        let back = HealthRecord::from_line(&line).unwrap();
        assert_eq!(back.status, HealthStatus::Up);
        assert_eq!(back.response_time_ms, Some(42));
        assert_eq!(back.error, None);
        assert_eq!(back, record);
    }

    #[test]
    fn down_record_writes_zero_latency() {
        let record = HealthRecord::down(ts(), "instance not running");
        assert_eq!(
            record.to_line(),
            "2026-10-17 09:30:00,1792229400,DOWN,0,instance not running"
        );
        let back = HealthRecord::from_line(&record.to_line()).unwrap();
        assert_eq!(back.response_time_ms, None);
        assert_eq!(back.error.as_deref(), Some("instance not running"));
    }

    #[test]
    fn error_text_cannot_break_columns() {
        let record = HealthRecord::down(ts(), "refused, retry\nlater");
        let line = record.to_line();
        assert_eq!(line.split(',').count(), 5);
        assert!(!line.contains('\n'));
        let back = HealthRecord::from_line(&line).unwrap();
        assert_eq!(back.error.as_deref(), Some("refused; retry later"));
    }

    #[test]
    fn unavailable_metrics_render_as_na() {
        let record = MetricsRecord::new(
            ts(),
            None,
            Field::Unavailable,
            Field::Available(12),
            Field::Unavailable,
        );
        assert_eq!(
            record.to_line(),
            "2026-10-17 09:30:00,1792229400,N/A,N/A,N/A,N/A,N/A,N/A,12,N/A"
        );
    }

    #[test]
    fn metrics_record_reparses() {
        let record = MetricsRecord::new(
            ts(),
            Some(ResourceStats {
                cpu_percent: 3.5,
                memory_usage: "512MiB / 2GiB".to_string(),
                memory_percent: 25.0,
                network_io: "1.2kB / 648B".to_string(),
                block_io: "0B / 4.1MB".to_string(),
            }),
            Field::Available("517M".to_string()),
            Field::Available(1200),
            Field::Available(3400),
        );
        let line = record.to_line();
        assert!(line.contains(",3.50,512MiB / 2GiB,25.00,"));
        let back = MetricsRecord::from_line(&line).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn wrong_column_count_is_rejected() {
        assert!(HealthRecord::from_line("a,b,c").is_err());
        assert!(MetricsRecord::from_line("a,1,UP,0,").is_err());
    }

    #[test]
    fn field_from_option() {
        assert_eq!(Field::from(Some(3u64)), Field::Available(3));
        assert_eq!(Field::<u64>::from(None), Field::Unavailable);
        assert!(!Field::<u64>::Unavailable.is_available());
    }
}
