//! warden-journal: append-only health and metrics logs.
//!
//! All state that survives between invocations lives here: two
//! comma-delimited files per instance, `{name}-health.log` and
//! `{name}-metrics.log`, each with a fixed header written once when the
//! file is created.
//!
//! # Write discipline
//!
//! Records are never read back for modification. Each append is a single
//! `write_all` of one complete line to a file opened in append mode, so
//! overlapping invocations can at worst interleave whole lines. The header
//! is written only by the writer that wins `create_new`.

pub mod error;
pub mod journal;
pub mod records;

pub use error::{JournalError, JournalResult};
pub use journal::{HEALTH_HEADER, Journal, METRICS_HEADER};
pub use records::{Field, HealthRecord, HealthStatus, MetricsRecord, NOT_AVAILABLE, Timestamp};
