//! warden-metrics: on-demand resource and usage sampling.
//!
//! # Architecture
//!
//! ```text
//! MetricsCollector::collect()
//!   ├── backend.resource_stats()       → cpu / mem / net / block-io (as a unit)
//!   ├── backend.exec("du -sh <data>")  → db_size
//!   ├── probe.query(NODE_COUNT)        → node_count
//!   └── probe.query(RELATIONSHIP_COUNT)→ relationship_count
//! ```
//!
//! Each sample is taken exactly once per call. A failed sample degrades
//! only its own field(s) to `N/A`; the record is always produced unless
//! the backend itself cannot be executed.

pub mod collector;

pub use collector::{MetricsCollector, NODE_COUNT_QUERY, RELATIONSHIP_COUNT_QUERY};
