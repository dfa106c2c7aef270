//! warden-health: readiness polling and health observation.
//!
//! Two entry points share one liveness probe (`RETURN 1`):
//!
//! ```text
//! poll_until_ready()              HealthMonitor::check_once()
//!   ├── attempt 1..=max             ├── is_running?  no → DOWN
//!   │   ├── is_running?             ├── timed probe  ok → UP(latency)
//!   │   └── probe                   │                err → DOWN
//!   └── sleep(interval) between     ├── append HealthRecord
//!                                   └── UP only: collect + append metrics
//! ```
//!
//! Neither loops on its own beyond the bounded poll. Repeated monitoring
//! is left to an external scheduler (cron, a systemd timer).

pub mod error;
pub mod monitor;
pub mod readiness;

pub use error::{MonitorError, MonitorResult};
pub use monitor::{HealthMonitor, MonitorReport, timed_liveness};
pub use readiness::{
    AttemptOutcome, PollOutcome, ReadinessAttempt, ReadinessPolicy, ReadinessReport,
    poll_until_ready,
};
