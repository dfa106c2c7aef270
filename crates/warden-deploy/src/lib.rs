//! warden-deploy: replace, wait for, and verify a single graph instance.
//!
//! # Phases
//!
//! ```text
//! Idle → TearingDown → StartingInstance → PollingReady → Verifying → Deployed
//!                              │                │             │
//!                              └────────────────┴─────────────┴──→ Failed
//! ```
//!
//! Every run starts with teardown, so invoking it twice leaves exactly one
//! fresh instance behind. A `Deployed` run yields a [`DeploymentSummary`];
//! a `Failed` run yields the failure reason and, when a journal is
//! attached, a DOWN health record carrying it.

pub mod checklist;
pub mod controller;
pub mod error;
pub mod summary;

pub use checklist::{CheckKind, Checklist, Severity, VerificationResult, run_checklist};
pub use controller::{DeployPhase, Deployer, DeploymentOutcome, Teardown, teardown};
pub use error::{DeployError, DeployResult};
pub use summary::DeploymentSummary;
