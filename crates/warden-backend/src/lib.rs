//! warden-backend: adapters for the two external collaborators.
//!
//! - **`backend`**: the [`WorkloadBackend`] trait: start, stop, remove,
//!   inspect, exec and resource stats for a named instance.
//! - **`docker`**: [`DockerBackend`], the Docker CLI implementation. Every
//!   call carries an explicit timeout.
//! - **`probe`**: the [`HealthProbe`] trait and [`CypherShellProbe`], which
//!   runs statements through `cypher-shell` inside the instance.
//! - **`mock`** (feature `mock`): in-memory backend and scripted probe.

pub mod backend;
pub mod docker;
pub mod error;
pub mod probe;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use backend::{ExecOutput, WorkloadBackend};
pub use docker::DockerBackend;
pub use error::{BackendError, BackendResult};
pub use probe::{CypherShellProbe, HealthProbe, LIVENESS_QUERY, ProbeError, QueryOutput};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockBackend, ScriptedProbe};
