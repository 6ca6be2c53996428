//! Drives a Kubernetes cluster from its current version to a target version
//! (or back down) by invoking provider-specific upgrade operations in a
//! safety-critical order, and verifies the observed cluster state against the
//! target with bounded polling.
//!
//! The actual version swap is delegated to an external upgrade mechanism; this
//! crate owns the sequencing, the upgrade/downgrade ordering asymmetry, and
//! the retry-tolerant verification protocol.

/// Constants, errors and the bounded-poll primitive.
pub mod common;

/// Cluster API access -- server version and node queries.
pub mod cluster;

/// Read-only inputs describing the provider and the desired end state.
pub mod config;

/// External command execution with an explicit environment overlay.
pub mod exec;

/// The ordered upgrade/downgrade operations.
pub mod orchestrator;

/// Provider-specific upgrade drivers.
pub mod provider;

/// Per-operation outcome reporting.
pub mod report;

/// Version and readiness verification.
pub mod verify;

pub use common::error::{Error, Result};
pub use orchestrator::UpgradeOrchestrator;
