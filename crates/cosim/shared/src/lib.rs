//! Shared co-simulation types.
//!
//! This crate hosts everything client & host agree on:
//! - model: avatar, posture, instruction, event and constraint values
//! - access: the `MotionUnitAccess` / `SkeletonAccess` capability traits
//! - protocol: wire messages, envelopes and the length-prefixed frame codec
//! - service: registration records for the discovery registry
//! - config / profiling: TOML configuration and per-frame timing
//!
//! Keep this crate free of engine types; engine bindings convert at their edge.

pub mod access;
pub mod config;
pub mod error;
pub mod hand_pose;
pub mod model;
pub mod profiling;
pub mod protocol;
pub mod service;

pub use access::{MotionUnitAccess, SkeletonAccess};
pub use config::{ClientConfig, CoSimConfig, ConfigError, HostConfig, ProfilingConfig};
pub use error::{AccessError, AccessResult};
pub use profiling::TimeProfiler;
pub use service::{AddressParseError, ServiceAddress, ServiceDescription, SERVICE_LANGUAGE};

/// Convenience prelude for downstream crates.
pub mod prelude {
    pub use crate::access::{MotionUnitAccess, SkeletonAccess};
    pub use crate::error::{AccessError, AccessResult};
    pub use crate::model::*;
    pub use crate::service::{ServiceAddress, ServiceDescription};
}
