//! Service host for co-simulation services.
//!
//! A [`ServiceController`] binds a TCP listener and serves one [`Processor`] on a background
//! tokio runtime. Hosts publish themselves to a [`ServiceRegistry`] when a registry address
//! is configured.

pub mod controller;
pub mod motion_unit;
pub mod processor;
pub mod registry;
pub mod skeleton;

pub use controller::{HostError, ServiceController};
pub use motion_unit::{motion_unit_server, shared_motion_unit_server};
pub use processor::{MotionUnitProcessor, Processor, SkeletonAccessProcessor};
pub use registry::{registry_server, RegistryProcessor, ServiceRegistry};
pub use skeleton::{skeleton_access_server, SharedSkeleton, SkeletonStore};
