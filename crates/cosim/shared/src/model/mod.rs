//! Values exchanged between the co-simulation, its motion units and the scene.

pub mod avatar;
pub mod constraint;
pub mod math;
pub mod simulation;

pub use avatar::{AvatarDescription, AvatarPostureValues, JointDescription, JointType};
pub use constraint::{Constraint, GeometryConstraint, JointConstraint, PostureConstraint};
pub use math::{Quaternion, Transform, Vector3};
pub use simulation::{
    event_type, BoolResponse, Instruction, SimulationEvent, SimulationResult, SimulationState,
    MISSING_DIAGNOSTIC,
};
