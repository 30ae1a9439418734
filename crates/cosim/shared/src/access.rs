//! Capability contracts served by motion units and skeleton accessors.
//!
//! Both traits are implemented by in-process types and by the RPC proxies in
//! `cosim_client`, so callers cannot tell a local unit from a remote one.

use std::collections::HashMap;

use crate::{
    error::AccessResult,
    model::{
        AvatarDescription, AvatarPostureValues, BoolResponse, Instruction, JointType, Quaternion,
        SimulationResult, SimulationState, Vector3,
    },
};

/// One simulation unit producing posture updates for an avatar.
pub trait MotionUnitAccess: Send {
    fn initialize(
        &mut self,
        description: &AvatarDescription,
        properties: &HashMap<String, String>,
    ) -> AccessResult<BoolResponse>;

    fn assign_instruction(
        &mut self,
        instruction: &Instruction,
        state: &SimulationState,
    ) -> AccessResult<BoolResponse>;

    /// Cancels an assigned instruction. Unknown ids are the unit's policy, not an error.
    fn abort(&mut self, instruction_id: &str) -> AccessResult<BoolResponse>;

    fn do_step(&mut self, time: f64, state: &SimulationState) -> AccessResult<SimulationResult>;

    /// Opaque snapshot of the unit's internal state.
    fn create_checkpoint(&mut self) -> AccessResult<Vec<u8>>;

    fn restore_checkpoint(&mut self, data: &[u8]) -> AccessResult<BoolResponse>;

    /// Untyped extension call for unit-specific functionality.
    fn execute_function(
        &mut self,
        name: &str,
        parameters: &HashMap<String, String>,
    ) -> AccessResult<HashMap<String, String>>;
}

impl<T: MotionUnitAccess + ?Sized> MotionUnitAccess for Box<T> {
    fn initialize(
        &mut self,
        description: &AvatarDescription,
        properties: &HashMap<String, String>,
    ) -> AccessResult<BoolResponse> {
        (**self).initialize(description, properties)
    }

    fn assign_instruction(
        &mut self,
        instruction: &Instruction,
        state: &SimulationState,
    ) -> AccessResult<BoolResponse> {
        (**self).assign_instruction(instruction, state)
    }

    fn abort(&mut self, instruction_id: &str) -> AccessResult<BoolResponse> {
        (**self).abort(instruction_id)
    }

    fn do_step(&mut self, time: f64, state: &SimulationState) -> AccessResult<SimulationResult> {
        (**self).do_step(time, state)
    }

    fn create_checkpoint(&mut self) -> AccessResult<Vec<u8>> {
        (**self).create_checkpoint()
    }

    fn restore_checkpoint(&mut self, data: &[u8]) -> AccessResult<BoolResponse> {
        (**self).restore_checkpoint(data)
    }

    fn execute_function(
        &mut self,
        name: &str,
        parameters: &HashMap<String, String>,
    ) -> AccessResult<HashMap<String, String>> {
        (**self).execute_function(name, parameters)
    }
}

/// Scene-side access to avatar skeletons.
///
/// Reads return `None` for unknown avatars or joints.
pub trait SkeletonAccess: Send {
    fn initialize_anthropometry(&mut self, description: &AvatarDescription) -> AccessResult<()>;

    fn avatar_description(&mut self, avatar_id: &str) -> AccessResult<Option<AvatarDescription>>;

    fn set_channel_data(&mut self, values: &AvatarPostureValues) -> AccessResult<()>;

    fn current_posture_values(
        &mut self,
        avatar_id: &str,
    ) -> AccessResult<Option<AvatarPostureValues>>;

    fn joint_position(&mut self, avatar_id: &str, joint: JointType)
        -> AccessResult<Option<Vector3>>;

    fn joint_rotation(
        &mut self,
        avatar_id: &str,
        joint: JointType,
    ) -> AccessResult<Option<Quaternion>>;

    fn root_position(&mut self, avatar_id: &str) -> AccessResult<Option<Vector3>>;

    fn root_rotation(&mut self, avatar_id: &str) -> AccessResult<Option<Quaternion>>;

    fn set_root_position(&mut self, avatar_id: &str, position: Vector3) -> AccessResult<()>;

    fn set_root_rotation(&mut self, avatar_id: &str, rotation: Quaternion) -> AccessResult<()>;
}
