//! Wire messages of the three hosted services.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    model::{
        AvatarDescription, AvatarPostureValues, BoolResponse, Instruction, JointType, Quaternion,
        SimulationResult, SimulationState, Vector3,
    },
    service::ServiceDescription,
};

/// Short name of a message, used in logs, timings and error reports.
pub trait Operation {
    fn operation(&self) -> &'static str;
}

/// Reply payload: either the typed response or a fault raised while serving it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Reply<T> {
    Ok(T),
    Fault(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MotionUnitRequest {
    Initialize {
        description: AvatarDescription,
        properties: HashMap<String, String>,
    },
    AssignInstruction {
        instruction: Instruction,
        state: SimulationState,
    },
    Abort {
        instruction_id: String,
    },
    DoStep {
        time: f64,
        state: SimulationState,
    },
    CreateCheckpoint,
    RestoreCheckpoint {
        data: Vec<u8>,
    },
    ExecuteFunction {
        name: String,
        parameters: HashMap<String, String>,
    },
}

impl Operation for MotionUnitRequest {
    fn operation(&self) -> &'static str {
        match self {
            MotionUnitRequest::Initialize { .. } => "initialize",
            MotionUnitRequest::AssignInstruction { .. } => "assign_instruction",
            MotionUnitRequest::Abort { .. } => "abort",
            MotionUnitRequest::DoStep { .. } => "do_step",
            MotionUnitRequest::CreateCheckpoint => "create_checkpoint",
            MotionUnitRequest::RestoreCheckpoint { .. } => "restore_checkpoint",
            MotionUnitRequest::ExecuteFunction { .. } => "execute_function",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MotionUnitResponse {
    Bool(BoolResponse),
    Step(SimulationResult),
    Checkpoint(Vec<u8>),
    Function(HashMap<String, String>),
}

impl Operation for MotionUnitResponse {
    fn operation(&self) -> &'static str {
        match self {
            MotionUnitResponse::Bool(_) => "bool",
            MotionUnitResponse::Step(_) => "step",
            MotionUnitResponse::Checkpoint(_) => "checkpoint",
            MotionUnitResponse::Function(_) => "function",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SkeletonRequest {
    InitializeAnthropometry(AvatarDescription),
    AvatarDescription { avatar_id: String },
    SetChannelData(AvatarPostureValues),
    CurrentPostureValues { avatar_id: String },
    JointPosition { avatar_id: String, joint: JointType },
    JointRotation { avatar_id: String, joint: JointType },
    RootPosition { avatar_id: String },
    RootRotation { avatar_id: String },
    SetRootPosition { avatar_id: String, position: Vector3 },
    SetRootRotation { avatar_id: String, rotation: Quaternion },
}

impl Operation for SkeletonRequest {
    fn operation(&self) -> &'static str {
        match self {
            SkeletonRequest::InitializeAnthropometry(_) => "initialize_anthropometry",
            SkeletonRequest::AvatarDescription { .. } => "avatar_description",
            SkeletonRequest::SetChannelData(_) => "set_channel_data",
            SkeletonRequest::CurrentPostureValues { .. } => "current_posture_values",
            SkeletonRequest::JointPosition { .. } => "joint_position",
            SkeletonRequest::JointRotation { .. } => "joint_rotation",
            SkeletonRequest::RootPosition { .. } => "root_position",
            SkeletonRequest::RootRotation { .. } => "root_rotation",
            SkeletonRequest::SetRootPosition { .. } => "set_root_position",
            SkeletonRequest::SetRootRotation { .. } => "set_root_rotation",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SkeletonResponse {
    Done,
    Description(Option<AvatarDescription>),
    Posture(Option<AvatarPostureValues>),
    Position(Option<Vector3>),
    Rotation(Option<Quaternion>),
}

impl Operation for SkeletonResponse {
    fn operation(&self) -> &'static str {
        match self {
            SkeletonResponse::Done => "done",
            SkeletonResponse::Description(_) => "description",
            SkeletonResponse::Posture(_) => "posture",
            SkeletonResponse::Position(_) => "position",
            SkeletonResponse::Rotation(_) => "rotation",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegistryRequest {
    Register(ServiceDescription),
    Unregister { service_id: String },
    List,
}

impl Operation for RegistryRequest {
    fn operation(&self) -> &'static str {
        match self {
            RegistryRequest::Register(_) => "register",
            RegistryRequest::Unregister { .. } => "unregister",
            RegistryRequest::List => "list",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegistryResponse {
    Bool(BoolResponse),
    Services(Vec<ServiceDescription>),
}

impl Operation for RegistryResponse {
    fn operation(&self) -> &'static str {
        match self {
            RegistryResponse::Bool(_) => "bool",
            RegistryResponse::Services(_) => "services",
        }
    }
}
