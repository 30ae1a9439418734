//! Dispatch of decoded wire requests onto local implementations.

use std::sync::{Arc, Mutex, MutexGuard};

use cosim_shared::{
    protocol::{
        MotionUnitRequest, MotionUnitResponse, Operation, Reply, SkeletonRequest, SkeletonResponse,
    },
    AccessResult, MotionUnitAccess, SkeletonAccess,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

/// Turns one request into one reply. Runs on a blocking worker of the host runtime.
pub trait Processor: Send + Sync + 'static {
    type Request: DeserializeOwned + Operation + Send + 'static;
    type Response: Serialize + Send + Sync + 'static;

    fn process(&self, request: Self::Request) -> Reply<Self::Response>;
}

fn lock<T: ?Sized>(shared: &Mutex<T>) -> MutexGuard<'_, T> {
    match shared.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn into_reply<T>(operation: &'static str, result: AccessResult<T>) -> Reply<T> {
    match result {
        Ok(value) => Reply::Ok(value),
        Err(err) => {
            debug!(operation, error = %err, "request failed");
            Reply::Fault(err.to_string())
        }
    }
}

/// Serves a motion unit. The unit is shared so the hosting side can inspect it.
#[derive(Debug)]
pub struct MotionUnitProcessor<T> {
    unit: Arc<Mutex<T>>,
}

impl<T: MotionUnitAccess> MotionUnitProcessor<T> {
    pub fn new(unit: T) -> Self {
        Self::shared(Arc::new(Mutex::new(unit)))
    }

    pub fn shared(unit: Arc<Mutex<T>>) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> &Arc<Mutex<T>> {
        &self.unit
    }
}

impl<T: MotionUnitAccess + 'static> Processor for MotionUnitProcessor<T> {
    type Request = MotionUnitRequest;
    type Response = MotionUnitResponse;

    fn process(&self, request: MotionUnitRequest) -> Reply<MotionUnitResponse> {
        let operation = request.operation();
        let mut unit = lock(&self.unit);
        let result = match request {
            MotionUnitRequest::Initialize {
                description,
                properties,
            } => unit
                .initialize(&description, &properties)
                .map(MotionUnitResponse::Bool),
            MotionUnitRequest::AssignInstruction { instruction, state } => unit
                .assign_instruction(&instruction, &state)
                .map(MotionUnitResponse::Bool),
            MotionUnitRequest::Abort { instruction_id } => {
                unit.abort(&instruction_id).map(MotionUnitResponse::Bool)
            }
            MotionUnitRequest::DoStep { time, state } => {
                unit.do_step(time, &state).map(MotionUnitResponse::Step)
            }
            MotionUnitRequest::CreateCheckpoint => {
                unit.create_checkpoint().map(MotionUnitResponse::Checkpoint)
            }
            MotionUnitRequest::RestoreCheckpoint { data } => unit
                .restore_checkpoint(&data)
                .map(MotionUnitResponse::Bool),
            MotionUnitRequest::ExecuteFunction { name, parameters } => unit
                .execute_function(&name, &parameters)
                .map(MotionUnitResponse::Function),
        };
        into_reply(operation, result)
    }
}

/// Serves skeleton queries from an implementation the engine side keeps writing to.
#[derive(Debug)]
pub struct SkeletonAccessProcessor<T> {
    skeleton: Arc<Mutex<T>>,
}

impl<T: SkeletonAccess> SkeletonAccessProcessor<T> {
    pub fn new(skeleton: Arc<Mutex<T>>) -> Self {
        Self { skeleton }
    }
}

impl<T: SkeletonAccess + 'static> Processor for SkeletonAccessProcessor<T> {
    type Request = SkeletonRequest;
    type Response = SkeletonResponse;

    fn process(&self, request: SkeletonRequest) -> Reply<SkeletonResponse> {
        let operation = request.operation();
        let mut skeleton = lock(&self.skeleton);
        let result = match request {
            SkeletonRequest::InitializeAnthropometry(description) => skeleton
                .initialize_anthropometry(&description)
                .map(|()| SkeletonResponse::Done),
            SkeletonRequest::AvatarDescription { avatar_id } => skeleton
                .avatar_description(&avatar_id)
                .map(SkeletonResponse::Description),
            SkeletonRequest::SetChannelData(values) => skeleton
                .set_channel_data(&values)
                .map(|()| SkeletonResponse::Done),
            SkeletonRequest::CurrentPostureValues { avatar_id } => skeleton
                .current_posture_values(&avatar_id)
                .map(SkeletonResponse::Posture),
            SkeletonRequest::JointPosition { avatar_id, joint } => skeleton
                .joint_position(&avatar_id, joint)
                .map(SkeletonResponse::Position),
            SkeletonRequest::JointRotation { avatar_id, joint } => skeleton
                .joint_rotation(&avatar_id, joint)
                .map(SkeletonResponse::Rotation),
            SkeletonRequest::RootPosition { avatar_id } => skeleton
                .root_position(&avatar_id)
                .map(SkeletonResponse::Position),
            SkeletonRequest::RootRotation { avatar_id } => skeleton
                .root_rotation(&avatar_id)
                .map(SkeletonResponse::Rotation),
            SkeletonRequest::SetRootPosition {
                avatar_id,
                position,
            } => skeleton
                .set_root_position(&avatar_id, position)
                .map(|()| SkeletonResponse::Done),
            SkeletonRequest::SetRootRotation {
                avatar_id,
                rotation,
            } => skeleton
                .set_root_rotation(&avatar_id, rotation)
                .map(|()| SkeletonResponse::Done),
        };
        into_reply(operation, result)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use cosim_shared::{
        model::{AvatarDescription, BoolResponse, Instruction, SimulationResult, SimulationState},
        AccessError,
    };

    use super::*;

    #[derive(Default)]
    struct Failing;

    impl MotionUnitAccess for Failing {
        fn initialize(
            &mut self,
            _: &AvatarDescription,
            _: &HashMap<String, String>,
        ) -> AccessResult<BoolResponse> {
            Ok(BoolResponse::success())
        }

        fn assign_instruction(
            &mut self,
            _: &Instruction,
            _: &SimulationState,
        ) -> AccessResult<BoolResponse> {
            Ok(BoolResponse::failure("busy"))
        }

        fn abort(&mut self, _: &str) -> AccessResult<BoolResponse> {
            Ok(BoolResponse::success())
        }

        fn do_step(&mut self, _: f64, _: &SimulationState) -> AccessResult<SimulationResult> {
            Err(AccessError::unit("solver diverged"))
        }

        fn create_checkpoint(&mut self) -> AccessResult<Vec<u8>> {
            Ok(vec![7])
        }

        fn restore_checkpoint(&mut self, _: &[u8]) -> AccessResult<BoolResponse> {
            Ok(BoolResponse::success())
        }

        fn execute_function(
            &mut self,
            _: &str,
            _: &HashMap<String, String>,
        ) -> AccessResult<HashMap<String, String>> {
            Ok(HashMap::new())
        }
    }

    #[test]
    fn unit_errors_become_faults() {
        let processor = MotionUnitProcessor::new(Failing);
        let reply = processor.process(MotionUnitRequest::DoStep {
            time: 0.01,
            state: SimulationState::default(),
        });
        match reply {
            Reply::Fault(message) => assert!(message.contains("solver diverged")),
            Reply::Ok(other) => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn control_failures_stay_responses() {
        let processor = MotionUnitProcessor::new(Failing);
        let reply = processor.process(MotionUnitRequest::AssignInstruction {
            instruction: Instruction::new("reach", "Reach"),
            state: SimulationState::default(),
        });
        match reply {
            Reply::Ok(MotionUnitResponse::Bool(response)) => {
                assert!(!response.successful);
                assert_eq!(response.message.as_deref(), Some("busy"));
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }
}
