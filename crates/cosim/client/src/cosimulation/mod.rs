//! Co-simulation bridge.
//!
//! [`RemoteCoSimulation`] drives one motion unit (usually a [`RemoteMotionUnit`](crate::RemoteMotionUnit))
//! frame by frame. Each step is forwarded to the unit, the returned events are fanned out
//! to the subscribed handlers and the returned posture is written into the shared avatar.
//! Event handler and posture faults are contained here; failures of the unit itself are
//! returned to the caller untouched.

mod events;

use std::{
    any::Any,
    collections::HashMap,
    panic::{catch_unwind, AssertUnwindSafe},
};

use cosim_shared::{
    model::{AvatarDescription, BoolResponse, Instruction, SimulationResult, SimulationState},
    AccessError, AccessResult, MotionUnitAccess, TimeProfiler,
};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::avatar::{PostureError, SharedAvatar};

pub use events::{DeliveryReport, SimulationEventHandler, SimulationEventHandlers, SubscriptionId};

pub const PROFILER_NAME: &str = "remote_co_simulation";
pub const PROFILER_CATEGORY: &str = "co_simulation";

/// Profiler labels recorded by the bridge.
pub mod timing {
    pub const INITIALIZE: &str = "initialize";
    pub const ASSIGN_INSTRUCTION: &str = "assign_instruction";
    pub const DO_STEP_REMOTE: &str = "do_step_remote";
    pub const DO_STEP_COMPLETE: &str = "do_step_complete";
    pub const ABORT: &str = "abort";
    pub const CREATE_CHECKPOINT: &str = "create_checkpoint";
    pub const RESTORE_CHECKPOINT: &str = "restore_checkpoint";
    pub const EXECUTE_FUNCTION: &str = "execute_function";
}

#[derive(Debug, Error)]
pub enum CoSimError {
    #[error("{operation} requires a successful initialize")]
    NotInitialized { operation: &'static str },
    #[error("invalid time step {0}")]
    InvalidTimeStep(f64),
    #[error(transparent)]
    Access(#[from] AccessError),
}

impl From<CoSimError> for AccessError {
    fn from(err: CoSimError) -> Self {
        match err {
            CoSimError::Access(err) => err,
            other => AccessError::unit(other.to_string()),
        }
    }
}

pub type CoSimResult<T> = Result<T, CoSimError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Uninitialized,
    Initialized,
    Stepping,
}

pub struct RemoteCoSimulation {
    unit: Box<dyn MotionUnitAccess>,
    avatar: SharedAvatar,
    handlers: SimulationEventHandlers,
    profiler: TimeProfiler,
    state: BridgeState,
    frame_number: u64,
    posture_faults: u64,
    last_posture_fault: Option<String>,
}

impl std::fmt::Debug for RemoteCoSimulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCoSimulation")
            .field("state", &self.state)
            .field("frame_number", &self.frame_number)
            .field("subscribers", &self.handlers.len())
            .field("posture_faults", &self.posture_faults)
            .finish()
    }
}

impl RemoteCoSimulation {
    pub fn new(unit: impl MotionUnitAccess + 'static, avatar: SharedAvatar) -> Self {
        Self::with_profiler(
            unit,
            avatar,
            TimeProfiler::new(PROFILER_NAME, PROFILER_CATEGORY),
        )
    }

    pub fn with_profiler(
        unit: impl MotionUnitAccess + 'static,
        avatar: SharedAvatar,
        profiler: TimeProfiler,
    ) -> Self {
        Self {
            unit: Box::new(unit),
            avatar,
            handlers: SimulationEventHandlers::default(),
            profiler,
            state: BridgeState::Uninitialized,
            frame_number: 0,
            posture_faults: 0,
            last_posture_fault: None,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Steps completed so far; used to tag timing samples.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn profiler(&self) -> &TimeProfiler {
        &self.profiler
    }

    pub fn avatar(&self) -> &SharedAvatar {
        &self.avatar
    }

    /// Number of steps whose posture could not be applied to the avatar.
    pub fn posture_faults(&self) -> u64 {
        self.posture_faults
    }

    pub fn last_posture_fault(&self) -> Option<&str> {
        self.last_posture_fault.as_deref()
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&cosim_shared::model::SimulationEvent) -> anyhow::Result<()> + Send + 'static,
    {
        self.handlers.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.handlers.unsubscribe(id)
    }

    /// Forwards to the unit. A successful response moves the bridge to `Initialized`;
    /// a failed one leaves the state as it was.
    pub fn initialize(
        &mut self,
        description: &AvatarDescription,
        properties: &HashMap<String, String>,
    ) -> CoSimResult<BoolResponse> {
        let response = self
            .profiler
            .watch(timing::INITIALIZE, self.frame_number, || {
                self.unit.initialize(description, properties)
            })?
            .normalized();

        if response.successful {
            debug!(avatar = %description.avatar_id, "co-simulation initialized");
            self.state = BridgeState::Initialized;
        } else {
            warn!(
                avatar = %description.avatar_id,
                message = response.message.as_deref().unwrap_or_default(),
                "co-simulation initialize rejected"
            );
        }
        Ok(response)
    }

    pub fn assign_instruction(
        &mut self,
        instruction: &Instruction,
        state: &SimulationState,
    ) -> CoSimResult<BoolResponse> {
        self.ensure_initialized("assign_instruction")?;
        let label = format!("{}_{}", timing::ASSIGN_INSTRUCTION, instruction.id);
        let response = self.profiler.watch(&label, self.frame_number, || {
            self.unit.assign_instruction(instruction, state)
        })?;
        Ok(response.normalized())
    }

    pub fn abort(&mut self, instruction_id: &str) -> CoSimResult<BoolResponse> {
        self.ensure_initialized("abort")?;
        let response = self.profiler.watch(timing::ABORT, self.frame_number, || {
            self.unit.abort(instruction_id)
        })?;
        Ok(response.normalized())
    }

    /// Runs one simulation step.
    ///
    /// Events are delivered to every handler, in result order, before the posture is
    /// applied. Handler failures and posture application failures are logged and do not
    /// affect the returned result, which is always the unit's result unmodified.
    /// Errors from the unit itself are returned as-is.
    pub fn do_step(&mut self, time: f64, state: &SimulationState) -> CoSimResult<SimulationResult> {
        self.ensure_initialized("do_step")?;
        if !time.is_finite() || time < 0.0 {
            return Err(CoSimError::InvalidTimeStep(time));
        }

        let frame = self.frame_number;
        let complete = self.profiler.start_watch();
        let remote = self.profiler.start_watch();
        let result = self.unit.do_step(time, state)?;
        self.profiler.stop_watch(timing::DO_STEP_REMOTE, remote, frame);

        if !result.events.is_empty() && !self.handlers.is_empty() {
            let report = self.handlers.dispatch_all(&result.events);
            if report.failed > 0 {
                warn!(
                    frame,
                    delivered = report.delivered,
                    failed = report.failed,
                    "event delivery incomplete"
                );
            }
        }

        if let Err(fault) = self.apply_posture(&result) {
            error!(frame, error = %fault, "problem assigning posture from co-simulation");
            self.posture_faults += 1;
            self.last_posture_fault = Some(fault);
        }

        self.profiler
            .stop_watch(timing::DO_STEP_COMPLETE, complete, frame);
        self.state = BridgeState::Stepping;
        self.frame_number += 1;
        Ok(result)
    }

    pub fn create_checkpoint(&mut self) -> CoSimResult<Vec<u8>> {
        self.ensure_initialized("create_checkpoint")?;
        let data = self
            .profiler
            .watch(timing::CREATE_CHECKPOINT, self.frame_number, || {
                self.unit.create_checkpoint()
            })?;
        Ok(data)
    }

    /// The blob is handed to the unit untouched; compatibility is the unit's concern.
    pub fn restore_checkpoint(&mut self, data: &[u8]) -> CoSimResult<BoolResponse> {
        self.ensure_initialized("restore_checkpoint")?;
        let response = self
            .profiler
            .watch(timing::RESTORE_CHECKPOINT, self.frame_number, || {
                self.unit.restore_checkpoint(data)
            })?;
        Ok(response.normalized())
    }

    pub fn execute_function(
        &mut self,
        name: &str,
        parameters: &HashMap<String, String>,
    ) -> CoSimResult<HashMap<String, String>> {
        self.ensure_initialized("execute_function")?;
        let values = self
            .profiler
            .watch(timing::EXECUTE_FUNCTION, self.frame_number, || {
                self.unit.execute_function(name, parameters)
            })?;
        Ok(values)
    }

    fn ensure_initialized(&self, operation: &'static str) -> CoSimResult<()> {
        match self.state {
            BridgeState::Uninitialized => Err(CoSimError::NotInitialized { operation }),
            BridgeState::Initialized | BridgeState::Stepping => Ok(()),
        }
    }

    fn apply_posture(&self, result: &SimulationResult) -> Result<(), String> {
        let applied = catch_unwind(AssertUnwindSafe(|| -> Result<(), PostureError> {
            let mut avatar = match self.avatar.lock() {
                Ok(avatar) => avatar,
                Err(poisoned) => poisoned.into_inner(),
            };
            avatar.assign_posture_values(&result.posture)
        }));
        match applied {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err.to_string()),
            Err(payload) => Err(format!("avatar panicked: {}", panic_message(payload.as_ref()))),
        }
    }
}

impl MotionUnitAccess for RemoteCoSimulation {
    fn initialize(
        &mut self,
        description: &AvatarDescription,
        properties: &HashMap<String, String>,
    ) -> AccessResult<BoolResponse> {
        Ok(RemoteCoSimulation::initialize(self, description, properties)?)
    }

    fn assign_instruction(
        &mut self,
        instruction: &Instruction,
        state: &SimulationState,
    ) -> AccessResult<BoolResponse> {
        Ok(RemoteCoSimulation::assign_instruction(self, instruction, state)?)
    }

    fn abort(&mut self, instruction_id: &str) -> AccessResult<BoolResponse> {
        Ok(RemoteCoSimulation::abort(self, instruction_id)?)
    }

    fn do_step(&mut self, time: f64, state: &SimulationState) -> AccessResult<SimulationResult> {
        Ok(RemoteCoSimulation::do_step(self, time, state)?)
    }

    fn create_checkpoint(&mut self) -> AccessResult<Vec<u8>> {
        Ok(RemoteCoSimulation::create_checkpoint(self)?)
    }

    fn restore_checkpoint(&mut self, data: &[u8]) -> AccessResult<BoolResponse> {
        Ok(RemoteCoSimulation::restore_checkpoint(self, data)?)
    }

    fn execute_function(
        &mut self,
        name: &str,
        parameters: &HashMap<String, String>,
    ) -> AccessResult<HashMap<String, String>> {
        Ok(RemoteCoSimulation::execute_function(self, name, parameters)?)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
