use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{avatar::AvatarPostureValues, constraint::Constraint};

/// Well-known values for [`SimulationEvent::event_type`].
pub mod event_type {
    pub const START: &str = "start";
    pub const END: &str = "end";
    pub const ABORT: &str = "abort";
    pub const INIT_ERROR: &str = "init_error";
    pub const CONSTRAINT_VIOLATED: &str = "constraint_violated";
}

/// Kinematic state of the avatar at the start of a step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationState {
    pub initial: AvatarPostureValues,
    pub current: AvatarPostureValues,
    pub constraints: Vec<Constraint>,
}

impl SimulationState {
    /// State whose initial and current posture are the same.
    pub fn from_posture(posture: AvatarPostureValues) -> Self {
        Self {
            initial: posture.clone(),
            current: posture,
            constraints: Vec::new(),
        }
    }
}

/// A uniquely identified motion task (reach, grasp, walk, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: String,
    pub name: String,
    pub motion_type: String,
    pub properties: HashMap<String, String>,
    pub constraints: Vec<Constraint>,
    pub start_condition: Option<String>,
    pub end_condition: Option<String>,
}

impl Instruction {
    /// Creates an instruction with a freshly generated id.
    pub fn new(name: impl Into<String>, motion_type: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name, motion_type)
    }

    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        motion_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            motion_type: motion_type.into(),
            properties: HashMap::new(),
            constraints: Vec::new(),
            start_condition: None,
            end_condition: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// Notification raised by a motion unit during a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationEvent {
    pub name: String,
    pub event_type: String,
    /// Usually the id of the instruction the event refers to.
    pub reference: String,
    pub properties: HashMap<String, String>,
}

impl SimulationEvent {
    pub fn new(
        name: impl Into<String>,
        event_type: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            event_type: event_type.into(),
            reference: reference.into(),
            properties: HashMap::new(),
        }
    }
}

/// Output of one step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationResult {
    pub posture: AvatarPostureValues,
    pub events: Vec<SimulationEvent>,
    pub constraints: Vec<Constraint>,
    pub log_data: Vec<String>,
}

impl SimulationResult {
    pub fn new(posture: AvatarPostureValues) -> Self {
        Self {
            posture,
            ..Default::default()
        }
    }

    pub fn with_event(mut self, event: SimulationEvent) -> Self {
        self.events.push(event);
        self
    }
}

/// Diagnostic attached to failures that arrived without one.
pub const MISSING_DIAGNOSTIC: &str = "operation failed without diagnostic";

/// Outcome of a control operation. A failure always carries a non-empty message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoolResponse {
    pub successful: bool,
    pub message: Option<String>,
}

impl BoolResponse {
    pub fn success() -> Self {
        Self {
            successful: true,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            successful: false,
            message: Some(if message.trim().is_empty() {
                MISSING_DIAGNOSTIC.to_string()
            } else {
                message
            }),
        }
    }

    /// Restores the diagnostic invariant on responses received from elsewhere.
    pub fn normalized(self) -> Self {
        if self.successful {
            return self;
        }
        match self.message {
            Some(message) if !message.trim().is_empty() => Self {
                successful: false,
                message: Some(message),
            },
            _ => Self::failure(MISSING_DIAGNOSTIC),
        }
    }

    pub fn is_success(&self) -> bool {
        self.successful
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_never_has_empty_message() {
        assert_eq!(
            BoolResponse::failure("  ").message.as_deref(),
            Some(MISSING_DIAGNOSTIC)
        );
        assert_eq!(
            BoolResponse::failure("unknown motion type").message.as_deref(),
            Some("unknown motion type")
        );
    }

    #[test]
    fn normalized_fills_missing_diagnostic() {
        let raw = BoolResponse {
            successful: false,
            message: None,
        };
        let fixed = raw.normalized();
        assert!(!fixed.successful);
        assert_eq!(fixed.message.as_deref(), Some(MISSING_DIAGNOSTIC));

        let ok = BoolResponse {
            successful: true,
            message: None,
        };
        assert_eq!(ok.clone().normalized(), ok);
    }

    #[test]
    fn instructions_get_unique_ids() {
        let a = Instruction::new("reach", "Pose/Reach");
        let b = Instruction::new("reach", "Pose/Reach");
        assert_ne!(a.id, b.id);
        assert!(Uuid::parse_str(&a.id).is_ok());
    }
}
