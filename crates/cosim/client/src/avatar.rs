//! The simulated character whose posture the bridge writes into.

use std::sync::{Arc, Mutex};

use cosim_shared::model::{AvatarDescription, AvatarPostureValues, JointType};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PostureError {
    #[error("posture for avatar '{received}' applied to avatar '{expected}'")]
    AvatarMismatch { expected: String, received: String },
    #[error("expected {expected} posture channels, received {received}")]
    ChannelCount { expected: usize, received: usize },
    #[error("posture channel {index} is not finite")]
    NonFinite { index: usize },
    #[error("joint {0} is not part of the avatar")]
    UnknownJoint(JointType),
    #[error("posture rejected: {0}")]
    Rejected(String),
}

/// Receives the posture produced by each simulation step.
pub trait AvatarSink: Send {
    fn assign_posture_values(&mut self, values: &AvatarPostureValues) -> Result<(), PostureError>;
}

/// Sink shared between the bridge and the rest of the application.
pub type SharedAvatar = Arc<Mutex<dyn AvatarSink>>;

/// Posture holder that validates incoming channel data against its description.
#[derive(Debug, Clone)]
pub struct Avatar {
    description: AvatarDescription,
    posture: AvatarPostureValues,
    revision: u64,
}

impl Avatar {
    pub fn new(description: AvatarDescription) -> Self {
        let posture = zero_posture(&description);
        Self {
            description,
            posture,
            revision: 0,
        }
    }

    pub fn description(&self) -> &AvatarDescription {
        &self.description
    }

    pub fn posture(&self) -> &AvatarPostureValues {
        &self.posture
    }

    /// Number of postures applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn shared(self) -> Arc<Mutex<Avatar>> {
        Arc::new(Mutex::new(self))
    }

    fn validate(&self, values: &AvatarPostureValues) -> Result<(), PostureError> {
        if values.avatar_id != self.description.avatar_id {
            return Err(PostureError::AvatarMismatch {
                expected: self.description.avatar_id.clone(),
                received: values.avatar_id.clone(),
            });
        }
        let expected = values.expected_channels(&self.description);
        if values.posture_data.len() != expected {
            return Err(PostureError::ChannelCount {
                expected,
                received: values.posture_data.len(),
            });
        }
        if let Some(index) = values.posture_data.iter().position(|v| !v.is_finite()) {
            return Err(PostureError::NonFinite { index });
        }
        Ok(())
    }

    fn joint_index(&self, joint: JointType) -> Result<usize, PostureError> {
        self.description
            .joints
            .iter()
            .position(|j| j.joint_type == joint)
            .ok_or(PostureError::UnknownJoint(joint))
    }
}

impl AvatarSink for Avatar {
    fn assign_posture_values(&mut self, values: &AvatarPostureValues) -> Result<(), PostureError> {
        self.validate(values)?;

        match &values.partial_joint_list {
            None => {
                self.posture.posture_data.clone_from(&values.posture_data);
            }
            Some(joints) => {
                // Resolve every joint first so a bad list leaves the posture untouched.
                let indices = joints
                    .iter()
                    .map(|joint| self.joint_index(*joint))
                    .collect::<Result<Vec<_>, _>>()?;

                let data = &mut self.posture.posture_data;
                data[..3].copy_from_slice(&values.posture_data[..3]);
                for (slot, joint_index) in indices.into_iter().enumerate() {
                    let src = 3 + 4 * slot;
                    let dst = 3 + 4 * joint_index;
                    data[dst..dst + 4].copy_from_slice(&values.posture_data[src..src + 4]);
                }
            }
        }

        self.revision += 1;
        trace!(
            avatar = %self.description.avatar_id,
            revision = self.revision,
            partial = values.is_partial(),
            "posture applied"
        );
        Ok(())
    }
}

/// Root at the origin, every joint at identity rotation.
fn zero_posture(description: &AvatarDescription) -> AvatarPostureValues {
    let mut data = vec![0.0; description.channel_count()];
    for joint in 0..description.joints.len() {
        data[3 + 4 * joint + 3] = 1.0;
    }
    AvatarPostureValues::new(description.avatar_id.clone(), data)
}
