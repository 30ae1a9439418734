use std::collections::HashMap;

use core::fmt;

use serde::{Deserialize, Serialize};

use super::math::{Quaternion, Vector3};

/// Joints addressable by postures, skeleton queries and joint constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JointType {
    Root,
    PelvisCentre,
    S1L5,
    T12L1,
    C7T1,
    HeadJoint,
    LeftShoulder,
    LeftElbow,
    LeftWrist,
    LeftThumbTip,
    LeftIndexTip,
    LeftMiddleTip,
    LeftRingTip,
    LeftLittleTip,
    RightShoulder,
    RightElbow,
    RightWrist,
    RightThumbTip,
    RightIndexTip,
    RightMiddleTip,
    RightRingTip,
    RightLittleTip,
    LeftHip,
    LeftKnee,
    LeftAnkle,
    RightHip,
    RightKnee,
    RightAnkle,
}

impl fmt::Display for JointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One joint of an avatar skeleton in its zero posture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDescription {
    pub joint_type: JointType,
    pub parent: Option<JointType>,
    /// Offset from the parent joint in the zero posture.
    pub offset: Vector3,
    pub rotation: Quaternion,
}

impl JointDescription {
    pub fn new(joint_type: JointType, parent: Option<JointType>, offset: Vector3) -> Self {
        Self {
            joint_type,
            parent,
            offset,
            rotation: Quaternion::IDENTITY,
        }
    }
}

/// Static identity and shape of one simulated character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarDescription {
    pub avatar_id: String,
    pub name: String,
    pub joints: Vec<JointDescription>,
    pub properties: HashMap<String, String>,
}

impl AvatarDescription {
    pub fn new(avatar_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            avatar_id: avatar_id.into(),
            name: name.into(),
            joints: Vec::new(),
            properties: HashMap::new(),
        }
    }

    pub fn with_joint(mut self, joint: JointDescription) -> Self {
        self.joints.push(joint);
        self
    }

    /// Number of posture channels: root translation plus one quaternion per joint.
    pub fn channel_count(&self) -> usize {
        3 + 4 * self.joints.len()
    }

    pub fn joint(&self, joint_type: JointType) -> Option<&JointDescription> {
        self.joints.iter().find(|j| j.joint_type == joint_type)
    }
}

/// Posture of an avatar at an instant, as a flat channel vector.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AvatarPostureValues {
    pub avatar_id: String,
    pub posture_data: Vec<f64>,
    /// Set when `posture_data` only covers a subset of the joints.
    pub partial_joint_list: Option<Vec<JointType>>,
}

impl AvatarPostureValues {
    pub fn new(avatar_id: impl Into<String>, posture_data: Vec<f64>) -> Self {
        Self {
            avatar_id: avatar_id.into(),
            posture_data,
            partial_joint_list: None,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.partial_joint_list.is_some()
    }

    /// Channels expected for this posture when applied to `description`.
    pub fn expected_channels(&self, description: &AvatarDescription) -> usize {
        match &self.partial_joint_list {
            Some(joints) => 3 + 4 * joints.len(),
            None => description.channel_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_count_includes_root_translation() {
        let description = AvatarDescription::new("a1", "Alice")
            .with_joint(JointDescription::new(JointType::PelvisCentre, None, Vector3::ZERO))
            .with_joint(JointDescription::new(
                JointType::LeftHip,
                Some(JointType::PelvisCentre),
                Vector3::new(0.1, -0.05, 0.0),
            ));
        assert_eq!(description.channel_count(), 11);
        assert!(description.joint(JointType::LeftHip).is_some());
        assert!(description.joint(JointType::RightHip).is_none());
    }

    #[test]
    fn partial_posture_expects_fewer_channels() {
        let description = AvatarDescription::new("a1", "Alice")
            .with_joint(JointDescription::new(JointType::PelvisCentre, None, Vector3::ZERO))
            .with_joint(JointDescription::new(JointType::HeadJoint, None, Vector3::ZERO));
        let mut posture = AvatarPostureValues::new("a1", vec![0.0; 7]);
        posture.partial_joint_list = Some(vec![JointType::HeadJoint]);
        assert_eq!(posture.expected_channels(&description), 7);
        posture.partial_joint_list = None;
        assert_eq!(posture.expected_channels(&description), 11);
    }
}
