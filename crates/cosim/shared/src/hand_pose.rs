//! Reach and grasp constraints built from a captured hand pose.
//!
//! The engine side samples the wrist and finger-tip transforms of a posed hand
//! (world space) and turns them into constraints for reach/grasp instructions.

use uuid::Uuid;

use crate::model::{
    AvatarPostureValues, Constraint, GeometryConstraint, JointConstraint, JointType,
    PostureConstraint, Transform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub fn wrist(self) -> JointType {
        match self {
            Hand::Left => JointType::LeftWrist,
            Hand::Right => JointType::RightWrist,
        }
    }

    /// Finger-tip joint for a finger name (`Thumb`, `Index`, `Middle`, `Ring`, `Little`).
    pub fn finger_tip(self, finger: &str) -> Option<JointType> {
        let joint = match (self, finger) {
            (Hand::Left, "Thumb") => JointType::LeftThumbTip,
            (Hand::Left, "Index") => JointType::LeftIndexTip,
            (Hand::Left, "Middle") => JointType::LeftMiddleTip,
            (Hand::Left, "Ring") => JointType::LeftRingTip,
            (Hand::Left, "Little") => JointType::LeftLittleTip,
            (Hand::Right, "Thumb") => JointType::RightThumbTip,
            (Hand::Right, "Index") => JointType::RightIndexTip,
            (Hand::Right, "Middle") => JointType::RightMiddleTip,
            (Hand::Right, "Ring") => JointType::RightRingTip,
            (Hand::Right, "Little") => JointType::RightLittleTip,
            _ => return None,
        };
        Some(joint)
    }
}

const FINGERS: [&str; 5] = ["Thumb", "Index", "Middle", "Ring", "Little"];

#[derive(Debug, Clone, PartialEq)]
pub struct HandPose {
    pub hand: Hand,
    pub wrist: Transform,
    pub finger_tips: Vec<(JointType, Transform)>,
}

impl HandPose {
    pub fn new(hand: Hand, wrist: Transform) -> Self {
        Self {
            hand,
            wrist,
            finger_tips: Vec::new(),
        }
    }

    /// Builds a pose from named points, e.g. the transforms below a hand rig.
    ///
    /// The first name containing `Wrist` is the wrist; a `Left` in its name selects the
    /// left hand. Finger tips are matched by `<Finger>Tip` (`ThumbTip`, ..., `LittleTip`).
    /// Returns `None` without a wrist.
    pub fn from_named_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (&'a str, Transform)>,
    {
        let points: Vec<(&str, Transform)> = points.into_iter().collect();
        let (wrist_name, wrist) = points
            .iter()
            .find(|(name, _)| name.contains("Wrist"))
            .cloned()?;
        let hand = if wrist_name.contains("Left") {
            Hand::Left
        } else {
            Hand::Right
        };

        let mut pose = HandPose::new(hand, wrist);
        for finger in FINGERS {
            let tip_name = format!("{finger}Tip");
            if let Some((_, t)) = points.iter().find(|(name, _)| name.contains(&tip_name)) {
                if let Some(joint) = hand.finger_tip(finger) {
                    pose.finger_tips.push((joint, t.clone()));
                }
            }
        }
        Some(pose)
    }

    /// Geometry constraint placing the wrist, relative to `parent_id` (empty for world).
    pub fn reach_constraint(&self, id: Option<&str>, parent_id: &str) -> Constraint {
        let mut target = self.wrist.clone();
        target.id = Uuid::new_v4().to_string();
        Constraint {
            id: constraint_id(id),
            geometry: Some(GeometryConstraint {
                parent_object_id: parent_id.to_string(),
                parent_to_constraint: Some(target),
            }),
            posture: None,
        }
    }

    /// Posture constraint with one joint constraint for the wrist and one per finger tip.
    ///
    /// With `wrist_local`, the finger tips are expressed in the wrist frame.
    pub fn grasp_constraint(&self, wrist_local: bool, id: Option<&str>) -> Constraint {
        let mut joint_constraints = vec![joint_constraint(self.hand.wrist(), &self.wrist)];
        for (joint, tip) in &self.finger_tips {
            let tip = if wrist_local {
                tip.relative_to(&self.wrist)
            } else {
                tip.clone()
            };
            joint_constraints.push(joint_constraint(*joint, &tip));
        }

        Constraint {
            id: constraint_id(id),
            geometry: None,
            posture: Some(PostureConstraint {
                posture: AvatarPostureValues::default(),
                joint_constraints,
            }),
        }
    }
}

fn constraint_id(id: Option<&str>) -> String {
    match id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => Uuid::new_v4().to_string(),
    }
}

fn joint_constraint(joint_type: JointType, t: &Transform) -> JointConstraint {
    let mut target = t.clone();
    target.id = Uuid::new_v4().to_string();
    JointConstraint {
        joint_type,
        geometry: Some(GeometryConstraint {
            parent_object_id: String::new(),
            parent_to_constraint: Some(target),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Quaternion, Vector3};

    fn at(x: f64, y: f64, z: f64) -> Transform {
        Transform::new("", Vector3::new(x, y, z), Quaternion::IDENTITY)
    }

    fn left_hand() -> HandPose {
        HandPose::from_named_points([
            ("LeftWrist", at(1.0, 1.0, 0.0)),
            ("LeftThumbTip", at(1.05, 1.0, 0.05)),
            ("LeftIndexTip", at(1.1, 1.0, 0.0)),
            ("LeftLittleTip", at(1.08, 1.0, -0.04)),
            ("Elbow", at(0.7, 1.0, 0.0)),
        ])
        .unwrap()
    }

    #[test]
    fn detects_handedness_and_tips() {
        let pose = left_hand();
        assert_eq!(pose.hand, Hand::Left);
        let joints: Vec<JointType> = pose.finger_tips.iter().map(|(j, _)| *j).collect();
        assert_eq!(
            joints,
            vec![
                JointType::LeftThumbTip,
                JointType::LeftIndexTip,
                JointType::LeftLittleTip
            ]
        );
    }

    #[test]
    fn missing_wrist_yields_none() {
        assert!(HandPose::from_named_points([("IndexTip", at(0.0, 0.0, 0.0))]).is_none());
    }

    #[test]
    fn reach_constraint_targets_wrist() {
        let pose = left_hand();
        let c = pose.reach_constraint(Some("reach-1"), "table");
        assert_eq!(c.id, "reach-1");
        let geometry = c.geometry.unwrap();
        assert_eq!(geometry.parent_object_id, "table");
        assert_eq!(
            geometry.parent_to_constraint.unwrap().position,
            Vector3::new(1.0, 1.0, 0.0)
        );
    }

    #[test]
    fn grasp_constraint_can_be_wrist_local() {
        let pose = left_hand();
        let c = pose.grasp_constraint(true, None);
        assert!(Uuid::parse_str(&c.id).is_ok());

        let joints = c.posture.unwrap().joint_constraints;
        assert_eq!(joints.len(), 4);
        assert_eq!(joints[0].joint_type, JointType::LeftWrist);

        let index = joints
            .iter()
            .find(|j| j.joint_type == JointType::LeftIndexTip)
            .unwrap();
        let local = index
            .geometry
            .as_ref()
            .unwrap()
            .parent_to_constraint
            .as_ref()
            .unwrap()
            .position;
        assert!((local - Vector3::new(0.1, 0.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn empty_id_is_replaced() {
        let c = left_hand().grasp_constraint(false, Some(""));
        assert!(Uuid::parse_str(&c.id).is_ok());
    }
}
