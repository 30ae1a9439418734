//! Geometric and postural targets attached to instructions.
//!
//! Motion units interpret these; the co-simulation layer only carries them.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::{
    avatar::{AvatarPostureValues, JointType},
    math::Transform,
};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeometryConstraint {
    /// Scene object the transform is relative to; empty for world space.
    pub parent_object_id: String,
    pub parent_to_constraint: Option<Transform>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointConstraint {
    pub joint_type: JointType,
    pub geometry: Option<GeometryConstraint>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PostureConstraint {
    pub posture: AvatarPostureValues,
    pub joint_constraints: Vec<JointConstraint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: String,
    pub geometry: Option<GeometryConstraint>,
    pub posture: Option<PostureConstraint>,
}

impl Constraint {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            geometry: None,
            posture: None,
        }
    }
}

impl fmt::Display for GeometryConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parent: '{}'", self.parent_object_id)?;
        if let Some(t) = &self.parent_to_constraint {
            write!(
                f,
                ", position: ({:.3}, {:.3}, {:.3}), rotation: ({:.3}, {:.3}, {:.3}, {:.3})",
                t.position.x,
                t.position.y,
                t.position.z,
                t.rotation.x,
                t.rotation.y,
                t.rotation.z,
                t.rotation.w
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for JointConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.joint_type)?;
        if let Some(g) = &self.geometry {
            write!(f, " [{g}]")?;
        }
        Ok(())
    }
}

impl fmt::Display for PostureConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "posture: {} channels, joints: [",
            self.posture.posture_data.len()
        )?;
        for (i, jc) in self.joint_constraints.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{jc}")?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Constraint {}", self.id)?;
        if let Some(g) = &self.geometry {
            write!(f, " geometry({g})")?;
        }
        if let Some(p) = &self.posture {
            write!(f, " posture({p})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::math::{Quaternion, Vector3};

    #[test]
    fn display_lists_joint_constraints() {
        let constraint = Constraint {
            id: "grasp".into(),
            geometry: None,
            posture: Some(PostureConstraint {
                posture: AvatarPostureValues::default(),
                joint_constraints: vec![
                    JointConstraint {
                        joint_type: JointType::RightWrist,
                        geometry: Some(GeometryConstraint {
                            parent_object_id: String::new(),
                            parent_to_constraint: Some(Transform::new(
                                "t",
                                Vector3::new(1.0, 2.0, 3.0),
                                Quaternion::IDENTITY,
                            )),
                        }),
                    },
                    JointConstraint {
                        joint_type: JointType::RightThumbTip,
                        geometry: None,
                    },
                ],
            }),
        };

        let printed = constraint.to_string();
        assert!(printed.starts_with("Constraint grasp posture("));
        assert!(printed.contains("RightWrist [parent: '', position: (1.000, 2.000, 3.000)"));
        assert!(printed.contains(", RightThumbTip]"));
    }
}
