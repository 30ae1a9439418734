//! In-memory skeleton snapshot served to remote processes.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use cosim_shared::{
    config::HostConfig,
    model::{AvatarDescription, AvatarPostureValues, JointType, Quaternion, Vector3},
    AccessError, AccessResult, ServiceDescription, SkeletonAccess,
};
use tracing::debug;

use crate::{controller::ServiceController, processor::SkeletonAccessProcessor};

pub const SKELETON_SERVICE_NAME: &str = "remoteSkeletonAccess";

#[derive(Debug, Clone)]
struct AvatarEntry {
    description: AvatarDescription,
    posture: AvatarPostureValues,
}

impl AvatarEntry {
    fn new(description: AvatarDescription) -> Self {
        let mut data = vec![0.0; description.channel_count()];
        for joint in 0..description.joints.len() {
            data[3 + 4 * joint + 3] = 1.0;
        }
        let posture = AvatarPostureValues::new(description.avatar_id.clone(), data);
        Self {
            description,
            posture,
        }
    }

    fn joint_index(&self, joint: JointType) -> Option<usize> {
        self.description
            .joints
            .iter()
            .position(|j| j.joint_type == joint)
    }

    fn local_rotation(&self, index: usize) -> Quaternion {
        let c = &self.posture.posture_data[3 + 4 * index..3 + 4 * index + 4];
        Quaternion::new(c[0], c[1], c[2], c[3])
    }

    fn root_position(&self) -> Vector3 {
        let c = &self.posture.posture_data;
        Vector3::new(c[0], c[1], c[2])
    }

    /// World position and rotation of a joint, walking up its parent chain.
    fn global(&self, index: usize) -> (Vector3, Quaternion) {
        let mut chain = vec![index];
        let mut current = index;
        while let Some(parent) = self.description.joints[current]
            .parent
            .and_then(|p| self.joint_index(p))
        {
            // A malformed description could loop; the chain can never exceed the joint count.
            if chain.len() > self.description.joints.len() {
                break;
            }
            chain.push(parent);
            current = parent;
        }

        let mut position = self.root_position();
        let mut rotation = Quaternion::IDENTITY;
        for (depth, &joint) in chain.iter().rev().enumerate() {
            let description = &self.description.joints[joint];
            if depth > 0 {
                position = position + rotation.rotate(description.offset);
            }
            rotation = rotation * description.rotation * self.local_rotation(joint);
        }
        (position, rotation)
    }

    fn apply(&mut self, values: &AvatarPostureValues) -> AccessResult<()> {
        let expected = values.expected_channels(&self.description);
        if values.posture_data.len() != expected {
            return Err(AccessError::unit(format!(
                "expected {expected} posture channels, received {}",
                values.posture_data.len()
            )));
        }
        match &values.partial_joint_list {
            None => self.posture.posture_data.clone_from(&values.posture_data),
            Some(joints) => {
                let indices = joints
                    .iter()
                    .map(|joint| {
                        self.joint_index(*joint).ok_or_else(|| {
                            AccessError::unit(format!("joint {joint} is not part of the avatar"))
                        })
                    })
                    .collect::<AccessResult<Vec<_>>>()?;
                let data = &mut self.posture.posture_data;
                data[..3].copy_from_slice(&values.posture_data[..3]);
                for (slot, joint) in indices.into_iter().enumerate() {
                    let (src, dst) = (3 + 4 * slot, 3 + 4 * joint);
                    data[dst..dst + 4].copy_from_slice(&values.posture_data[src..src + 4]);
                }
            }
        }
        Ok(())
    }
}

/// Skeleton state for every known avatar.
///
/// Postures are flat channel vectors: root translation followed by one local rotation
/// per joint, in description order. Joint positions are derived from the description
/// offsets; the first joint is the root.
#[derive(Debug, Default)]
pub struct SkeletonStore {
    avatars: HashMap<String, AvatarEntry>,
}

pub type SharedSkeleton = Arc<Mutex<SkeletonStore>>;

impl SkeletonStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedSkeleton {
        Arc::new(Mutex::new(self))
    }

    pub fn avatar_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.avatars.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn entry(&self, avatar_id: &str) -> Option<&AvatarEntry> {
        self.avatars.get(avatar_id)
    }

    fn entry_mut(&mut self, avatar_id: &str) -> AccessResult<&mut AvatarEntry> {
        self.avatars
            .get_mut(avatar_id)
            .ok_or_else(|| AccessError::unit(format!("unknown avatar '{avatar_id}'")))
    }

    fn joint(&self, avatar_id: &str, joint: JointType) -> Option<(Vector3, Quaternion)> {
        let entry = self.entry(avatar_id)?;
        let index = entry.joint_index(joint)?;
        Some(entry.global(index))
    }
}

impl SkeletonAccess for SkeletonStore {
    fn initialize_anthropometry(&mut self, description: &AvatarDescription) -> AccessResult<()> {
        if description.avatar_id.is_empty() {
            return Err(AccessError::unit("avatar description has no id"));
        }
        debug!(
            avatar = %description.avatar_id,
            joints = description.joints.len(),
            "anthropometry initialized"
        );
        self.avatars.insert(
            description.avatar_id.clone(),
            AvatarEntry::new(description.clone()),
        );
        Ok(())
    }

    fn avatar_description(&mut self, avatar_id: &str) -> AccessResult<Option<AvatarDescription>> {
        Ok(self.entry(avatar_id).map(|e| e.description.clone()))
    }

    fn set_channel_data(&mut self, values: &AvatarPostureValues) -> AccessResult<()> {
        self.entry_mut(&values.avatar_id)?.apply(values)
    }

    fn current_posture_values(
        &mut self,
        avatar_id: &str,
    ) -> AccessResult<Option<AvatarPostureValues>> {
        Ok(self.entry(avatar_id).map(|e| e.posture.clone()))
    }

    fn joint_position(
        &mut self,
        avatar_id: &str,
        joint: JointType,
    ) -> AccessResult<Option<Vector3>> {
        Ok(self.joint(avatar_id, joint).map(|(position, _)| position))
    }

    fn joint_rotation(
        &mut self,
        avatar_id: &str,
        joint: JointType,
    ) -> AccessResult<Option<Quaternion>> {
        Ok(self.joint(avatar_id, joint).map(|(_, rotation)| rotation))
    }

    fn root_position(&mut self, avatar_id: &str) -> AccessResult<Option<Vector3>> {
        Ok(self.entry(avatar_id).map(AvatarEntry::root_position))
    }

    fn root_rotation(&mut self, avatar_id: &str) -> AccessResult<Option<Quaternion>> {
        Ok(self
            .entry(avatar_id)
            .filter(|e| !e.description.joints.is_empty())
            .map(|e| e.local_rotation(0)))
    }

    fn set_root_position(&mut self, avatar_id: &str, position: Vector3) -> AccessResult<()> {
        let entry = self.entry_mut(avatar_id)?;
        entry.posture.posture_data[..3].copy_from_slice(&[position.x, position.y, position.z]);
        Ok(())
    }

    fn set_root_rotation(&mut self, avatar_id: &str, rotation: Quaternion) -> AccessResult<()> {
        let entry = self.entry_mut(avatar_id)?;
        if entry.description.joints.is_empty() {
            return Err(AccessError::unit(format!("avatar '{avatar_id}' has no joints")));
        }
        entry.posture.posture_data[3..7]
            .copy_from_slice(&[rotation.x, rotation.y, rotation.z, rotation.w]);
        Ok(())
    }
}

/// Host for skeleton access to `skeleton`, registered as [`SKELETON_SERVICE_NAME`].
pub fn skeleton_access_server<T>(
    skeleton: Arc<Mutex<T>>,
    config: &HostConfig,
) -> ServiceController<SkeletonAccessProcessor<T>>
where
    T: SkeletonAccess + 'static,
{
    let description = ServiceDescription::new(SKELETON_SERVICE_NAME, config.language.clone());
    ServiceController::new(
        description,
        config.register_address.clone(),
        SkeletonAccessProcessor::new(skeleton),
        config.clone(),
    )
}
