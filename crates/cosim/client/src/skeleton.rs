use cosim_shared::{
    model::{AvatarDescription, AvatarPostureValues, JointType, Quaternion, Vector3},
    protocol::{unexpected, Operation, SkeletonRequest, SkeletonResponse},
    AccessResult, ClientConfig, ServiceAddress, SkeletonAccess,
};

use crate::rpc::RpcClient;

/// Skeleton access served by a remote scene.
#[derive(Debug)]
pub struct RemoteSkeletonAccess {
    client: RpcClient<SkeletonRequest, SkeletonResponse>,
}

impl RemoteSkeletonAccess {
    pub fn connect(config: &ClientConfig) -> AccessResult<Self> {
        Ok(Self {
            client: RpcClient::connect(config)?,
        })
    }

    pub fn connect_to(address: ServiceAddress) -> AccessResult<Self> {
        Self::connect(&ClientConfig::for_address(address))
    }

    fn call_done(&mut self, request: SkeletonRequest) -> AccessResult<()> {
        let operation = request.operation();
        match self.client.call(request)? {
            SkeletonResponse::Done => Ok(()),
            other => Err(unexpected(operation, &other)),
        }
    }

    fn call_position(&mut self, request: SkeletonRequest) -> AccessResult<Option<Vector3>> {
        let operation = request.operation();
        match self.client.call(request)? {
            SkeletonResponse::Position(position) => Ok(position),
            other => Err(unexpected(operation, &other)),
        }
    }

    fn call_rotation(&mut self, request: SkeletonRequest) -> AccessResult<Option<Quaternion>> {
        let operation = request.operation();
        match self.client.call(request)? {
            SkeletonResponse::Rotation(rotation) => Ok(rotation),
            other => Err(unexpected(operation, &other)),
        }
    }
}

impl SkeletonAccess for RemoteSkeletonAccess {
    fn initialize_anthropometry(&mut self, description: &AvatarDescription) -> AccessResult<()> {
        self.call_done(SkeletonRequest::InitializeAnthropometry(description.clone()))
    }

    fn avatar_description(&mut self, avatar_id: &str) -> AccessResult<Option<AvatarDescription>> {
        match self.client.call(SkeletonRequest::AvatarDescription {
            avatar_id: avatar_id.to_string(),
        })? {
            SkeletonResponse::Description(description) => Ok(description),
            other => Err(unexpected("avatar_description", &other)),
        }
    }

    fn set_channel_data(&mut self, values: &AvatarPostureValues) -> AccessResult<()> {
        self.call_done(SkeletonRequest::SetChannelData(values.clone()))
    }

    fn current_posture_values(
        &mut self,
        avatar_id: &str,
    ) -> AccessResult<Option<AvatarPostureValues>> {
        match self.client.call(SkeletonRequest::CurrentPostureValues {
            avatar_id: avatar_id.to_string(),
        })? {
            SkeletonResponse::Posture(posture) => Ok(posture),
            other => Err(unexpected("current_posture_values", &other)),
        }
    }

    fn joint_position(
        &mut self,
        avatar_id: &str,
        joint: JointType,
    ) -> AccessResult<Option<Vector3>> {
        self.call_position(SkeletonRequest::JointPosition {
            avatar_id: avatar_id.to_string(),
            joint,
        })
    }

    fn joint_rotation(
        &mut self,
        avatar_id: &str,
        joint: JointType,
    ) -> AccessResult<Option<Quaternion>> {
        self.call_rotation(SkeletonRequest::JointRotation {
            avatar_id: avatar_id.to_string(),
            joint,
        })
    }

    fn root_position(&mut self, avatar_id: &str) -> AccessResult<Option<Vector3>> {
        self.call_position(SkeletonRequest::RootPosition {
            avatar_id: avatar_id.to_string(),
        })
    }

    fn root_rotation(&mut self, avatar_id: &str) -> AccessResult<Option<Quaternion>> {
        self.call_rotation(SkeletonRequest::RootRotation {
            avatar_id: avatar_id.to_string(),
        })
    }

    fn set_root_position(&mut self, avatar_id: &str, position: Vector3) -> AccessResult<()> {
        self.call_done(SkeletonRequest::SetRootPosition {
            avatar_id: avatar_id.to_string(),
            position,
        })
    }

    fn set_root_rotation(&mut self, avatar_id: &str, rotation: Quaternion) -> AccessResult<()> {
        self.call_done(SkeletonRequest::SetRootRotation {
            avatar_id: avatar_id.to_string(),
            rotation,
        })
    }
}
