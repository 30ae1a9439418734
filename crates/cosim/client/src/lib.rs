//! Client side of the co-simulation: remote proxies and the stepping bridge.

pub mod avatar;
pub mod cosimulation;
pub mod motion_unit;
pub mod rpc;
pub mod skeleton;

pub use avatar::{Avatar, AvatarSink, PostureError, SharedAvatar};
pub use cosimulation::{
    BridgeState, CoSimError, CoSimResult, DeliveryReport, RemoteCoSimulation, SubscriptionId,
};
pub use motion_unit::RemoteMotionUnit;
pub use rpc::RpcClient;
pub use skeleton::RemoteSkeletonAccess;
