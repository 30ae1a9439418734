use std::sync::{Arc, Mutex};

use cosim_shared::{config::HostConfig, MotionUnitAccess, ServiceDescription};

use crate::{controller::ServiceController, processor::MotionUnitProcessor};

/// Host for a local motion unit, published under the configured service name.
pub fn motion_unit_server<T>(unit: T, config: &HostConfig) -> ServiceController<MotionUnitProcessor<T>>
where
    T: MotionUnitAccess + 'static,
{
    shared_motion_unit_server(Arc::new(Mutex::new(unit)), config)
}

/// Like [`motion_unit_server`], keeping a handle on the unit for the hosting side.
pub fn shared_motion_unit_server<T>(
    unit: Arc<Mutex<T>>,
    config: &HostConfig,
) -> ServiceController<MotionUnitProcessor<T>>
where
    T: MotionUnitAccess + 'static,
{
    let description = ServiceDescription::new(config.service_name.clone(), config.language.clone());
    ServiceController::new(
        description,
        config.register_address.clone(),
        MotionUnitProcessor::shared(unit),
        config.clone(),
    )
}
