//! Discovery registry: the service side plus the calls hosts use to publish themselves.

use std::sync::{Arc, Mutex};

use cosim_shared::{
    config::{ClientConfig, HostConfig},
    model::BoolResponse,
    protocol::{self, unexpected, RegistryRequest, RegistryResponse, Reply},
    AccessError, AccessResult, ServiceAddress, ServiceDescription,
};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::{controller::ServiceController, processor::Processor};

pub const REGISTRY_SERVICE_NAME: &str = "serviceRegistry";

/// Services currently published, in registration order.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: Mutex<Vec<ServiceDescription>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `description`, replacing an earlier registration with the same id.
    pub fn register(&self, description: ServiceDescription) -> BoolResponse {
        if description.id.trim().is_empty() {
            return BoolResponse::failure("service description has no id");
        }
        let mut services = match self.services.lock() {
            Ok(services) => services,
            Err(poisoned) => poisoned.into_inner(),
        };
        info!(
            id = %description.id,
            name = %description.name,
            language = %description.language,
            addresses = description.addresses.len(),
            "service registered"
        );
        match services.iter_mut().find(|s| s.id == description.id) {
            Some(existing) => *existing = description,
            None => services.push(description),
        }
        BoolResponse::success()
    }

    pub fn unregister(&self, service_id: &str) -> BoolResponse {
        let mut services = match self.services.lock() {
            Ok(services) => services,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = services.len();
        services.retain(|s| s.id != service_id);
        if services.len() == before {
            return BoolResponse::failure(format!("unknown service '{service_id}'"));
        }
        info!(id = service_id, "service unregistered");
        BoolResponse::success()
    }

    pub fn list(&self) -> Vec<ServiceDescription> {
        match self.services.lock() {
            Ok(services) => services.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn find_by_name(&self, name: &str) -> Vec<ServiceDescription> {
        self.list().into_iter().filter(|s| s.name == name).collect()
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct RegistryProcessor {
    registry: Arc<ServiceRegistry>,
}

impl RegistryProcessor {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }
}

impl Processor for RegistryProcessor {
    type Request = RegistryRequest;
    type Response = RegistryResponse;

    fn process(&self, request: RegistryRequest) -> Reply<RegistryResponse> {
        let response = match request {
            RegistryRequest::Register(description) => {
                RegistryResponse::Bool(self.registry.register(description))
            }
            RegistryRequest::Unregister { service_id } => {
                RegistryResponse::Bool(self.registry.unregister(&service_id))
            }
            RegistryRequest::List => RegistryResponse::Services(self.registry.list()),
        };
        Reply::Ok(response)
    }
}

/// Host serving `registry`. The registry never registers with another registry.
pub fn registry_server(
    registry: Arc<ServiceRegistry>,
    config: &HostConfig,
) -> ServiceController<RegistryProcessor> {
    let description = ServiceDescription::new(REGISTRY_SERVICE_NAME, config.language.clone());
    ServiceController::new(
        description,
        None,
        RegistryProcessor::new(registry),
        config.clone(),
    )
}

pub async fn register(
    registry: &ServiceAddress,
    description: ServiceDescription,
    config: &ClientConfig,
) -> AccessResult<BoolResponse> {
    match call(registry, RegistryRequest::Register(description), config).await? {
        RegistryResponse::Bool(response) => Ok(response.normalized()),
        other => Err(unexpected("register", &other)),
    }
}

pub async fn unregister(
    registry: &ServiceAddress,
    service_id: &str,
    config: &ClientConfig,
) -> AccessResult<BoolResponse> {
    let request = RegistryRequest::Unregister {
        service_id: service_id.to_string(),
    };
    match call(registry, request, config).await? {
        RegistryResponse::Bool(response) => Ok(response.normalized()),
        other => Err(unexpected("unregister", &other)),
    }
}

pub async fn list(
    registry: &ServiceAddress,
    config: &ClientConfig,
) -> AccessResult<Vec<ServiceDescription>> {
    match call(registry, RegistryRequest::List, config).await? {
        RegistryResponse::Services(services) => Ok(services),
        other => Err(unexpected("list", &other)),
    }
}

/// One-shot connection per call; registry traffic is rare.
async fn call(
    registry: &ServiceAddress,
    request: RegistryRequest,
    config: &ClientConfig,
) -> AccessResult<RegistryResponse> {
    let addr = registry.resolve()?;
    let connect_timeout = config.connect_timeout();
    let mut stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| AccessError::Timeout(connect_timeout))??;
    stream.set_nodelay(true)?;
    debug!(registry = %registry, "registry connection established");

    let exchange = protocol::exchange(&mut stream, 1, request, config.max_frame_bytes);
    match config.request_timeout() {
        Some(limit) => tokio::time::timeout(limit, exchange)
            .await
            .unwrap_or(Err(AccessError::Timeout(limit))),
        None => exchange.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_replaces_same_id() {
        let registry = ServiceRegistry::new();
        let mut description = ServiceDescription::new("unit", "Rust");
        assert!(registry.register(description.clone()).successful);

        description.name = "renamed".into();
        assert!(registry.register(description.clone()).successful);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find_by_name("renamed").len(), 1);
    }

    #[test]
    fn rejects_missing_id_and_unknown_unregister() {
        let registry = ServiceRegistry::new();
        let mut description = ServiceDescription::new("unit", "Rust");
        description.id.clear();
        let response = registry.register(description);
        assert!(!response.successful);
        assert!(response.message.is_some());

        let response = registry.unregister("missing");
        assert!(!response.successful);
        assert!(response.message.unwrap().contains("missing"));
    }

    #[test]
    fn processor_lists_registered_services() {
        let registry = Arc::new(ServiceRegistry::new());
        let processor = RegistryProcessor::new(Arc::clone(&registry));
        let description = ServiceDescription::new("skeleton", "Rust");
        let id = description.id.clone();
        processor.process(RegistryRequest::Register(description));

        match processor.process(RegistryRequest::List) {
            Reply::Ok(RegistryResponse::Services(services)) => {
                assert_eq!(services.len(), 1);
                assert_eq!(services[0].id, id);
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }
}
