use std::{net::TcpListener, sync::Arc, time::Duration};

use cosim_server::{
    registry, registry_server, skeleton_access_server, HostError, Processor, ServiceController,
    ServiceRegistry, SkeletonStore,
};
use cosim_shared::{
    config::{ClientConfig, HostConfig},
    protocol::{RegistryRequest, RegistryResponse, Reply},
    AccessError, ServiceAddress, ServiceDescription,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

struct Grumpy;

impl Processor for Grumpy {
    type Request = RegistryRequest;
    type Response = RegistryResponse;

    fn process(&self, request: RegistryRequest) -> Reply<RegistryResponse> {
        match request {
            RegistryRequest::List => panic!("listing is broken"),
            _ => Reply::Fault("read-only".into()),
        }
    }
}

#[test_log::test]
fn start_publishes_bound_address() {
    let registry = Arc::new(ServiceRegistry::new());
    let mut host = registry_server(registry, &HostConfig::default());
    assert!(host.local_addr().is_none());

    let addr = host.start().unwrap();
    assert_ne!(addr.port(), 0);
    assert_eq!(host.local_addr(), Some(addr));
    assert_eq!(host.description().addresses, vec![ServiceAddress::from(addr)]);
    assert!(matches!(host.start(), Err(HostError::AlreadyStarted)));
}

#[test_log::test]
fn bind_failures_are_returned() {
    let taken = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    let config = HostConfig {
        listen: ServiceAddress::localhost(port),
        ..HostConfig::default()
    };

    let mut host = registry_server(Arc::new(ServiceRegistry::new()), &config);
    match host.start() {
        Err(HostError::Bind { address, .. }) => assert_eq!(address.port, port),
        other => panic!("expected bind error, got {other:?}"),
    }
    assert!(!host.is_running());
}

#[test_log::test]
fn dispose_is_idempotent_and_releases_the_port() {
    let mut host = registry_server(Arc::new(ServiceRegistry::new()), &HostConfig::default());
    host.dispose();

    let addr = host.start().unwrap();
    host.dispose();
    host.dispose();
    assert!(!host.is_running());

    TcpListener::bind(addr).unwrap();
}

#[test_log::test]
fn registry_round_trip() {
    let registry = Arc::new(ServiceRegistry::new());
    let mut host = registry_server(Arc::clone(&registry), &HostConfig::default());
    let addr = ServiceAddress::from(host.start().unwrap());
    let client = ClientConfig::for_address(addr.clone());
    let rt = runtime();

    let description = ServiceDescription::new("skeleton", "Rust")
        .with_address(ServiceAddress::localhost(9200));
    let id = description.id.clone();
    assert!(rt
        .block_on(registry::register(&addr, description, &client))
        .unwrap()
        .successful);

    let services = rt.block_on(registry::list(&addr, &client)).unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].addresses, vec![ServiceAddress::localhost(9200)]);

    let missing = rt
        .block_on(registry::unregister(&addr, "missing", &client))
        .unwrap();
    assert!(!missing.successful);
    assert!(rt
        .block_on(registry::unregister(&addr, &id, &client))
        .unwrap()
        .successful);
    assert!(registry.is_empty());
}

#[test_log::test]
fn processor_panics_become_faults() {
    let mut host = ServiceController::new(
        ServiceDescription::new("grumpy", "Rust"),
        None,
        Grumpy,
        HostConfig::default(),
    );
    let addr = ServiceAddress::from(host.start().unwrap());
    let client = ClientConfig::for_address(addr.clone());
    let rt = runtime();

    match rt.block_on(registry::list(&addr, &client)) {
        Err(AccessError::Remote(message)) => assert!(message.contains("listing is broken")),
        other => panic!("expected remote fault, got {other:?}"),
    }
    match rt.block_on(registry::unregister(&addr, "x", &client)) {
        Err(AccessError::Remote(message)) => assert_eq!(message, "read-only"),
        other => panic!("expected remote fault, got {other:?}"),
    }

    // The host keeps serving after a panic.
    assert!(matches!(
        rt.block_on(registry::list(&addr, &client)),
        Err(AccessError::Remote(_))
    ));
    host.dispose();
}

#[test_log::test]
fn disposed_hosts_never_stay_registered() {
    let registry = Arc::new(ServiceRegistry::new());
    let mut registry_host = registry_server(Arc::clone(&registry), &HostConfig::default());
    let registry_addr = ServiceAddress::from(registry_host.start().unwrap());
    let config = HostConfig {
        register_address: Some(registry_addr),
        ..HostConfig::default()
    };

    for _ in 0..50 {
        let mut host = skeleton_access_server(SkeletonStore::new().shared(), &config);
        host.start().unwrap();
        host.dispose();
    }

    assert!(registry.is_empty(), "stale services: {:?}", registry.list());
    registry_host.dispose();
}

#[test_log::test(tokio::test)]
async fn hosts_start_and_dispose_inside_async_context() {
    let registry = Arc::new(ServiceRegistry::new());
    let mut registry_host = registry_server(Arc::clone(&registry), &HostConfig::default());
    let registry_addr = ServiceAddress::from(registry_host.start().unwrap());
    let config = HostConfig {
        register_address: Some(registry_addr.clone()),
        ..HostConfig::default()
    };

    let mut host = skeleton_access_server(SkeletonStore::new().shared(), &config);
    host.start().unwrap();

    let client = ClientConfig::for_address(registry_addr);
    let mut listed = Vec::new();
    for _ in 0..100 {
        listed = registry::list(&client.address, &client).await.unwrap();
        if !listed.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, host.description().id);

    host.dispose();
    assert!(!host.is_running());
    assert!(registry.is_empty());
    registry_host.dispose();
}
