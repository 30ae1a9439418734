use std::{
    any::Any,
    net::SocketAddr,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};

use cosim_shared::{
    config::{ClientConfig, HostConfig},
    protocol::{codec, Envelope, FrameError, Operation, Reply},
    ServiceAddress, ServiceDescription,
};
use tokio::{
    net::{TcpListener, TcpStream},
    runtime::{Handle, Runtime},
    sync::oneshot,
    task::JoinHandle,
};
use tracing::{debug, info, trace, warn};

use crate::{processor::Processor, registry};

#[derive(thiserror::Error, Debug)]
pub enum HostError {
    #[error("service host already started")]
    AlreadyStarted,
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: ServiceAddress,
        #[source]
        source: std::io::Error,
    },
    #[error("host runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

struct Running {
    runtime: Runtime,
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    accept_task: JoinHandle<()>,
    registration: Option<JoinHandle<()>>,
}

/// What teardown needs once the controller has let go of its running state.
struct Teardown {
    service: String,
    id: String,
    registry: Option<(ServiceAddress, ClientConfig)>,
    timeout: Duration,
}

/// Hosts one service on a background tokio runtime.
///
/// `start` returns once the listener is bound; connections are then served on the
/// runtime's workers until `dispose` (or drop). Requests on one connection are processed
/// one after another, so a client observes its calls in the order it issued them.
pub struct ServiceController<P: Processor> {
    description: ServiceDescription,
    register_address: Option<ServiceAddress>,
    processor: Arc<P>,
    config: HostConfig,
    running: Option<Running>,
}

impl<P: Processor> std::fmt::Debug for ServiceController<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceController")
            .field("service", &self.description.name)
            .field("id", &self.description.id)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

impl<P: Processor> ServiceController<P> {
    pub fn new(
        description: ServiceDescription,
        register_address: Option<ServiceAddress>,
        processor: P,
        config: HostConfig,
    ) -> Self {
        Self {
            description,
            register_address,
            processor: Arc::new(processor),
            config,
            running: None,
        }
    }

    pub fn description(&self) -> &ServiceDescription {
        &self.description
    }

    pub fn processor(&self) -> &Arc<P> {
        &self.processor
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Binds the listener and starts serving in the background.
    ///
    /// The bound address replaces the addresses of the service description. When a
    /// registry address is configured the description is published to it in the
    /// background; a failed registration is logged and not retried.
    pub fn start(&mut self) -> Result<SocketAddr, HostError> {
        if self.running.is_some() {
            return Err(HostError::AlreadyStarted);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.worker_threads.max(1))
            .thread_name(format!("{}-host", self.description.name))
            .enable_all()
            .build()?;

        let listen = self.config.listen.clone();
        let listener = bind(&listen).map_err(|source| HostError::Bind {
            address: listen.clone(),
            source,
        })?;
        let local_addr = listener.local_addr()?;
        let listener = {
            let _entered = runtime.enter();
            TcpListener::from_std(listener)?
        };
        self.description.addresses = vec![ServiceAddress::from(local_addr)];

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let accept_task = runtime.spawn(accept_loop(
            listener,
            Arc::clone(&self.processor),
            self.config.max_frame_bytes,
            shutdown_rx,
        ));

        let registration = self.register_address.clone().map(|registry_address| {
            let description = self.description.clone();
            let client = self.registry_client_config(&registry_address);
            runtime.spawn(async move {
                let id = description.id.clone();
                match registry::register(&registry_address, description, &client).await {
                    Ok(response) if response.successful => {
                        debug!(registry = %registry_address, id = %id, "service registered");
                    }
                    Ok(response) => warn!(
                        registry = %registry_address,
                        id = %id,
                        message = response.message.as_deref().unwrap_or_default(),
                        "registry rejected service"
                    ),
                    Err(err) => warn!(
                        registry = %registry_address,
                        id = %id,
                        error = %err,
                        "service registration failed"
                    ),
                }
            })
        });

        info!(
            service = %self.description.name,
            id = %self.description.id,
            %local_addr,
            "service host started"
        );
        self.running = Some(Running {
            runtime,
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            accept_task,
            registration,
        });
        Ok(local_addr)
    }

    /// Stops serving and releases the listener. Never fails: teardown problems,
    /// including panics, are logged and swallowed.
    ///
    /// A registration still in flight is finished (or abandoned after the shutdown
    /// timeout) before the service is unregistered, so a disposed host never stays
    /// listed. Safe to call from inside an async context.
    pub fn dispose(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let teardown = Teardown {
            service: self.description.name.clone(),
            id: self.description.id.clone(),
            registry: self.register_address.clone().map(|registry_address| {
                let client = self.registry_client_config(&registry_address);
                (registry_address, client)
            }),
            timeout: self.config.shutdown_timeout(),
        };

        if Handle::try_current().is_ok() {
            // Blocking on the host runtime is not allowed from an async context.
            std::thread::scope(|scope| {
                let _ = scope.spawn(|| teardown.run(running)).join();
            });
        } else {
            teardown.run(running);
        }
    }

    fn registry_client_config(&self, registry_address: &ServiceAddress) -> ClientConfig {
        ClientConfig {
            max_frame_bytes: self.config.max_frame_bytes,
            ..ClientConfig::for_address(registry_address.clone())
        }
    }
}

impl<P: Processor> Drop for ServiceController<P> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Teardown {
    fn run(&self, mut running: Running) {
        if let Some(registration) = running.registration.take() {
            self.finish_registration(&running.runtime, registration);
        }
        if let Some((registry_address, client)) = &self.registry {
            self.unregister(&running.runtime, registry_address, client);
        }

        if let Some(shutdown) = running.shutdown_tx.take() {
            let _ = shutdown.send(());
        }
        running.accept_task.abort();

        let timeout = self.timeout;
        let runtime = running.runtime;
        if let Err(payload) = catch_unwind(AssertUnwindSafe(move || {
            runtime.shutdown_timeout(timeout)
        })) {
            warn!(
                service = %self.service,
                panic = %panic_message(payload.as_ref()),
                "service host runtime shutdown panicked"
            );
        }
        info!(service = %self.service, id = %self.id, "service host disposed");
    }

    fn finish_registration(&self, runtime: &Runtime, mut registration: JoinHandle<()>) {
        let finished = catch_unwind(AssertUnwindSafe(|| {
            runtime.block_on(async {
                tokio::time::timeout(self.timeout, &mut registration).await
            })
        }));
        match finished {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => {
                registration.abort();
                debug!(id = %self.id, "registration still pending, abandoned");
            }
            Err(payload) => {
                registration.abort();
                warn!(
                    id = %self.id,
                    panic = %panic_message(payload.as_ref()),
                    "waiting for registration panicked"
                );
            }
        }
    }

    fn unregister(
        &self,
        runtime: &Runtime,
        registry_address: &ServiceAddress,
        client: &ClientConfig,
    ) {
        let id = &self.id;
        let unregistered = catch_unwind(AssertUnwindSafe(|| {
            runtime.block_on(async {
                tokio::time::timeout(
                    self.timeout,
                    registry::unregister(registry_address, id, client),
                )
                .await
            })
        }));
        match unregistered {
            Ok(Ok(Ok(response))) if response.successful => {
                debug!(registry = %registry_address, id = %id, "service unregistered")
            }
            Ok(Ok(Ok(response))) => debug!(
                registry = %registry_address,
                id = %id,
                message = response.message.as_deref().unwrap_or_default(),
                "registry refused unregistration"
            ),
            Ok(Ok(Err(err))) => {
                debug!(registry = %registry_address, id = %id, error = %err, "unregistration failed")
            }
            Ok(Err(_)) => debug!(registry = %registry_address, id = %id, "unregistration timed out"),
            Err(payload) => warn!(
                id = %id,
                panic = %panic_message(payload.as_ref()),
                "unregistration panicked"
            ),
        }
    }
}

fn bind(listen: &ServiceAddress) -> std::io::Result<std::net::TcpListener> {
    let listener = std::net::TcpListener::bind(listen.resolve()?)?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

async fn accept_loop<P: Processor>(
    listener: TcpListener,
    processor: Arc<P>,
    max_frame_bytes: usize,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if let Err(err) = stream.set_nodelay(true) {
                        trace!(%peer, error = %err, "set_nodelay failed");
                    }
                    debug!(%peer, "connection accepted");
                    tokio::spawn(serve_connection(
                        stream,
                        peer,
                        Arc::clone(&processor),
                        max_frame_bytes,
                    ));
                }
                Err(err) => warn!(error = %err, "accept failed"),
            },
        }
    }
    debug!("accept loop stopped");
}

async fn serve_connection<P: Processor>(
    mut stream: TcpStream,
    peer: SocketAddr,
    processor: Arc<P>,
    max_frame_bytes: usize,
) {
    loop {
        let request: Envelope<P::Request> =
            match codec::recv_frame(&mut stream, max_frame_bytes).await {
                Ok(request) => request,
                Err(FrameError::Closed) => {
                    debug!(%peer, "connection closed");
                    break;
                }
                Err(err) => {
                    warn!(%peer, error = %err, "dropping connection after bad frame");
                    break;
                }
            };

        let id = request.id;
        let operation = request.payload.operation();
        trace!(%peer, id, operation, "request received");

        let worker = Arc::clone(&processor);
        let reply = match tokio::task::spawn_blocking(move || worker.process(request.payload)).await
        {
            Ok(reply) => reply,
            Err(err) if err.is_panic() => {
                let message = panic_message(err.into_panic().as_ref());
                warn!(%peer, id, operation, panic = %message, "processor panicked");
                Reply::Fault(format!("{operation} panicked: {message}"))
            }
            Err(err) => Reply::Fault(format!("{operation} cancelled: {err}")),
        };

        if let Err(err) = codec::send_frame(&mut stream, &Envelope::new(id, reply)).await {
            warn!(%peer, id, operation, error = %err, "failed to send reply");
            break;
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
