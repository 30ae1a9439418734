use std::{marker::PhantomData, time::Duration};

use cosim_shared::{
    protocol::{self, Operation},
    AccessError, AccessResult, ClientConfig, ServiceAddress,
};
use serde::{de::DeserializeOwned, Serialize};
use tokio::{net::TcpStream, runtime::Runtime};
use tracing::{debug, warn};

/// Blocking request/reply client over one TCP connection.
///
/// Wraps a current-thread tokio runtime so callers on a plain simulation thread can
/// issue calls synchronously. Calls are strictly sequential; a transport failure or
/// timeout drops the connection, after which calls fail with
/// [`AccessError::NotConnected`] until [`RpcClient::reconnect`] succeeds.
pub struct RpcClient<Req, Resp> {
    runtime: Runtime,
    stream: Option<TcpStream>,
    config: ClientConfig,
    next_id: u64,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> std::fmt::Debug for RpcClient<Req, Resp> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("address", &self.config.address)
            .field("connected", &self.stream.is_some())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl<Req, Resp> RpcClient<Req, Resp>
where
    Req: Serialize + Operation,
    Resp: DeserializeOwned,
{
    pub fn connect(config: &ClientConfig) -> AccessResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let mut client = Self {
            runtime,
            stream: None,
            config: config.clone(),
            next_id: 1,
            _marker: PhantomData,
        };
        client.reconnect()?;
        Ok(client)
    }

    /// Opens a fresh connection, replacing the current one.
    pub fn reconnect(&mut self) -> AccessResult<()> {
        self.stream = None;
        let addr = self.config.address.resolve()?;
        let connect_timeout = self.config.connect_timeout();

        let stream = self
            .runtime
            .block_on(async { tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await })
            .map_err(|_| AccessError::Timeout(connect_timeout))??;
        stream.set_nodelay(true)?;

        debug!(address = %self.config.address, "rpc connection established");
        self.stream = Some(stream);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn address(&self) -> &ServiceAddress {
        &self.config.address
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.config.request_timeout()
    }

    pub fn call(&mut self, request: Req) -> AccessResult<Resp> {
        let operation = request.operation();
        let stream = self.stream.as_mut().ok_or(AccessError::NotConnected)?;
        let id = self.next_id;
        self.next_id += 1;

        let exchange = protocol::exchange(stream, id, request, self.config.max_frame_bytes);
        let result = match self.config.request_timeout() {
            Some(limit) => self
                .runtime
                .block_on(async { tokio::time::timeout(limit, exchange).await })
                .unwrap_or_else(|_| Err(AccessError::Timeout(limit))),
            None => self.runtime.block_on(exchange),
        };

        if let Err(err) = &result {
            if err.is_transport() {
                warn!(
                    address = %self.config.address,
                    operation,
                    error = %err,
                    "rpc call failed, dropping connection"
                );
                self.stream = None;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosim_shared::protocol::{
        codec, Envelope, MotionUnitRequest, MotionUnitResponse, Reply, DEFAULT_MAX_FRAME_SIZE,
    };

    /// Serves one connection, answering every request with a reply for a different id.
    fn spawn_out_of_step_server() -> (ServiceAddress, std::thread::JoinHandle<()>) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = ServiceAddress::from(listener.local_addr().unwrap());

        let server = std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                let (mut stream, _) = listener.accept().await.unwrap();
                while let Ok(request) = codec::recv_frame::<_, Envelope<MotionUnitRequest>>(
                    &mut stream,
                    DEFAULT_MAX_FRAME_SIZE,
                )
                .await
                {
                    let reply = Envelope::new(
                        request.id + 7,
                        Reply::Ok(MotionUnitResponse::Checkpoint(Vec::new())),
                    );
                    if codec::send_frame(&mut stream, &reply).await.is_err() {
                        break;
                    }
                }
            });
        });
        (addr, server)
    }

    #[test_log::test]
    fn mismatched_reply_id_drops_the_connection() {
        let (addr, server) = spawn_out_of_step_server();
        let mut client: RpcClient<MotionUnitRequest, MotionUnitResponse> =
            RpcClient::connect(&ClientConfig::for_address(addr)).unwrap();

        match client.call(MotionUnitRequest::CreateCheckpoint) {
            Err(AccessError::ReplyMismatch {
                expected, received, ..
            }) => assert_eq!(received, expected + 7),
            other => panic!("expected reply mismatch, got {other:?}"),
        }
        assert!(!client.is_connected());
        assert!(matches!(
            client.call(MotionUnitRequest::CreateCheckpoint),
            Err(AccessError::NotConnected)
        ));

        drop(client);
        server.join().unwrap();
    }
}
