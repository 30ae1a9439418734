//! Request/reply protocol spoken between co-simulation clients and hosted services.
//!
//! Every call is one request frame answered by exactly one reply frame on the same
//! connection; a connection never has more than one call in flight.

pub mod codec;
pub mod envelope;
pub mod messages;

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::trace;

use crate::error::{AccessError, AccessResult};

pub use codec::{FrameError, DEFAULT_MAX_FRAME_SIZE};
pub use envelope::Envelope;
pub use messages::{
    MotionUnitRequest, MotionUnitResponse, Operation, RegistryRequest, RegistryResponse, Reply,
    SkeletonRequest, SkeletonResponse,
};

/// Sends `request` and waits for the matching reply.
pub async fn exchange<S, Req, Resp>(
    stream: &mut S,
    id: u64,
    request: Req,
    max_frame_size: usize,
) -> AccessResult<Resp>
where
    S: AsyncRead + AsyncWrite + Unpin,
    Req: Serialize + Operation,
    Resp: DeserializeOwned,
{
    let operation = request.operation();
    trace!(operation, id, "sending request");
    codec::send_frame(stream, &Envelope::new(id, request)).await?;

    let reply: Envelope<Reply<Resp>> = codec::recv_frame(stream, max_frame_size).await?;
    if reply.id != id {
        return Err(AccessError::ReplyMismatch {
            operation,
            expected: id,
            received: reply.id,
        });
    }
    trace!(operation, id, "reply received");

    match reply.payload {
        Reply::Ok(response) => Ok(response),
        Reply::Fault(message) => Err(AccessError::Remote(message)),
    }
}

/// Error for a well-formed reply of the wrong kind.
pub fn unexpected(operation: &'static str, received: &impl Operation) -> AccessError {
    AccessError::UnexpectedResponse {
        operation,
        received: received.operation().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoolResponse;
    use tokio::io::duplex;

    #[tokio::test]
    async fn exchange_maps_fault_to_remote_error() {
        let (mut client, mut server) = duplex(64 * 1024);

        let serve = tokio::spawn(async move {
            let request: Envelope<RegistryRequest> =
                codec::recv_frame(&mut server, DEFAULT_MAX_FRAME_SIZE)
                    .await
                    .unwrap();
            let reply: Envelope<Reply<RegistryResponse>> =
                request.reply(Reply::Fault("registry offline".into()));
            codec::send_frame(&mut server, &reply).await.unwrap();
        });

        let result: AccessResult<RegistryResponse> =
            exchange(&mut client, 1, RegistryRequest::List, DEFAULT_MAX_FRAME_SIZE).await;
        serve.await.unwrap();

        assert!(matches!(result, Err(AccessError::Remote(m)) if m == "registry offline"));
    }

    #[tokio::test]
    async fn exchange_rejects_mismatched_reply_id() {
        let (mut client, mut server) = duplex(64 * 1024);

        let serve = tokio::spawn(async move {
            let _: Envelope<RegistryRequest> =
                codec::recv_frame(&mut server, DEFAULT_MAX_FRAME_SIZE)
                    .await
                    .unwrap();
            let reply = Envelope::new(99, Reply::Ok(RegistryResponse::Bool(BoolResponse::success())));
            codec::send_frame(&mut server, &reply).await.unwrap();
        });

        let result: AccessResult<RegistryResponse> =
            exchange(&mut client, 3, RegistryRequest::List, DEFAULT_MAX_FRAME_SIZE).await;
        serve.await.unwrap();

        match result {
            Err(err @ AccessError::ReplyMismatch { .. }) => {
                assert!(err.is_transport());
                assert!(matches!(
                    err,
                    AccessError::ReplyMismatch { operation: "list", expected: 3, received: 99 }
                ));
            }
            other => panic!("expected reply mismatch, got {other:?}"),
        }
    }
}
