use cosim_shared::{
    model::{AvatarPostureValues, SimulationResult, SimulationState},
    protocol::{
        codec, exchange, Envelope, MotionUnitRequest, MotionUnitResponse, Reply,
        DEFAULT_MAX_FRAME_SIZE,
    },
    AccessError,
};
use tokio::net::{TcpListener, TcpStream};

/// Answers each step with a posture carrying the step time, and faults on everything else.
async fn serve_one(listener: TcpListener) {
    let (mut stream, _) = listener.accept().await.unwrap();
    loop {
        let request: Envelope<MotionUnitRequest> =
            match codec::recv_frame(&mut stream, DEFAULT_MAX_FRAME_SIZE).await {
                Ok(request) => request,
                Err(_) => return,
            };
        let reply = match &request.payload {
            MotionUnitRequest::DoStep { time, .. } => Reply::Ok(MotionUnitResponse::Step(
                SimulationResult::new(AvatarPostureValues::new("a1", vec![*time])),
            )),
            _ => Reply::Fault("unsupported".to_string()),
        };
        codec::send_frame(&mut stream, &request.reply(reply))
            .await
            .unwrap();
    }
}

#[test_log::test(tokio::test)]
async fn sequential_calls_keep_their_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_one(listener));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    for (id, time) in [0.01, 0.02, 0.03].into_iter().enumerate() {
        let request = MotionUnitRequest::DoStep {
            time,
            state: SimulationState::default(),
        };
        let response: MotionUnitResponse =
            exchange(&mut stream, id as u64, request, DEFAULT_MAX_FRAME_SIZE)
                .await
                .unwrap();
        match response {
            MotionUnitResponse::Step(result) => assert_eq!(result.posture.posture_data, vec![time]),
            other => panic!("unexpected response {other:?}"),
        }
    }

    let fault = exchange::<_, _, MotionUnitResponse>(
        &mut stream,
        9,
        MotionUnitRequest::CreateCheckpoint,
        DEFAULT_MAX_FRAME_SIZE,
    )
    .await;
    assert!(matches!(fault, Err(AccessError::Remote(message)) if message == "unsupported"));

    drop(stream);
    server.await.unwrap();
}
