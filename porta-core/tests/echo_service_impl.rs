use echo_service::EchoService;
use echo_service::pb::{EchoRequest, EchoResponse};
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

/// Echo server driven entirely in-process by the tests.
///
/// `ServerStreamingEcho` emits `count` numbered copies of the message
/// (three when `count` is zero); a message of `"die"` produces one good
/// frame and then an error status, and `"stall"` produces one good frame
/// and then goes quiet without closing the stream. `DelayedEcho` never
/// answers within any reasonable deadline.
pub struct EchoServiceImpl;

#[tonic::async_trait]
impl EchoService for EchoServiceImpl {
    type ServerStreamingEchoStream = ReceiverStream<Result<EchoResponse, Status>>;

    async fn unary_echo(
        &self,
        request: Request<EchoRequest>,
    ) -> Result<Response<EchoResponse>, Status> {
        Ok(Response::new(EchoResponse {
            message: request.into_inner().message,
        }))
    }

    async fn server_streaming_echo(
        &self,
        request: Request<EchoRequest>,
    ) -> Result<Response<Self::ServerStreamingEchoStream>, Status> {
        let req = request.into_inner();
        let count = if req.count == 0 { 3 } else { req.count };
        let (tx, rx) = tokio::sync::mpsc::channel(4);

        tokio::spawn(async move {
            if req.message == "die" {
                let one = EchoResponse {
                    message: "die - seq 0".to_string(),
                };
                tx.send(Ok(one)).await.ok();
                tx.send(Err(Status::internal("boom"))).await.ok();
                return;
            }
            if req.message == "stall" {
                let one = EchoResponse {
                    message: "stall - seq 0".to_string(),
                };
                tx.send(Ok(one)).await.ok();
                // Keep tx alive so the stream never half-closes.
                tokio::time::sleep(Duration::from_secs(60)).await;
                return;
            }
            for i in 0..count {
                let response = EchoResponse {
                    message: format!("{} - seq {}", req.message, i),
                };
                if tx.send(Ok(response)).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn delayed_echo(
        &self,
        request: Request<EchoRequest>,
    ) -> Result<Response<EchoResponse>, Status> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Response::new(EchoResponse {
            message: request.into_inner().message,
        }))
    }
}
