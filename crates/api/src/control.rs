use async_trait::async_trait;
use relay_domain::{ObservedRequest, StatusReply};
use relay_errors::RelayResult;
use relay_worker::StatusService;

/// What the HTTP boundary needs from the worker.
#[async_trait]
pub trait WorkerControl: Send + Sync {
    async fn status(&self) -> StatusReply;

    async fn run_now(&self) -> StatusReply;

    fn ping(&self) -> RelayResult<()>;

    fn observe(&self, request: ObservedRequest) -> RelayResult<()>;
}

#[async_trait]
impl WorkerControl for StatusService {
    async fn status(&self) -> StatusReply {
        StatusService::status(self).await
    }

    async fn run_now(&self) -> StatusReply {
        StatusService::run_now(self).await
    }

    fn ping(&self) -> RelayResult<()> {
        StatusService::ping(self)
    }

    fn observe(&self, request: ObservedRequest) -> RelayResult<()> {
        StatusService::observe(self, request)
    }
}
