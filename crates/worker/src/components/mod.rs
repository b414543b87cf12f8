pub mod dispatcher;
pub mod header_harvester;
pub mod keepalive;
pub mod queue_client;
pub mod status_service;
pub mod worker_cycle;

pub use dispatcher::{event_channel, EventDispatcher, EventSender, HostEvent};
pub use header_harvester::HeaderHarvester;
pub use keepalive::KeepAliveManager;
pub use queue_client::QueueClient;
pub use status_service::StatusService;
pub use worker_cycle::WorkerCycle;
