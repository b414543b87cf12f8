//! Background worker that turns queued product links into affiliate links.

pub mod components;
pub mod internal_api;
pub mod session;
pub mod shutdown;

pub use components::{
    event_channel, EventDispatcher, EventSender, HeaderHarvester, HostEvent, KeepAliveManager,
    QueueClient, StatusService, WorkerCycle,
};
pub use internal_api::InternalApiBridge;
pub use session::{BrowserSession, JarCookieStore, SessionTabHost};
pub use shutdown::ShutdownManager;
