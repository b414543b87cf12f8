//! # Relay API
//!
//! Local HTTP boundary of the conversion worker. It lets an operator (or a
//! companion page) read the worker state and poke it:
//!
//! - `GET /health` - liveness of the process itself
//! - `GET /api/status` - status snapshot with a fresh backend health check
//! - `POST /api/run-now` - run a worker cycle and wait for its result
//! - `POST /api/keepalive/ping` - external keepalive ping
//! - `POST /api/traffic` - report an outbound request for header capture
//!
//! Every `/api` reply uses the `{ok, status?, result?, error?}` envelope.

pub mod control;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod server;

pub use control::WorkerControl;
pub use error::{ApiError, ApiResult};
pub use routes::{create_routes, AppState};
pub use server::serve;
