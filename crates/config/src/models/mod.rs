pub mod app_config;
pub mod backend_worker;
pub mod internal_api;
pub mod logging;
pub mod runtime;

pub use app_config::*;
pub use backend_worker::*;
pub use internal_api::*;
pub use logging::*;
pub use runtime::*;
