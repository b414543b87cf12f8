pub mod app;
pub mod common;

pub use relay_worker::shutdown;
