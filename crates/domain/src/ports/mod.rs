pub mod host;
pub mod page;
pub mod queue;

pub use host::*;
pub use page::*;
pub use queue::*;
