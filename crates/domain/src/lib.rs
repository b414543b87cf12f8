pub mod entities;
pub mod match_pattern;
pub mod ports;
pub mod status;

pub use entities::*;
pub use match_pattern::MatchPattern;
pub use ports::*;
pub use relay_errors::{ConversionErrorKind, RelayError, RelayResult};
pub use status::*;
