pub mod config;
pub mod error;
pub mod frontier;
mod linalg;
pub mod optimizer;
pub mod returns;
pub mod types;

#[cfg(feature = "analysis")]
pub mod analysis;

pub use error::MarkowitzError;
pub use types::*;

/// Standard result type for all markowitz operations
pub type MarkowitzResult<T> = Result<T, MarkowitzError>;
