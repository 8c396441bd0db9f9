pub mod config;
pub mod construction;
pub mod debt;
pub mod error;
pub mod escalation;
pub mod numeric;
pub mod time_value;
pub mod types;

#[cfg(feature = "asset_mix")]
pub mod asset_mix;

#[cfg(feature = "sensitivity")]
pub mod sensitivity;

#[cfg(all(feature = "asset_mix", feature = "sensitivity"))]
pub mod feasibility;

pub use config::EngineConfig;
pub use error::FeasibilityError;
pub use types::*;

/// Standard result type for all feasibility operations
pub type FeasibilityResult<T> = Result<T, FeasibilityError>;
