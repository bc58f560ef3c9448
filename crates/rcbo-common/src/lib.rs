//! RCBO Common - Shared types, errors, and configuration

pub mod config;
pub mod error;
pub mod types;

pub use config::CostEstimatorConfig;
pub use error::{RcboError, Result};
pub use types::{PlanNodeId, Symbol};
