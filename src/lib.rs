//! PMP Split Engine
//!
//! Sticky weighted A/B assignment for server-side applications:
//! - Weighted random selection of experiment variants
//! - Write-once persistence of experiments and visitor assignments
//! - Conversion scoring against the assigned variant
//! - In-memory or PostgreSQL storage

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::experiment::{
    ConfigurationError, ExperimentBackend, Identity, IdentityProvider, SplitError, VariantSpec,
};
pub use domain::DomainError;
pub use infrastructure::experiment::StorageExperimentBackend;
pub use infrastructure::services::ExperimentService;
