//! Domain layer - Core business logic and entities

pub mod error;
pub mod experiment;
pub mod storage;

pub use error::DomainError;
pub use experiment::{
    ConfigurationError, Experiment, ExperimentBackend, ExperimentName, Identity,
    IdentityProvider, ParsedVariants, SplitError, VariantSpec,
};
pub use storage::{Storage, StorageEntity, StorageKey};
