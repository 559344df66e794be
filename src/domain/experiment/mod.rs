//! Experiment domain module for split testing
//!
//! Types and contracts for assigning visitors to weighted experiment variants,
//! keeping those assignments sticky and scoring conversions against them.

mod backend;
mod entity;
mod error;
mod identity;
mod variant;

// Re-export all public types
pub use backend::ExperimentBackend;
pub use entity::{
    Conversion, ConversionId, Experiment, ExperimentName, Identity, Participation,
    ParticipationKey,
};
pub use error::{ConfigurationError, SplitError};
pub use identity::{AttributeIdentityProvider, IdentityFn, IdentityProvider, RequestAttributes};
pub use variant::{default_variants, parse_variants, ParsedVariants, VariantSpec, DEFAULT_WEIGHT};

#[cfg(test)]
pub use backend::MockExperimentBackend;
