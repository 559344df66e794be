//! Experiment service for split testing
//!
//! Assigns each visitor a weighted random variant of an experiment, keeps that
//! assignment sticky through the backend and scores conversions against it.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::experiment::{
    parse_variants, ConfigurationError, Experiment, ExperimentBackend, ExperimentName, Identity,
    IdentityProvider, ParsedVariants, SplitError, VariantSpec,
};
use crate::domain::DomainError;
use crate::infrastructure::experiment::{select_weighted, RandomSource, ThreadRandomSource};

/// Split engine over an experiment backend and an identity provider
///
/// Holds no mutable state of its own; stickiness and first-writer-wins come
/// from the backend.
pub struct ExperimentService<B: ExperimentBackend, I: IdentityProvider> {
    backend: Arc<B>,
    identity: Arc<I>,
    random: Arc<dyn RandomSource>,
}

impl<B: ExperimentBackend, I: IdentityProvider> fmt::Debug for ExperimentService<B, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentService")
            .field("random", &self.random)
            .finish_non_exhaustive()
    }
}

impl<B: ExperimentBackend, I: IdentityProvider> ExperimentService<B, I> {
    /// Create a new experiment service drawing from the thread-local generator
    pub fn new(backend: Arc<B>, identity: Arc<I>) -> Self {
        Self {
            backend,
            identity,
            random: Arc::new(ThreadRandomSource),
        }
    }

    /// Replace the randomness used for new assignments
    pub fn with_random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Resolve the visitor identity for this request
    pub fn identity(&self, context: &I::Context) -> Result<Identity, DomainError> {
        self.identity.identity(context)
    }

    /// Return the value of the variant assigned to this visitor
    ///
    /// The first call for a visitor draws a variant by weight and persists
    /// it; later calls return the same variant's value.
    pub async fn split(
        &self,
        context: &I::Context,
        experiment_name: &str,
        variants: Vec<VariantSpec>,
    ) -> Result<Value, SplitError> {
        let name = ExperimentName::new(experiment_name);
        let parsed = parse_variants(variants)?;

        self.ensure_experiment(&name, &parsed).await?;

        let identity = self.identity.identity(context)?;
        let key = self.assigned_variant(&identity, &name, &parsed).await?;

        debug!(experiment = %name, identity = %identity, variant = %key, "Variant resolved");

        parsed
            .into_value(&key)
            .ok_or_else(|| SplitError::UnknownAssignedVariant {
                experiment: name.to_string(),
                variant: key,
            })
    }

    /// Two-way `True`/`False` split returning the assigned flag
    pub async fn split_flag(
        &self,
        context: &I::Context,
        experiment_name: &str,
    ) -> Result<bool, SplitError> {
        let value = self.split(context, experiment_name, Vec::new()).await?;
        Ok(value == Value::Bool(true))
    }

    /// Record a conversion for this visitor's assigned variant
    ///
    /// A visitor that was never assigned is passed on to the backend with no
    /// variant; it is not an error here.
    pub async fn score(&self, context: &I::Context, experiment_name: &str) -> Result<(), SplitError> {
        let name = ExperimentName::new(experiment_name);
        let identity = self.identity.identity(context)?;
        let variant = self.backend.get_variant(&identity, &name).await?;

        debug!(
            experiment = %name,
            identity = %identity,
            variant = ?variant,
            "Scoring conversion"
        );

        self.backend.score(&name, variant).await?;
        Ok(())
    }

    /// Make sure the experiment exists with exactly the declared variant keys
    async fn ensure_experiment(
        &self,
        name: &ExperimentName,
        parsed: &ParsedVariants,
    ) -> Result<(), SplitError> {
        if let Some(existing) = self.backend.get_experiment(name).await? {
            return Self::check_variants(&existing, parsed);
        }

        self.backend.save_experiment(name, parsed.keys()).await?;

        // the stored copy wins over what this caller declared
        let stored = self
            .backend
            .get_experiment(name)
            .await?
            .ok_or_else(|| SplitError::ExperimentNotPersisted(name.to_string()))?;

        if !stored.has_variants(parsed.keys()) {
            warn!(
                experiment = %name,
                declared = ?parsed.keys(),
                stored = ?stored.variants(),
                "Experiment created concurrently with different variants"
            );
        } else {
            info!(experiment = %name, variants = ?parsed.keys(), "Experiment created");
        }

        Self::check_variants(&stored, parsed)
    }

    fn check_variants(existing: &Experiment, parsed: &ParsedVariants) -> Result<(), SplitError> {
        if existing.has_variants(parsed.keys()) {
            return Ok(());
        }

        Err(ConfigurationError::VariantMismatch {
            name: existing.name().to_string(),
            existing: existing.variants().to_vec(),
        }
        .into())
    }

    /// Stored variant for this visitor, drawing and persisting one if absent
    async fn assigned_variant(
        &self,
        identity: &Identity,
        name: &ExperimentName,
        parsed: &ParsedVariants,
    ) -> Result<String, SplitError> {
        if let Some(variant) = self.backend.get_variant(identity, name).await? {
            return Ok(variant);
        }

        let drawn = select_weighted(parsed.keys(), parsed.weights(), self.random.as_ref())?.clone();
        self.backend.participate(identity, name, &drawn).await?;

        // a concurrent first request for the same visitor may have won
        let variant = self
            .backend
            .get_variant(identity, name)
            .await?
            .unwrap_or(drawn);

        info!(experiment = %name, identity = %identity, variant = %variant, "Visitor assigned");

        Ok(variant)
    }
}
