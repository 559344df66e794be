//! Storage-backed experiment backend

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::experiment::{
    Conversion, Experiment, ExperimentBackend, ExperimentName, Identity, Participation,
    ParticipationKey,
};
use crate::domain::storage::Storage;
use crate::domain::DomainError;
use crate::infrastructure::storage::{InMemoryStorage, StorageFactory};

/// Table names used when the backend is built from a [`StorageFactory`]
pub const EXPERIMENTS_TABLE: &str = "split_experiments";
pub const PARTICIPATIONS_TABLE: &str = "split_participations";
pub const CONVERSIONS_TABLE: &str = "split_conversions";

/// [`ExperimentBackend`] over three generic storages
///
/// Experiments and participations are written with `create_if_absent`, so
/// the first writer wins and later writers are dropped without merging.
/// Scoring a visitor with no assignment records nothing.
#[derive(Debug)]
pub struct StorageExperimentBackend {
    experiments: Arc<dyn Storage<Experiment>>,
    participations: Arc<dyn Storage<Participation>>,
    conversions: Arc<dyn Storage<Conversion>>,
}

impl StorageExperimentBackend {
    pub fn new(
        experiments: Arc<dyn Storage<Experiment>>,
        participations: Arc<dyn Storage<Participation>>,
        conversions: Arc<dyn Storage<Conversion>>,
    ) -> Self {
        Self {
            experiments,
            participations,
            conversions,
        }
    }

    /// Backend that keeps everything in process memory
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryStorage::new()),
            Arc::new(InMemoryStorage::new()),
            Arc::new(InMemoryStorage::new()),
        )
    }

    /// Backend over storages created by the factory
    pub async fn from_factory(factory: &StorageFactory) -> Result<Self, DomainError> {
        Ok(Self::new(
            factory.create(EXPERIMENTS_TABLE).await?,
            factory.create(PARTICIPATIONS_TABLE).await?,
            factory.create(CONVERSIONS_TABLE).await?,
        ))
    }

    /// Visitors assigned per variant of `experiment`
    ///
    /// Scans the whole participation table; meant for reports, not the
    /// request path.
    pub async fn participant_counts(
        &self,
        experiment: &ExperimentName,
    ) -> Result<HashMap<String, usize>, DomainError> {
        let all = self.participations.list().await?;

        Ok(tally(
            all.iter()
                .filter(|p| p.experiment() == experiment)
                .map(Participation::variant),
        ))
    }

    /// Conversions scored per variant of `experiment`; scans the whole table
    pub async fn conversion_counts(
        &self,
        experiment: &ExperimentName,
    ) -> Result<HashMap<String, usize>, DomainError> {
        let all = self.conversions.list().await?;

        Ok(tally(
            all.iter()
                .filter(|c| c.experiment() == experiment)
                .map(Conversion::variant),
        ))
    }

    pub async fn participant_count(
        &self,
        experiment: &ExperimentName,
        variant: &str,
    ) -> Result<usize, DomainError> {
        let counts = self.participant_counts(experiment).await?;
        Ok(counts.get(variant).copied().unwrap_or(0))
    }

    pub async fn conversion_count(
        &self,
        experiment: &ExperimentName,
        variant: &str,
    ) -> Result<usize, DomainError> {
        let counts = self.conversion_counts(experiment).await?;
        Ok(counts.get(variant).copied().unwrap_or(0))
    }
}

fn tally<'a>(variants: impl Iterator<Item = &'a str>) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for variant in variants {
        *counts.entry(variant.to_string()).or_insert(0) += 1;
    }
    counts
}

#[async_trait]
impl ExperimentBackend for StorageExperimentBackend {
    async fn get_experiment(
        &self,
        name: &ExperimentName,
    ) -> Result<Option<Experiment>, DomainError> {
        self.experiments.get(name).await
    }

    async fn save_experiment(
        &self,
        name: &ExperimentName,
        variants: &[String],
    ) -> Result<(), DomainError> {
        let experiment = Experiment::new(name.clone(), variants.to_vec());

        if self.experiments.create_if_absent(experiment).await? {
            debug!(experiment = %name, ?variants, "Experiment stored");
        } else {
            warn!(
                experiment = %name,
                ?variants,
                "Experiment already stored, keeping the first registration"
            );
        }

        Ok(())
    }

    async fn get_variant(
        &self,
        identity: &Identity,
        experiment: &ExperimentName,
    ) -> Result<Option<String>, DomainError> {
        let key = ParticipationKey::new(identity, experiment);

        Ok(self
            .participations
            .get(&key)
            .await?
            .map(|p| p.variant().to_string()))
    }

    async fn participate(
        &self,
        identity: &Identity,
        experiment: &ExperimentName,
        variant: &str,
    ) -> Result<(), DomainError> {
        let participation = Participation::new(identity.clone(), experiment.clone(), variant);

        if !self.participations.create_if_absent(participation).await? {
            debug!(
                experiment = %experiment,
                identity = %identity,
                variant,
                "Visitor already assigned, keeping the first assignment"
            );
        }

        Ok(())
    }

    async fn score(
        &self,
        experiment: &ExperimentName,
        variant: Option<String>,
    ) -> Result<(), DomainError> {
        let Some(variant) = variant else {
            debug!(experiment = %experiment, "Visitor has no assignment, nothing to score");
            return Ok(());
        };

        self.conversions
            .create(Conversion::new(experiment.clone(), variant))
            .await?;

        Ok(())
    }
}
