//! Persistence contract consumed by the split engine

use async_trait::async_trait;

use super::entity::{Experiment, ExperimentName, Identity};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Durable store of experiments, participations and conversions
///
/// Implementations must be safe to call concurrently. `save_experiment` and
/// `participate` are called by racing first requests, so both must
/// de-duplicate by key and must never merge a second writer's data into an
/// existing record.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExperimentBackend: Send + Sync {
    /// Get an experiment by name
    async fn get_experiment(&self, name: &ExperimentName)
    -> Result<Option<Experiment>, DomainError>;

    /// Register an experiment; idempotent by name
    async fn save_experiment(
        &self,
        name: &ExperimentName,
        variants: &[String],
    ) -> Result<(), DomainError>;

    /// Get the variant assigned to `identity`, if any
    async fn get_variant(
        &self,
        identity: &Identity,
        experiment: &ExperimentName,
    ) -> Result<Option<String>, DomainError>;

    /// Record the sticky assignment of `identity` to `variant`
    async fn participate(
        &self,
        identity: &Identity,
        experiment: &ExperimentName,
        variant: &str,
    ) -> Result<(), DomainError>;

    /// Record a conversion for the visitor's variant
    ///
    /// `variant` is `None` when the visitor was never assigned; the backend
    /// decides how to handle that.
    async fn score(
        &self,
        experiment: &ExperimentName,
        variant: Option<String>,
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend_returns_configured_experiment() {
        let name = ExperimentName::new("exp");
        let mut mock = MockExperimentBackend::new();
        mock.expect_get_experiment().returning(|name| {
            Ok(Some(Experiment::new(
                name.clone(),
                vec!["a".to_string(), "b".to_string()],
            )))
        });

        let experiment = mock.get_experiment(&name).await.unwrap().unwrap();
        assert!(experiment.has_variants(&["b", "a"]));
    }
}
