//! Experiment domain entities

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::storage::{StorageEntity, StorageKey};

// ============================================================================
// ExperimentName
// ============================================================================

/// Unique name of an experiment; any string is accepted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentName(String);

impl ExperimentName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ExperimentName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ExperimentName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ExperimentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl StorageKey for ExperimentName {
    fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Opaque, stable-per-visitor key that makes assignments sticky
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Experiment
// ============================================================================

/// A named split test with an immutable set of variant keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    name: ExperimentName,
    variants: Vec<String>,
    created_at: DateTime<Utc>,
}

impl Experiment {
    pub fn new(name: ExperimentName, variants: Vec<String>) -> Self {
        Self {
            name,
            variants,
            created_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &ExperimentName {
        &self.name
    }

    /// Variant keys in the order they were first declared
    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Check whether `keys` names exactly this experiment's variants, ignoring order
    pub fn has_variants<S: AsRef<str>>(&self, keys: &[S]) -> bool {
        let stored: HashSet<&str> = self.variants.iter().map(String::as_str).collect();
        let declared: HashSet<&str> = keys.iter().map(AsRef::as_ref).collect();
        stored == declared
    }

    pub fn contains_variant(&self, key: &str) -> bool {
        self.variants.iter().any(|v| v == key)
    }
}

impl StorageEntity for Experiment {
    type Key = ExperimentName;

    fn key(&self) -> &Self::Key {
        &self.name
    }
}

// ============================================================================
// Participation
// ============================================================================

/// Storage key of a participation: one per (experiment, identity) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipationKey(String);

impl ParticipationKey {
    pub fn new(identity: &Identity, experiment: &ExperimentName) -> Self {
        // length prefix keeps the key unambiguous whatever the parts contain
        Self(format!(
            "{}:{}:{}",
            experiment.as_str().len(),
            experiment.as_str(),
            identity.as_str()
        ))
    }
}

impl StorageKey for ParticipationKey {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// The persisted (identity, experiment) -> variant assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participation {
    key: ParticipationKey,
    identity: Identity,
    experiment: ExperimentName,
    variant: String,
    assigned_at: DateTime<Utc>,
}

impl Participation {
    pub fn new(identity: Identity, experiment: ExperimentName, variant: impl Into<String>) -> Self {
        Self {
            key: ParticipationKey::new(&identity, &experiment),
            identity,
            experiment,
            variant: variant.into(),
            assigned_at: Utc::now(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn experiment(&self) -> &ExperimentName {
        &self.experiment
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    pub fn assigned_at(&self) -> DateTime<Utc> {
        self.assigned_at
    }
}

impl StorageEntity for Participation {
    type Key = ParticipationKey;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

// ============================================================================
// Conversion
// ============================================================================

/// Unique identifier for a recorded conversion
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversionId(String);

impl ConversionId {
    /// Generate a new unique ID
    pub fn generate() -> Self {
        Self(format!("conv-{}", uuid::Uuid::new_v4()))
    }
}

impl StorageKey for ConversionId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// A conversion scored against a visitor's assigned variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversion {
    id: ConversionId,
    experiment: ExperimentName,
    variant: String,
    recorded_at: DateTime<Utc>,
}

impl Conversion {
    pub fn new(experiment: ExperimentName, variant: impl Into<String>) -> Self {
        Self {
            id: ConversionId::generate(),
            experiment,
            variant: variant.into(),
            recorded_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &ConversionId {
        &self.id
    }

    pub fn experiment(&self) -> &ExperimentName {
        &self.experiment
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

impl StorageEntity for Conversion {
    type Key = ConversionId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}
