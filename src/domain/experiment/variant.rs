//! Variant declarations and the parser that normalizes them

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ConfigurationError;

/// Weight given to a variant declared without one
pub const DEFAULT_WEIGHT: u32 = 1;

fn default_weight() -> u32 {
    DEFAULT_WEIGHT
}

// ============================================================================
// VariantSpec
// ============================================================================

/// One variant as declared by the caller of `split`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSpec {
    /// Unique label of the variant within its experiment
    pub key: String,
    /// Value handed back when this variant is selected
    #[serde(default)]
    pub value: Value,
    /// Proportional selection weight
    #[serde(default = "default_weight")]
    pub weight: u32,
}

impl VariantSpec {
    /// Create a variant with a `null` value and the default weight
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Value::Null,
            weight: DEFAULT_WEIGHT,
        }
    }

    /// Set the value returned when this variant is selected
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    /// Set the selection weight
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }
}

impl From<&str> for VariantSpec {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl<V: Into<Value>> From<(&str, V)> for VariantSpec {
    fn from((key, value): (&str, V)) -> Self {
        Self::new(key).with_value(value)
    }
}

impl<V: Into<Value>> From<(&str, V, u32)> for VariantSpec {
    fn from((key, value, weight): (&str, V, u32)) -> Self {
        Self::new(key).with_value(value).with_weight(weight)
    }
}

// ============================================================================
// ParsedVariants
// ============================================================================

/// Validated variant declarations as parallel sequences of equal length
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedVariants {
    keys: Vec<String>,
    values: Vec<Value>,
    weights: Vec<u32>,
}

impl ParsedVariants {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn weights(&self) -> &[u32] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Get the value declared for `key`
    pub fn value_for(&self, key: &str) -> Option<&Value> {
        self.keys
            .iter()
            .position(|k| k == key)
            .map(|index| &self.values[index])
    }

    /// Consume the declarations, keeping only the value declared for `key`
    pub fn into_value(self, key: &str) -> Option<Value> {
        let index = self.keys.iter().position(|k| k == key)?;
        self.values.into_iter().nth(index)
    }
}

/// The implicit 50/50 split used when no variants are declared
pub fn default_variants() -> Vec<VariantSpec> {
    vec![
        VariantSpec::new("True").with_value(true),
        VariantSpec::new("False").with_value(false),
    ]
}

/// Validate and normalize variant declarations
///
/// An empty list falls back to [`default_variants`]. A single variant is
/// rejected since an experiment needs a control and an alternative.
pub fn parse_variants(specs: Vec<VariantSpec>) -> Result<ParsedVariants, ConfigurationError> {
    let specs = if specs.is_empty() {
        default_variants()
    } else {
        specs
    };

    if specs.len() == 1 {
        return Err(ConfigurationError::InsufficientVariants(1));
    }

    let mut seen = HashSet::with_capacity(specs.len());
    let mut parsed = ParsedVariants {
        keys: Vec::with_capacity(specs.len()),
        values: Vec::with_capacity(specs.len()),
        weights: Vec::with_capacity(specs.len()),
    };

    for spec in specs {
        if spec.weight == 0 {
            return Err(ConfigurationError::InvalidWeight {
                key: spec.key,
                weight: spec.weight,
            });
        }

        if !seen.insert(spec.key.clone()) {
            return Err(ConfigurationError::DuplicateVariantKey(spec.key));
        }

        parsed.keys.push(spec.key);
        parsed.values.push(spec.value);
        parsed.weights.push(spec.weight);
    }

    Ok(parsed)
}
