//! Visitor identity resolution

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use super::entity::Identity;
use crate::domain::DomainError;

/// Resolves a stable visitor identity from request context
///
/// Determinism across calls for the same visitor is the provider's
/// responsibility; the engine only relies on it.
pub trait IdentityProvider: Send + Sync {
    /// Per-request context the identity is derived from
    type Context: ?Sized;

    fn identity(&self, context: &Self::Context) -> Result<Identity, DomainError>;
}

// ============================================================================
// IdentityFn
// ============================================================================

/// Adapts a plain function into an [`IdentityProvider`]
pub struct IdentityFn<C: ?Sized, F> {
    resolve: F,
    _context: PhantomData<fn(&C)>,
}

impl<C: ?Sized, F> IdentityFn<C, F>
where
    F: Fn(&C) -> Result<Identity, DomainError> + Send + Sync,
{
    pub fn new(resolve: F) -> Self {
        Self {
            resolve,
            _context: PhantomData,
        }
    }
}

impl<C: ?Sized, F> IdentityProvider for IdentityFn<C, F>
where
    F: Fn(&C) -> Result<Identity, DomainError> + Send + Sync,
{
    type Context = C;

    fn identity(&self, context: &C) -> Result<Identity, DomainError> {
        (self.resolve)(context)
    }
}

impl<C: ?Sized, F> fmt::Debug for IdentityFn<C, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityFn").finish_non_exhaustive()
    }
}

// ============================================================================
// RequestAttributes
// ============================================================================

/// String attributes the host extracted from a request (cookies, session values)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestAttributes(BTreeMap<String, String>);

impl RequestAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

// ============================================================================
// AttributeIdentityProvider
// ============================================================================

/// Uses one named request attribute as the visitor identity
#[derive(Debug, Clone)]
pub struct AttributeIdentityProvider {
    attribute: String,
}

impl AttributeIdentityProvider {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl IdentityProvider for AttributeIdentityProvider {
    type Context = RequestAttributes;

    fn identity(&self, context: &RequestAttributes) -> Result<Identity, DomainError> {
        match context.get(&self.attribute) {
            Some(value) if !value.is_empty() => Ok(Identity::from(value)),
            _ => Err(DomainError::not_found(format!(
                "Request attribute '{}' not found",
                self.attribute
            ))),
        }
    }
}
