//! Error layers shared by the recommender and its front ends.
//!
//! Input problems surface as [`DomainError`], collaborator and configuration
//! failures as [`ApplicationError`], and anything shown to an operator goes
//! through [`InterfaceError`], which pairs a stable failure kind with a
//! correlation id.

use std::fmt;

use thiserror::Error;

use crate::ports::{CatalogError, StoreError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid product id `{0}`")]
    InvalidProductId(String),
    #[error("invalid suggestion query: {0}")]
    InvalidQuery(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    RankedStore(#[from] StoreError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Deadlines and key contention; retrying the same call may succeed.
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("configuration issue: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Domain(_) => FailureKind::InvalidInput,
            Self::RankedStore(StoreError::Unavailable(_))
            | Self::Catalog(CatalogError::Unavailable(_))
            | Self::Transient(_) => FailureKind::Unavailable,
            Self::RankedStore(StoreError::Command(_) | StoreError::Decode(_))
            | Self::Catalog(CatalogError::Decode(_)) => FailureKind::Internal,
            Self::Configuration(_) => FailureKind::Misconfigured,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        InterfaceError {
            kind: self.kind(),
            message: self.to_string(),
            correlation_id: correlation_id.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    InvalidInput,
    Unavailable,
    Misconfigured,
    Internal,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Unavailable => "unavailable",
            Self::Misconfigured => "misconfigured",
            Self::Internal => "internal",
        }
    }

    /// Operator-facing text that never includes collaborator details.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::InvalidInput => "Check the product ids and result limit, then try again.",
            Self::Unavailable => "Recommendations are temporarily unavailable. Retry shortly.",
            Self::Misconfigured => "The recommender is misconfigured. Fix the settings and rerun.",
            Self::Internal => "The recommender hit an unexpected error.",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct InterfaceError {
    pub kind: FailureKind,
    pub message: String,
    pub correlation_id: String,
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}
