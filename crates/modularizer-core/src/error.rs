//! Error types for Modularizer

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("circular dependency: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    #[error("timeout: {0}")]
    Timeout(String),

    /// Raised by a module factory. Carried through resolution untouched.
    #[error(transparent)]
    Factory(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], stable across message changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    InvalidDefinition,
    InvalidState,
    CircularDependency,
    Timeout,
    Factory,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidDefinition => "InvalidDefinition",
            Self::InvalidState => "InvalidState",
            Self::CircularDependency => "CircularDependency",
            Self::Timeout => "Timeout",
            Self::Factory => "Factory",
        };
        f.write_str(s)
    }
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn invalid_definition(message: impl Into<String>) -> Self {
        Self::InvalidDefinition(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn circular(chain: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::CircularDependency {
            chain: chain.into_iter().map(Into::into).collect(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::InvalidDefinition(_) => ErrorKind::InvalidDefinition,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::CircularDependency { .. } => ErrorKind::CircularDependency,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Factory(_) => ErrorKind::Factory,
        }
    }
}
