//! Error types for configuration, persistence, the HTTP surface, and the
//! domain taxonomy every resource handler reports through.

use std::fmt;

use thiserror::Error;

/// Configuration resolution failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {key}")]
    MissingRequired { key: String },

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Class of integrity constraint the storage engine reported as violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    Check,
    NotNull,
}

impl ConstraintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unique => "unique",
            Self::ForeignKey => "foreign key",
            Self::Check => "check",
            Self::NotNull => "not-null",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistence failures surfaced by a store backend.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("query failed: {0}")]
    Query(String),

    /// A write was rejected by a named integrity constraint.
    #[error("{kind} constraint '{constraint}' violated")]
    Constraint {
        kind: ConstraintKind,
        constraint: String,
    },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DatabaseError {
    pub fn constraint(kind: ConstraintKind, constraint: impl Into<String>) -> Self {
        Self::Constraint {
            kind,
            constraint: constraint.into(),
        }
    }
}

/// Outcome reported to API clients.
///
/// Every variant maps to exactly one HTTP status; see `web::response`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Malformed or out-of-range field values (400).
    #[error("{0}")]
    Validation(String),

    /// Request that cannot be served as written: unparseable body or
    /// identifier, or a reference to a missing parent (400).
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    DuplicateKey(String),

    /// Deletion refused because dependent rows still reference the target.
    #[error("{0}")]
    ReferentialConflict(String),

    #[error("Internal server error")]
    Internal,
}

/// Failures starting or running the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("server error: {0}")]
    Serve(String),
}
