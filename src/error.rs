//! Registration-time and build-time error types.
//!
//! Dispatch itself never raises (see [`crate::router::Router::dispatch`]):
//! an unmatched request yields an empty result set and a converter failure
//! silently drops that one candidate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised synchronously by [`crate::router::Router::register`].
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteError {
    #[error("invalid url component: {0:?}")]
    InvalidComponent(String),

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("parameter already bound: {0}")]
    DuplicateParameter(String),

    #[error("undefined path parameter: {0}")]
    UndefinedPathParameter(String),

    #[error("duplicate port specification")]
    DuplicatePort,

    #[error("invalid host: {0:?}")]
    BadHost(String),

    #[error("'$*' must be the last path component, and is not allowed in a query value")]
    MisplacedStar,

    #[error("'$*' used but handler does not accept a variadic positional argument list")]
    NoVariadic,
}

/// Raised by [`crate::router::Router::build`].
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathError {
    #[error("value for parameter {0:?} is not set")]
    MissingParameter(String),

    #[error("not all parameters were used during path construction")]
    UnconsumedParameter,
}
