//! Error types and result alias for the crate.
//!
//! This module defines [`enum@crate::error::Error`] and the crate-wide [Result] alias. Variants cover
//! invalid configuration, out-of-bounds arguments, unsupported transform capabilities,
//! raster lookup and dependency failures, and generic errors.
//!
//! Positions that a geo-coding cannot resolve are not errors; they are reported with the
//! invalid [`crate::geocoding::PixelPos`] / [`crate::geocoding::GeoPos`] sentinels.
use thiserror::Error;

use crate::pyramid::NodeId;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{what} out of bounds: {value} not in [0, {limit})")]
    OutOfBounds {
        what: &'static str,
        value: f64,
        limit: f64,
    },

    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("unknown raster '{name}'")]
    UnknownRaster { name: String },

    #[error("raster '{name}' already exists")]
    DuplicateRaster { name: String },

    #[error("raster '{name}' is derived and cannot be written")]
    ReadOnly { name: String },

    #[error("expression error: {0}")]
    Expression(String),

    #[error("dependency cycle: {0}")]
    Cycle(String),

    #[error("raster '{name}' is still referenced by {dependents:?}")]
    InUse {
        name: String,
        dependents: Vec<String>,
    },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {0} has been disposed")]
    Disposed(NodeId),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn out_of_bounds(what: &'static str, value: impl Into<f64>, limit: usize) -> Self {
        Error::OutOfBounds {
            what,
            value: value.into(),
            limit: limit as f64,
        }
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Other(value.to_owned())
    }
}
