//! Error types for the GO sharing pipeline.

use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::models::AminoAcid;

#[derive(Error, Debug)]
pub enum SharingError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: CSV parsing error: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}:{line}: expected 12 or 13 columns, found {found}", path.display())]
    MalformedRow {
        path: PathBuf,
        line: u64,
        found: usize,
    },

    #[error("{}:{line}: invalid {field} value '{value}'", path.display())]
    InvalidField {
        path: PathBuf,
        line: u64,
        field: &'static str,
        value: String,
    },

    #[error("{}:{line}: unrecognized enrichment direction flag '{flag}'", path.display())]
    UnknownDirection {
        path: PathBuf,
        line: u64,
        flag: String,
    },

    #[error(
        "organism {organism} has {requested} enriched GO terms for {category} \
         but only {available} annotated GO terms to sample from"
    )]
    SampleExceedsUniverse {
        organism: String,
        category: AminoAcid,
        requested: usize,
        available: usize,
    },

    #[error("no GO-term universe for organism {0}")]
    MissingUniverse(String),

    #[error("sharing count {k} outside 1..={max}")]
    SharingOutOfRange { k: usize, max: usize },

    #[error("baseline snapshot {}: {reason}", path.display())]
    Baseline { path: PathBuf, reason: String },

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("statistics error: {0}")]
    Statistics(String),

    #[error("plotting error: {0}")]
    Plot(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SharingError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SharingError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SharingError>;
