//! # Venue Classifier
#![forbid(unsafe_code)]

/// Instances, tokenization and vocabularies
pub mod data;

/// Models
pub mod models;

/// Pipelines
pub mod pipelines;

/// Datasets
pub mod datasets;

/// Utilities
pub mod utils;

/// Error macros
#[macro_use]
extern crate anyhow;
