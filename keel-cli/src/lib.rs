//! Keel CLI - command-line interface for migration synthesis.
//!
//! This crate provides the `keel` binary: project initialization,
//! migration generation for all models or a single model, and a ledger
//! status listing.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
