//! # Keel
//!
//! Model-to-schema migration synthesis for SQLite, MySQL and PostgreSQL.
//!
//! Keel reads declarative model descriptions (attributes, relations and
//! traits), compares them with what was generated before, and writes
//! migration artifacts that bring the database schema up to date.
//!
//! Keel provides:
//! - A model description format in JSON or TOML
//! - Relation resolution across the whole project, including pivot tables
//! - Attribute snapshots and an append-only ledger for idempotent runs
//! - Dialect-aware SQL rendering with reversible `down.sql` files
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keel::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), keel::MigrationError> {
//!     let config = KeelConfig::from_file("keel.toml")?;
//!     let engine = SynthesisEngine::new(SynthesisConfig::from_keel_config(&config, "."));
//!
//!     let report = engine.run().await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Model descriptions, introspection and configuration.
pub mod schema {
    pub use keel_schema::*;
}

/// Relation resolution, diffing, SQL rendering and artifacts.
pub mod migrate {
    pub use keel_migrate::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        DiffOutcome, MigrationArtifact, RunReport, SchemaOperation, SynthesisConfig,
        SynthesisEngine,
    };
    pub use crate::schema::{Dialect, Introspector, KeelConfig, ModelDescription, parse_model_str};
}

// Re-export key types at the crate root
pub use migrate::{MigrationError, SynthesisEngine};
pub use schema::{Dialect, SchemaError};
