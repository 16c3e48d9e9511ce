//! # keel-schema
//!
//! Model descriptions and configuration for Keel.
//!
//! This crate provides:
//! - A parser for model description files (`*.json` / `*.toml`)
//! - The normalized model AST (`ModelDescription`, `AttributeKind`, relations, traits)
//! - A caching [`Introspector`] that loads a whole models directory
//! - Naming helpers (table names, pivot names, foreign keys)
//! - Configuration parser for `keel.toml` files
//!
//! ## Example
//!
//! ```rust,ignore
//! use keel_schema::{Introspector, KeelConfig};
//!
//! let config = KeelConfig::from_file("keel.toml")?;
//!
//! let introspector = Introspector::new();
//! let result = introspector.load_all(&config.paths.models)?;
//! for model in result.models.iter() {
//!     println!("{} -> {}", model.name, model.table);
//! }
//! ```
//!
//! ## Model files
//!
//! ```json
//! {
//!   "name": "Order",
//!   "attributes": {
//!     "status": { "type": "string", "choices": ["pending", "paid"] },
//!     "total": { "type": "number", "required": true }
//!   },
//!   "belongsToMany": ["Product"],
//!   "traits": { "useTimestamps": true, "useSoftDeletes": true }
//! }
//! ```

pub mod ast;
pub mod cache;
pub mod config;
pub mod error;
pub mod introspector;
pub mod naming;
pub mod parser;

pub use ast::*;
pub use cache::{CacheStats, ModelCache};
pub use config::{Dialect, KeelConfig};
pub use error::{SchemaError, SchemaResult};
pub use introspector::{IntrospectionResult, Introspector, ModelFailure, ModelSet};
pub use parser::{parse_model_file, parse_model_str, ModelFormat};
