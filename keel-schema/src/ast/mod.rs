//! Normalized model description AST.
//!
//! Everything in here is produced by the [`parser`](crate::parser) and is
//! read-only for the rest of a synthesis run.

mod attribute;
mod model;
mod relation;
mod traits;

pub use attribute::{Attribute, AttributeKind, DefaultValue};
pub use model::{IndexDeclaration, ModelDescription, PrimaryKeyStrategy};
pub use relation::{RelationDeclaration, RelationKind};
pub use traits::{AuthOptions, LikeableOptions, ModelTraits, TimestampColumns};
