//! Trait flags attached to a model.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Column names used by the timestamps trait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampColumns {
    /// Creation timestamp column.
    pub created_at: SmolStr,
    /// Update timestamp column.
    pub updated_at: SmolStr,
}

impl Default for TimestampColumns {
    fn default() -> Self {
        Self {
            created_at: SmolStr::new_static("created_at"),
            updated_at: SmolStr::new_static("updated_at"),
        }
    }
}

/// Options of the authentication trait.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOptions {
    /// Adds a `two_factor_secret` column.
    pub two_factor: bool,
    /// Adds a `public_passkey` column and a `passkeys` table.
    pub passkey: bool,
}

/// Options of the likeable trait.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeableOptions {
    /// Counter columns to add (`post` becomes `post_count`).
    pub counters: Vec<SmolStr>,
    /// Explicit upvote table name.
    pub table: Option<SmolStr>,
    /// Explicit key on the upvote table pointing at the model.
    pub foreign_key: Option<SmolStr>,
}

/// All trait flags of a model, resolved from their boolean, array or
/// object forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTraits {
    /// `created_at` / `updated_at`; `None` when disabled.
    pub timestamps: Option<TimestampColumns>,
    /// Soft-delete column; `None` when disabled.
    pub soft_deletes: Option<SmolStr>,
    /// Secondary `uuid` column.
    pub uuid: bool,
    /// Authentication options.
    pub auth: Option<AuthOptions>,
    /// Billing columns and subscriptions table.
    pub billable: bool,
    /// Social login providers.
    pub socials: Vec<SmolStr>,
    /// Likeable counters and upvote table.
    pub likeable: Option<LikeableOptions>,
    /// Shared categories tables.
    pub categorizable: bool,
    /// Shared tags tables.
    pub taggable: bool,
    /// Shared comments table.
    pub commentables: bool,
    /// Trait keys that were not recognized.
    pub ignored: Vec<SmolStr>,
}

impl Default for ModelTraits {
    fn default() -> Self {
        Self {
            timestamps: Some(TimestampColumns::default()),
            soft_deletes: None,
            uuid: false,
            auth: None,
            billable: false,
            socials: Vec::new(),
            likeable: None,
            categorizable: false,
            taggable: false,
            commentables: false,
            ignored: Vec::new(),
        }
    }
}

impl ModelTraits {
    /// Traits with everything disabled, timestamps included.
    pub fn none() -> Self {
        Self {
            timestamps: None,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_enabled_by_default() {
        let traits = ModelTraits::default();
        let ts = traits.timestamps.unwrap();
        assert_eq!(ts.created_at, "created_at");
        assert_eq!(ts.updated_at, "updated_at");
    }

    #[test]
    fn test_none_disables_timestamps() {
        assert!(ModelTraits::none().timestamps.is_none());
    }
}
