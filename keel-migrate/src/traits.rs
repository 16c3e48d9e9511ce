//! Trait augmentation.
//!
//! Expands a model's trait flags into extra columns on its own table and
//! companion tables that live beside it. Resolution is a pure function of
//! the model description and the dialect.

use keel_schema::naming;
use keel_schema::{
    AttributeKind, DefaultValue, Dialect, LikeableOptions, ModelDescription, PrimaryKeyStrategy,
};
use tracing::debug;

use crate::column::{presets, ColumnSpec, ForeignKeyRef, IndexSpec, TablePlan};

/// Where a companion table is emitted relative to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Before the owner's CREATE (billing subscriptions).
    BeforeOwner,
    /// After the owner's CREATE.
    AfterOwner,
}

/// An extra table implied by a trait.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanionTable {
    /// Ledger name; companions sharing it are generated once per project.
    pub logical_name: String,
    /// Emission order relative to the owner.
    pub placement: Placement,
    /// The table.
    pub table: TablePlan,
}

impl CompanionTable {
    fn new(placement: Placement, table: TablePlan) -> Self {
        Self {
            logical_name: format!("create-{}-table", table.table),
            placement,
            table,
        }
    }
}

/// Everything the trait flags of one model add.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraitPlan {
    /// Columns placed right after the primary key.
    pub leading: Vec<ColumnSpec>,
    /// Columns placed after attributes and relation keys.
    pub trailing: Vec<ColumnSpec>,
    /// Companion tables.
    pub companions: Vec<CompanionTable>,
    /// Indexes on the owner table.
    pub indexes: Vec<IndexSpec>,
}

/// Resolves trait flags for a dialect.
#[derive(Debug, Clone, Copy)]
pub struct TraitResolver {
    dialect: Dialect,
}

impl TraitResolver {
    /// Create a resolver for a dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Resolve the trait flags of a model.
    pub fn resolve(&self, model: &ModelDescription) -> TraitPlan {
        let traits = &model.traits;
        let table = model.table.as_str();
        let mut plan = TraitPlan::default();

        if traits.uuid && model.primary_key != "uuid" {
            plan.leading.push(self.uuid_column());
            plan.indexes.push(IndexSpec::for_column(table, "uuid"));
        }
        for provider in &traits.socials {
            plan.leading
                .push(presets::string(&format!("{}_id", naming::snake_case(provider))));
        }

        if let Some(auth) = traits.auth {
            if auth.two_factor {
                plan.trailing.push(presets::string("two_factor_secret"));
            }
            if auth.passkey {
                plan.trailing.push(presets::string("public_passkey"));
                plan.companions
                    .push(CompanionTable::new(Placement::AfterOwner, self.passkeys(model)));
            }
        }

        if traits.billable {
            plan.trailing.push(presets::string("stripe_id"));
            if table == "users" {
                plan.companions
                    .push(CompanionTable::new(Placement::BeforeOwner, subscriptions()));
            }
        }

        if let Some(likeable) = &traits.likeable {
            for counter in &likeable.counters {
                plan.trailing.push(
                    ColumnSpec::new(format!("{}_count", naming::snake_case(counter)), AttributeKind::Integer)
                        .not_null()
                        .default_value(DefaultValue::Integer(0)),
                );
            }
            plan.companions
                .push(CompanionTable::new(Placement::AfterOwner, likes(model, likeable)));
        }

        if let Some(ts) = &traits.timestamps {
            plan.trailing.push(presets::created_at(&ts.created_at));
            plan.trailing.push(presets::timestamp(&ts.updated_at));
        }
        if let Some(deleted_at) = &traits.soft_deletes {
            plan.trailing.push(presets::timestamp(deleted_at));
        }

        if traits.categorizable {
            plan.companions
                .push(CompanionTable::new(Placement::AfterOwner, categorizable()));
            plan.companions.push(CompanionTable::new(
                Placement::AfterOwner,
                polymorphic_links("categorizable_models", "category_id", "categorizable"),
            ));
        }
        if traits.taggable {
            plan.companions
                .push(CompanionTable::new(Placement::AfterOwner, taggable()));
            plan.companions.push(CompanionTable::new(
                Placement::AfterOwner,
                polymorphic_links("taggable_models", "tag_id", "taggable"),
            ));
        }
        if traits.commentables {
            plan.companions
                .push(CompanionTable::new(Placement::AfterOwner, commentables()));
            plan.companions
                .push(CompanionTable::new(Placement::AfterOwner, comment_upvotes()));
        }

        if !traits.ignored.is_empty() {
            debug!(model = %model.name, ignored = ?traits.ignored, "unsupported traits ignored");
        }

        plan
    }

    fn uuid_column(&self) -> ColumnSpec {
        let column = ColumnSpec::new("uuid", AttributeKind::Uuid).unique();
        match self.dialect {
            // SQLite has no UUID generator; the application supplies one.
            Dialect::Sqlite => column,
            Dialect::MySql | Dialect::Postgres => {
                column.not_null().default_value(DefaultValue::GeneratedUuid)
            }
        }
    }

    fn passkeys(&self, owner: &ModelDescription) -> TablePlan {
        let owner_key = naming::foreign_key_name(owner.name());
        let key_kind = match owner.primary_key_strategy {
            PrimaryKeyStrategy::AutoIncrement => AttributeKind::Integer,
            PrimaryKeyStrategy::Uuid => AttributeKind::Uuid,
        };

        TablePlan::new("passkeys")
            .column(ColumnSpec::primary("id", PrimaryKeyStrategy::Uuid))
            .column(ColumnSpec::new("cred_public_key", AttributeKind::Text).not_null())
            .column(
                ColumnSpec::new(owner_key.as_str(), key_kind)
                    .not_null()
                    .references(ForeignKeyRef::cascade(owner.table.as_str(), owner.primary_key.as_str())),
            )
            .column(presets::string("webauthn_user_id").not_null())
            .column(presets::integer("counter").default_value(DefaultValue::Integer(0)))
            .column(presets::string("device_type"))
            .column(presets::string("credential_type"))
            .column(presets::flag("backup_eligible", false))
            .column(presets::flag("backup_status", false))
            .column(presets::string("transports"))
            .column(presets::timestamp("last_used_at"))
            .column(presets::created_at("created_at"))
            .index(IndexSpec::for_column("passkeys", &owner_key))
    }
}

fn subscriptions() -> TablePlan {
    TablePlan::new("subscriptions")
        .column(presets::id())
        .column(
            presets::integer("user_id")
                .not_null()
                .references(ForeignKeyRef::cascade("users", "id")),
        )
        .column(presets::string("type").not_null())
        .column(presets::string("plan"))
        .column(presets::string("provider_id").not_null().unique())
        .column(presets::string("provider_status").not_null())
        .column(ColumnSpec::new("unit_price", AttributeKind::Integer))
        .column(presets::string("provider_type").not_null())
        .column(presets::string("provider_price_id"))
        .column(presets::integer("quantity"))
        .column(presets::timestamp("trial_ends_at"))
        .column(presets::timestamp("ends_at"))
        .column(presets::timestamp("last_used_at"))
        .column(ColumnSpec::new("uuid", AttributeKind::Uuid))
        .column(presets::created_at("created_at"))
        .column(presets::timestamp("updated_at"))
        .index(IndexSpec::for_column("subscriptions", "user_id"))
}

fn likes(owner: &ModelDescription, options: &LikeableOptions) -> TablePlan {
    let table = options
        .table
        .as_deref()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}_likes", owner.table));
    let key = options
        .foreign_key
        .as_deref()
        .map(str::to_string)
        .unwrap_or_else(|| naming::foreign_key_name(owner.name()));
    let key_kind = match owner.primary_key_strategy {
        PrimaryKeyStrategy::AutoIncrement => AttributeKind::Integer,
        PrimaryKeyStrategy::Uuid => AttributeKind::Uuid,
    };

    let plan = TablePlan::new(table.as_str())
        .column(presets::id())
        .column(presets::integer("user_id").not_null())
        .column(
            ColumnSpec::new(key.as_str(), key_kind)
                .not_null()
                .references(ForeignKeyRef::cascade(owner.table.as_str(), owner.primary_key.as_str())),
        )
        .column(presets::created_at("created_at"))
        .column(presets::timestamp("updated_at"))
        .index(IndexSpec::for_column(&table, "user_id"))
        .index(IndexSpec::for_column(&table, &key));
    plan.unique_together(&["user_id", key.as_str()])
}

fn categorizable() -> TablePlan {
    TablePlan::new("categorizable")
        .column(presets::id())
        .column(presets::string("name").not_null())
        .column(presets::string("slug").not_null().unique())
        .column(ColumnSpec::new("description", AttributeKind::Text))
        .column(presets::integer("parent_id"))
        .column(presets::integer("order").default_value(DefaultValue::Integer(0)))
        .column(presets::flag("is_active", true))
        .column(presets::created_at("created_at"))
        .column(presets::timestamp("updated_at"))
        .index(IndexSpec::for_column("categorizable", "parent_id"))
        .index(IndexSpec::for_column("categorizable", "order"))
}

fn taggable() -> TablePlan {
    TablePlan::new("taggable")
        .column(presets::id())
        .column(presets::string("name").not_null())
        .column(presets::string("slug").not_null().unique())
        .column(ColumnSpec::new("description", AttributeKind::Text))
        .column(presets::flag("is_active", true))
        .column(presets::created_at("created_at"))
        .column(presets::timestamp("updated_at"))
}

/// Link table between a shared table and any model: `{morph}_id` and
/// `{morph}_type` point at the linked row.
fn polymorphic_links(table: &str, key: &str, morph: &str) -> TablePlan {
    let id_column = format!("{}_id", morph);
    let type_column = format!("{}_type", morph);
    TablePlan::new(table)
        .column(presets::id())
        .column(
            presets::integer(key)
                .not_null()
                .references(ForeignKeyRef::cascade(morph, "id")),
        )
        .column(presets::integer(&id_column).not_null())
        .column(presets::string(&type_column).not_null())
        .column(presets::created_at("created_at"))
        .column(presets::timestamp("updated_at"))
        .index(IndexSpec::for_column(table, key))
        .index(IndexSpec::new(
            format!("{}_{}_index", table, morph),
            vec![id_column, type_column],
        ))
}

fn commentables() -> TablePlan {
    TablePlan::new("commentables")
        .column(presets::id())
        .column(presets::string("title").not_null())
        .column(ColumnSpec::new("body", AttributeKind::Text).not_null())
        .column(
            ColumnSpec::new("status", AttributeKind::string(50))
                .not_null()
                .default_value(DefaultValue::String("approved".to_string())),
        )
        .column(presets::integer("approved_at"))
        .column(presets::integer("rejected_at"))
        .column(presets::integer("user_id"))
        .column(presets::integer("commentables_id").not_null())
        .column(presets::string("commentables_type").not_null())
        .column(presets::created_at("created_at"))
        .column(presets::timestamp("updated_at"))
        .index(IndexSpec::for_column("commentables", "status"))
        .index(IndexSpec::new(
            "commentables_commentables_index",
            vec!["commentables_id".to_string(), "commentables_type".to_string()],
        ))
}

/// Upvotes on comments, linked polymorphically like the comments themselves.
fn comment_upvotes() -> TablePlan {
    let table = "commenteable_upvotes";
    TablePlan::new(table)
        .column(presets::id())
        .column(presets::integer("user_id").not_null())
        .column(presets::integer("upvoteable_id").not_null())
        .column(presets::string("upvoteable_type").not_null())
        .column(presets::created_at("created_at"))
        .index(IndexSpec::for_column(table, "user_id"))
        .index(IndexSpec::new(
            format!("{}_upvoteable_index", table),
            vec!["upvoteable_id".to_string(), "upvoteable_type".to_string()],
        ))
}
