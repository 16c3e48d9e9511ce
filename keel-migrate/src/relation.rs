//! Relation and pivot resolution.
//!
//! Foreign keys are usually declared on the referencing side but live on the
//! referenced table, and a many-to-many relation can be declared from either
//! end, so resolution needs the whole project's model set at once.

use indexmap::IndexMap;
use keel_schema::naming;
use keel_schema::{
    AttributeKind, ModelDescription, ModelSet, PrimaryKeyStrategy, RelationDeclaration,
    RelationKind,
};
use tracing::{debug, trace};

use crate::column::{presets, ColumnSpec, ForeignKeyRef, IndexSpec, TablePlan};
use crate::error::{MigrateResult, MigrationError};

/// One resolved relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationPlan {
    /// Relation kind.
    pub kind: RelationKind,
    /// Model declaring the relation.
    pub owner_model: String,
    /// Table of the declaring model.
    pub owner_table: String,
    /// Related model.
    pub related_model: String,
    /// Table receiving the foreign key (the related table, or the
    /// intermediate table for `hasOneThrough`).
    pub related_table: String,
    /// Foreign key column added to `related_table`.
    pub foreign_key: Option<String>,
    /// Pivot table for `belongsToMany`.
    pub pivot_table: Option<String>,
}

/// A deduplicated many-to-many join table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotPlan {
    /// Pivot table name.
    pub table: String,
    /// Key pointing at the owner.
    pub first_key: String,
    /// Owner table.
    pub first_table: String,
    /// Owner primary key.
    pub first_primary_key: String,
    /// Owner primary key strategy.
    pub first_strategy: PrimaryKeyStrategy,
    /// Key pointing at the related model.
    pub second_key: String,
    /// Related table.
    pub second_table: String,
    /// Related primary key.
    pub second_primary_key: String,
    /// Related primary key strategy.
    pub second_strategy: PrimaryKeyStrategy,
    /// Model whose declaration produced the pivot.
    pub declared_by: String,
}

impl PivotPlan {
    /// Logical ledger name of the pivot table.
    pub fn logical_name(&self) -> String {
        format!("create-{}-table", self.table)
    }

    /// The pivot as a table plan.
    pub fn table_plan(&self) -> TablePlan {
        let first = key_column(&self.first_key, self.first_strategy)
            .not_null()
            .references(ForeignKeyRef::cascade(&self.first_table, &self.first_primary_key));
        let second = key_column(&self.second_key, self.second_strategy)
            .not_null()
            .references(ForeignKeyRef::cascade(&self.second_table, &self.second_primary_key));

        TablePlan::new(&self.table)
            .column(presets::id())
            .column(first)
            .column(second)
            .index(IndexSpec::for_column(&self.table, &self.first_key))
            .index(IndexSpec::for_column(&self.table, &self.second_key))
    }
}

/// Relations resolved across the whole project.
#[derive(Debug, Clone, Default)]
pub struct RelationGraph {
    /// Every resolved relation, in model then declaration order.
    pub plans: Vec<RelationPlan>,
    /// Pivot tables keyed by table name.
    pub pivots: IndexMap<String, PivotPlan>,
    /// Implied columns per table, deduplicated by column name.
    columns: IndexMap<String, IndexMap<String, ColumnSpec>>,
}

impl RelationGraph {
    /// Columns other models' relations add to a table.
    ///
    /// This is the reverse lookup: a model inherits these even though it
    /// declared nothing itself.
    pub fn foreign_keys_for(&self, table: &str) -> Vec<&ColumnSpec> {
        self.columns
            .get(table)
            .map(|cols| cols.values().collect())
            .unwrap_or_default()
    }

    /// Relations whose foreign key lands on a table.
    pub fn relations_targeting(&self, table: &str) -> impl Iterator<Item = &RelationPlan> {
        let table = table.to_string();
        self.plans.iter().filter(move |p| p.related_table == table)
    }

    /// Pivot tables in resolution order.
    pub fn pivots(&self) -> impl Iterator<Item = &PivotPlan> {
        self.pivots.values()
    }

    fn add_column(&mut self, table: &str, column: ColumnSpec) {
        let columns = self.columns.entry(table.to_string()).or_default();
        if !columns.contains_key(&column.name) {
            trace!(table, column = %column.name, "implied column");
            columns.insert(column.name.clone(), column);
        }
    }
}

/// Resolves relation declarations against a model set.
pub struct RelationResolver<'a> {
    models: &'a ModelSet,
}

impl<'a> RelationResolver<'a> {
    /// Create a resolver over a project's models.
    pub fn new(models: &'a ModelSet) -> Self {
        Self { models }
    }

    /// Resolve every relation of every model.
    ///
    /// Any relation pointing at a model outside the set fails the whole
    /// resolution with [`MigrationError::UnresolvedRelation`].
    pub fn resolve(&self) -> MigrateResult<RelationGraph> {
        let mut graph = RelationGraph::default();

        for owner in self.models.iter() {
            for relation in &owner.relations {
                self.resolve_one(owner, relation, &mut graph)?;
            }
        }

        debug!(
            relations = graph.plans.len(),
            pivots = graph.pivots.len(),
            "resolved relations"
        );
        Ok(graph)
    }

    fn target(
        &self,
        owner: &ModelDescription,
        relation: &RelationDeclaration,
        name: &str,
    ) -> MigrateResult<&'a ModelDescription> {
        self.models
            .get(name)
            .map(|m| m.as_ref())
            .ok_or_else(|| MigrationError::unresolved_relation(owner.name(), relation.label(), name))
    }

    fn resolve_one(
        &self,
        owner: &ModelDescription,
        relation: &RelationDeclaration,
        graph: &mut RelationGraph,
    ) -> MigrateResult<()> {
        let related = self.target(owner, relation, &relation.model)?;

        match relation.kind {
            RelationKind::HasOne | RelationKind::HasMany => {
                let column = relation
                    .foreign_key
                    .as_deref()
                    .map(str::to_string)
                    .unwrap_or_else(|| naming::foreign_key_name(owner.name()));
                graph.add_column(&related.table, owner_key(owner, &column));
                graph.plans.push(RelationPlan {
                    kind: relation.kind,
                    owner_model: owner.name().to_string(),
                    owner_table: owner.table.to_string(),
                    related_model: related.name().to_string(),
                    related_table: related.table.to_string(),
                    foreign_key: Some(column),
                    pivot_table: None,
                });
            }
            RelationKind::HasOneThrough => {
                let through_name = relation.through.as_deref().unwrap_or_default();
                let through = self.target(owner, relation, through_name)?;

                let owner_column = relation
                    .foreign_key
                    .as_deref()
                    .map(str::to_string)
                    .unwrap_or_else(|| naming::foreign_key_name(owner.name()));
                graph.add_column(&through.table, owner_key(owner, &owner_column));

                let through_column = relation
                    .through_foreign_key
                    .as_deref()
                    .map(str::to_string)
                    .unwrap_or_else(|| naming::foreign_key_name(through.name()));
                graph.add_column(&related.table, owner_key(through, &through_column));

                graph.plans.push(RelationPlan {
                    kind: relation.kind,
                    owner_model: owner.name().to_string(),
                    owner_table: owner.table.to_string(),
                    related_model: related.name().to_string(),
                    related_table: through.table.to_string(),
                    foreign_key: Some(owner_column),
                    pivot_table: None,
                });
            }
            RelationKind::BelongsTo => {
                // The inverse declaration owns the key; only the target is checked.
                graph.plans.push(RelationPlan {
                    kind: relation.kind,
                    owner_model: owner.name().to_string(),
                    owner_table: owner.table.to_string(),
                    related_model: related.name().to_string(),
                    related_table: related.table.to_string(),
                    foreign_key: None,
                    pivot_table: None,
                });
            }
            RelationKind::BelongsToMany => {
                let pivot = pivot_plan(owner, related, relation);
                let table = pivot.table.clone();
                if graph.pivots.contains_key(&table) {
                    debug!(pivot = %table, model = %owner.name, "pivot already planned");
                } else {
                    graph.pivots.insert(table.clone(), pivot);
                }
                graph.plans.push(RelationPlan {
                    kind: relation.kind,
                    owner_model: owner.name().to_string(),
                    owner_table: owner.table.to_string(),
                    related_model: related.name().to_string(),
                    related_table: related.table.to_string(),
                    foreign_key: None,
                    pivot_table: Some(table),
                });
            }
            RelationKind::MorphOne => {
                let morph = relation
                    .morph_name
                    .as_deref()
                    .map(str::to_string)
                    .unwrap_or_else(|| naming::morph_name(related.name()));
                graph.add_column(
                    &related.table,
                    ColumnSpec::new(format!("{}_id", morph), AttributeKind::Integer),
                );
                graph.add_column(
                    &related.table,
                    ColumnSpec::new(format!("{}_type", morph), AttributeKind::default_string()),
                );
                graph.plans.push(RelationPlan {
                    kind: relation.kind,
                    owner_model: owner.name().to_string(),
                    owner_table: owner.table.to_string(),
                    related_model: related.name().to_string(),
                    related_table: related.table.to_string(),
                    foreign_key: Some(format!("{}_id", morph)),
                    pivot_table: None,
                });
            }
        }

        Ok(())
    }
}

/// A column on another table pointing at `model`'s primary key.
fn owner_key(model: &ModelDescription, column: &str) -> ColumnSpec {
    key_column(column, model.primary_key_strategy)
        .references(ForeignKeyRef::cascade(model.table.as_str(), model.primary_key.as_str()))
}

fn key_column(name: &str, strategy: PrimaryKeyStrategy) -> ColumnSpec {
    let kind = match strategy {
        PrimaryKeyStrategy::AutoIncrement => AttributeKind::Integer,
        PrimaryKeyStrategy::Uuid => AttributeKind::Uuid,
    };
    ColumnSpec::new(name, kind)
}

fn pivot_plan(
    owner: &ModelDescription,
    related: &ModelDescription,
    relation: &RelationDeclaration,
) -> PivotPlan {
    let table = relation
        .pivot_table
        .as_deref()
        .map(str::to_string)
        .unwrap_or_else(|| naming::pivot_table_name(&owner.table, &related.table));
    let first_key = relation
        .first_foreign_key
        .as_deref()
        .map(str::to_string)
        .unwrap_or_else(|| naming::pivot_key_name(&owner.table, &owner.primary_key));
    let second_key = relation
        .second_foreign_key
        .as_deref()
        .map(str::to_string)
        .unwrap_or_else(|| naming::pivot_key_name(&related.table, &related.primary_key));

    PivotPlan {
        table,
        first_key,
        first_table: owner.table.to_string(),
        first_primary_key: owner.primary_key.to_string(),
        first_strategy: owner.primary_key_strategy,
        second_key,
        second_table: related.table.to_string(),
        second_primary_key: related.primary_key.to_string(),
        second_strategy: related.primary_key_strategy,
        declared_by: owner.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn models(list: Vec<ModelDescription>) -> ModelSet {
        list.into_iter().collect()
    }

    #[test]
    fn test_has_many_annotates_related_table() {
        let set = models(vec![
            ModelDescription::new("User")
                .with_relation(RelationDeclaration::new(RelationKind::HasMany, "Post")),
            ModelDescription::new("Post"),
        ]);
        let graph = RelationResolver::new(&set).resolve().unwrap();

        let fks = graph.foreign_keys_for("posts");
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].name, "user_id");
        assert_eq!(fks[0].kind, AttributeKind::Integer);
        assert_eq!(fks[0].references, Some(ForeignKeyRef::cascade("users", "id")));
        assert!(graph.foreign_keys_for("users").is_empty());
        assert_eq!(graph.relations_targeting("posts").count(), 1);
    }

    #[test]
    fn test_foreign_key_override_and_uuid_owner() {
        let mut team = ModelDescription::new("Team")
            .with_relation(RelationDeclaration::new(RelationKind::HasOne, "Profile").foreign_key("owner_team_id"));
        team.primary_key_strategy = PrimaryKeyStrategy::Uuid;
        let set = models(vec![team, ModelDescription::new("Profile")]);

        let graph = RelationResolver::new(&set).resolve().unwrap();
        let fks = graph.foreign_keys_for("profiles");
        assert_eq!(fks[0].name, "owner_team_id");
        assert_eq!(fks[0].kind, AttributeKind::Uuid);
    }

    #[test]
    fn test_pivot_declared_once() {
        let set = models(vec![
            ModelDescription::new("Post")
                .with_relation(RelationDeclaration::new(RelationKind::BelongsToMany, "Tag")),
            ModelDescription::new("Tag"),
        ]);
        let graph = RelationResolver::new(&set).resolve().unwrap();

        assert_eq!(graph.pivots.len(), 1);
        let pivot = &graph.pivots["post_tags"];
        assert_eq!(pivot.first_key, "post_id");
        assert_eq!(pivot.second_key, "tag_id");

        let plan = pivot.table_plan();
        assert_eq!(plan.column_names(), vec!["id", "post_id", "tag_id"]);
        assert_eq!(plan.referenced_tables(), vec!["posts", "tags"]);
    }

    #[test]
    fn test_pivot_declared_from_both_sides_is_deduplicated() {
        let set = models(vec![
            ModelDescription::new("Post")
                .with_relation(RelationDeclaration::new(RelationKind::BelongsToMany, "Tag")),
            ModelDescription::new("Tag")
                .with_relation(RelationDeclaration::new(RelationKind::BelongsToMany, "Post")),
        ]);
        let graph = RelationResolver::new(&set).resolve().unwrap();
        assert_eq!(graph.pivots.len(), 1);
        assert_eq!(graph.pivots["post_tags"].declared_by, "Post");
        assert_eq!(graph.plans.len(), 2);
    }

    #[test]
    fn test_pivot_overrides() {
        let set = models(vec![
            ModelDescription::new("User").with_relation(
                RelationDeclaration::new(RelationKind::BelongsToMany, "Role")
                    .pivot_table("user_roles")
                    .pivot_keys("member_id", "role_id"),
            ),
            ModelDescription::new("Role"),
        ]);
        let graph = RelationResolver::new(&set).resolve().unwrap();
        let pivot = &graph.pivots["user_roles"];
        assert_eq!(pivot.first_key, "member_id");
        assert_eq!(pivot.first_table, "users");
    }

    #[test]
    fn test_has_one_through() {
        let set = models(vec![
            ModelDescription::new("Mechanic").with_relation(
                RelationDeclaration::new(RelationKind::HasOneThrough, "Owner").through("Car"),
            ),
            ModelDescription::new("Car"),
            ModelDescription::new("Owner"),
        ]);
        let graph = RelationResolver::new(&set).resolve().unwrap();
        assert_eq!(graph.foreign_keys_for("cars")[0].name, "mechanic_id");
        assert_eq!(graph.foreign_keys_for("owners")[0].name, "car_id");
    }

    #[test]
    fn test_morph_one_columns_deduplicated() {
        let set = models(vec![
            ModelDescription::new("Post")
                .with_relation(RelationDeclaration::new(RelationKind::MorphOne, "Image")),
            ModelDescription::new("User")
                .with_relation(RelationDeclaration::new(RelationKind::MorphOne, "Image")),
            ModelDescription::new("Image"),
        ]);
        let graph = RelationResolver::new(&set).resolve().unwrap();
        let names: Vec<&str> = graph
            .foreign_keys_for("images")
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["imageable_id", "imageable_type"]);
    }

    #[test]
    fn test_missing_target_is_unresolved() {
        let set = models(vec![ModelDescription::new("Post")
            .with_relation(RelationDeclaration::new(RelationKind::BelongsToMany, "Tag"))]);
        let err = RelationResolver::new(&set).resolve().unwrap_err();
        match err {
            MigrationError::UnresolvedRelation { model, target, .. } => {
                assert_eq!(model, "Post");
                assert_eq!(target, "Tag");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_belongs_to_adds_no_column() {
        let set = models(vec![
            ModelDescription::new("Post")
                .with_relation(RelationDeclaration::new(RelationKind::BelongsTo, "User")),
            ModelDescription::new("User"),
        ]);
        let graph = RelationResolver::new(&set).resolve().unwrap();
        assert!(graph.foreign_keys_for("users").is_empty());
        assert!(graph.foreign_keys_for("posts").is_empty());
    }
}
