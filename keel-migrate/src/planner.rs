//! Table planning: merges a model's attributes with relation keys and trait
//! columns into one ordered column map.

use keel_schema::{Dialect, ModelDescription};
use tracing::trace;

use crate::column::{ColumnSpec, IndexSpec, TablePlan};
use crate::error::{MigrateResult, MigrationError};
use crate::relation::RelationGraph;
use crate::traits::{CompanionTable, TraitResolver};

/// A model's table and its companions.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPlan {
    /// Model name.
    pub model: String,
    /// The model's own table.
    pub table: TablePlan,
    /// Companion tables implied by traits.
    pub companions: Vec<CompanionTable>,
}

/// Plans tables from model descriptions.
pub struct TablePlanner<'a> {
    graph: &'a RelationGraph,
    traits: TraitResolver,
}

impl<'a> TablePlanner<'a> {
    /// Create a planner over resolved relations.
    pub fn new(graph: &'a RelationGraph, dialect: Dialect) -> Self {
        Self {
            graph,
            traits: TraitResolver::new(dialect),
        }
    }

    /// Plan the table of one model.
    ///
    /// Column order: primary key, `uuid` and social columns, attributes,
    /// relation keys, then auth, billing, counters, timestamps and the
    /// soft-delete column. A declared attribute wins over any implied column
    /// of the same name.
    pub fn plan(&self, model: &ModelDescription) -> MigrateResult<ModelPlan> {
        let traits = self.traits.resolve(model);
        let pk = model.primary_key.as_str();
        let mut table = TablePlan::new(model.table.as_str());
        table.model = Some(model.name().to_string());

        let attributes: Vec<ColumnSpec> = model
            .ordered_attributes()
            .into_iter()
            .filter(|(name, _)| name.as_str() != pk)
            .map(|(name, attr)| ColumnSpec::from_attribute(name.as_str(), attr))
            .collect();
        let declared = |name: &str| attributes.iter().any(|c| c.name == name);

        table.push_column(ColumnSpec::primary(pk, model.primary_key_strategy));
        for column in traits.leading {
            if !declared(&column.name) {
                table.push_column(column);
            }
        }
        for column in attributes.iter().cloned() {
            table.push_column(column);
        }

        let mut relation_keys = Vec::new();
        for column in self.graph.foreign_keys_for(&model.table) {
            if declared(&column.name) {
                trace!(model = %model.name, column = %column.name, "attribute shadows relation key");
                continue;
            }
            if table.push_column(column.clone()) && column.references.is_some() {
                relation_keys.push(column.name.clone());
            }
        }

        for column in traits.trailing {
            if !declared(&column.name) {
                table.push_column(column);
            }
        }

        for index in &model.indexes {
            let columns: Vec<String> = index.columns.iter().map(|c| c.to_string()).collect();
            if let Some(missing) = columns.iter().find(|c| !table.columns.contains_key(c.as_str())) {
                return Err(MigrationError::invalid_model(
                    model.name(),
                    format!("index `{}` references unknown column `{}`", index.name, missing),
                ));
            }
            table.push_index(IndexSpec::new(index.name.as_str(), columns));
        }
        for column in &relation_keys {
            table.push_index(IndexSpec::for_column(&model.table, column));
        }
        for index in traits.indexes {
            if index.columns.iter().all(|c| table.columns.contains_key(c)) {
                table.push_index(index);
            }
        }

        Ok(ModelPlan {
            model: model.name().to_string(),
            table,
            companions: traits.companions,
        })
    }
}
