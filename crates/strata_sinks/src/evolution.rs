//! Live table reconciliation.
//!
//! Compares the desired columns of a flattened schema with the columns a live
//! table currently has and plans the DDL that closes the gap. Plans are applied
//! statement by statement with no surrounding transaction; a crash midway leaves
//! a partially evolved table, and the next run re-diffs from live state.

use std::collections::HashMap;
use std::fmt;

use strata_db::{quote_ident, quote_qualified, LiveColumn};
use strata_schema::ColumnType;

/// One planned change to a live table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterAction {
    /// Column is missing from the live table.
    Add { name: String, ty: ColumnType },
    /// Column exists with a different type: dropped (with its data) and re-added.
    Replace {
        name: String,
        from: ColumnType,
        to: ColumnType,
    },
}

impl AlterAction {
    pub fn column_name(&self) -> &str {
        match self {
            AlterAction::Add { name, .. } | AlterAction::Replace { name, .. } => name,
        }
    }

    /// DDL statements for this action against `namespace.table`.
    pub fn statements(&self, namespace: &str, table: &str) -> Vec<String> {
        let target = quote_qualified(namespace, table);
        match self {
            AlterAction::Add { name, ty } => vec![add_column_sql(&target, name, ty)],
            AlterAction::Replace { name, to, .. } => vec![
                format!("ALTER TABLE {} DROP COLUMN {}", target, quote_ident(name)),
                add_column_sql(&target, name, to),
            ],
        }
    }
}

fn add_column_sql(target: &str, name: &str, ty: &ColumnType) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        target,
        quote_ident(name),
        ty.as_sql()
    )
}

impl fmt::Display for AlterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlterAction::Add { name, ty } => write!(f, "Add column '{}' ({})", name, ty),
            AlterAction::Replace { name, from, to } => {
                write!(f, "Replace column '{}': {} -> {}", name, from, to)
            }
        }
    }
}

/// Ordered changes: every `Add` precedes every `Replace`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlterationPlan {
    actions: Vec<AlterAction>,
}

impl AlterationPlan {
    pub fn actions(&self) -> &[AlterAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn adds(&self) -> impl Iterator<Item = &AlterAction> {
        self.actions
            .iter()
            .filter(|a| matches!(a, AlterAction::Add { .. }))
    }

    pub fn replaces(&self) -> impl Iterator<Item = &AlterAction> {
        self.actions
            .iter()
            .filter(|a| matches!(a, AlterAction::Replace { .. }))
    }

    /// All DDL statements in application order.
    pub fn statements(&self, namespace: &str, table: &str) -> Vec<String> {
        self.actions
            .iter()
            .flat_map(|action| action.statements(namespace, table))
            .collect()
    }
}

/// Live `timestamp without time zone` columns are kept when the schema asks for
/// `timestamp with time zone`; every other type difference is a replace.
fn needs_replace(live: &ColumnType, desired: &ColumnType) -> bool {
    live != desired && !(*live == ColumnType::Timestamp && *desired == ColumnType::TimestampTz)
}

/// Plan the changes that bring `live` in line with `desired`.
///
/// Column names match case-insensitively. Live columns absent from `desired`
/// are left alone.
pub fn plan_alterations(desired: &[(String, ColumnType)], live: &[LiveColumn]) -> AlterationPlan {
    let live_by_name: HashMap<String, ColumnType> = live
        .iter()
        .map(|col| {
            (
                col.name.to_lowercase(),
                ColumnType::from_catalog(&col.data_type),
            )
        })
        .collect();

    let mut adds = Vec::new();
    let mut replaces = Vec::new();
    for (name, desired_type) in desired {
        match live_by_name.get(&name.to_lowercase()) {
            None => adds.push(AlterAction::Add {
                name: name.clone(),
                ty: desired_type.clone(),
            }),
            Some(live_type) if needs_replace(live_type, desired_type) => {
                replaces.push(AlterAction::Replace {
                    name: name.clone(),
                    from: live_type.clone(),
                    to: desired_type.clone(),
                })
            }
            Some(_) => {}
        }
    }

    adds.extend(replaces);
    AlterationPlan { actions: adds }
}
