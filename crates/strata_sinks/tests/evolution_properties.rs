//! Property tests for alteration planning.
//!
//! Applying a plan to the live column list and planning again must yield
//! nothing, and unseen columns are only ever added.

use proptest::prelude::*;
use strata_db::LiveColumn;
use strata_schema::ColumnType;
use strata_sinks::{plan_alterations, AlterAction};

fn column_type() -> impl Strategy<Value = ColumnType> {
    prop_oneof![
        Just(ColumnType::Text),
        Just(ColumnType::Numeric),
        Just(ColumnType::BigInt),
        Just(ColumnType::Boolean),
        Just(ColumnType::Jsonb),
        Just(ColumnType::TimestampTz),
        Just(ColumnType::Date),
    ]
}

fn live_type() -> impl Strategy<Value = ColumnType> {
    prop_oneof![column_type(), Just(ColumnType::Timestamp)]
}

/// Mirror of what the DDL does to the live catalog.
fn apply(live: &mut Vec<LiveColumn>, actions: &[AlterAction]) {
    for action in actions {
        match action {
            AlterAction::Add { name, ty } => live.push(LiveColumn {
                name: name.clone(),
                data_type: ty.as_sql().to_string(),
            }),
            AlterAction::Replace { name, to, .. } => {
                live.retain(|c| !c.name.eq_ignore_ascii_case(name));
                live.push(LiveColumn {
                    name: name.clone(),
                    data_type: to.as_sql().to_string(),
                });
            }
        }
    }
}

proptest! {
    #[test]
    fn applied_plan_converges(
        desired in prop::collection::btree_map("[a-e]", column_type(), 0..5),
        live in prop::collection::btree_map("[a-h]", live_type(), 0..8),
    ) {
        let desired: Vec<(String, ColumnType)> = desired.into_iter().collect();
        let mut live: Vec<LiveColumn> = live
            .into_iter()
            .map(|(name, ty)| LiveColumn { name: name.to_uppercase(), data_type: ty.as_sql().to_uppercase() })
            .collect();

        let plan = plan_alterations(&desired, &live);
        apply(&mut live, plan.actions());
        prop_assert!(plan_alterations(&desired, &live).is_empty());
    }

    #[test]
    fn unseen_columns_are_added(desired in prop::collection::btree_map("[a-z]{1,8}", column_type(), 1..6)) {
        let desired: Vec<(String, ColumnType)> = desired.into_iter().collect();
        let plan = plan_alterations(&desired, &[]);
        prop_assert_eq!(plan.len(), desired.len());
        let all_adds = plan.actions().iter().all(|a| matches!(a, AlterAction::Add { .. }));
        prop_assert!(all_adds);
    }
}
