//! Dependency-ordered deletion of one instance.
//!
//! Order per instance:
//!
//! 1. `instance_actions_events`, one delete per action of the instance
//! 2. the direct dependents in [`DEPENDENT_TABLES`] order
//! 3. `instance_id_mappings`
//! 4. `instances`
//!
//! Every statement is isolated: a failure is recorded and the next step
//! still runs. The instance row is always attempted.

use purger_core::outcome::{StepFailure, StepOutcome};
use purger_core::schema::{
    DependentTable, DEPENDENT_TABLES, INSTANCES, INSTANCE_ACTIONS_EVENTS, INSTANCE_ID_MAPPINGS,
};
use purger_db::store::PurgeTx;

/// Everything that happened while purging one instance.
#[derive(Debug, Clone, Default)]
pub struct InstancePurge {
    pub outcomes: Vec<StepOutcome>,
}

impl InstancePurge {
    /// Whether the instance row itself was removed.
    pub fn instance_removed(&self) -> bool {
        self.outcomes.iter().any(|outcome| {
            matches!(outcome, StepOutcome::Deleted { table, rows } if *table == INSTANCES.table && *rows > 0)
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepFailure> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            StepOutcome::Failed(failure) => Some(failure),
            StepOutcome::Deleted { .. } => None,
        })
    }

    fn record(&mut self, table: &'static str, key: &str, result: Result<u64, sqlx::Error>) {
        let outcome = match result {
            Ok(rows) => {
                tracing::debug!(table, key, rows, "Deleted rows");
                StepOutcome::Deleted { table, rows }
            }
            Err(e) => {
                tracing::error!(table, key, error = %e, "Delete failed");
                StepOutcome::Failed(StepFailure {
                    table,
                    key: key.to_string(),
                    cause: e.to_string(),
                })
            }
        };
        self.outcomes.push(outcome);
    }
}

/// Remove an instance and every row that references it.
///
/// `uuid` must already have passed eligibility verification.
pub async fn purge_instance<T>(tx: &mut T, uuid: &str) -> InstancePurge
where
    T: PurgeTx + ?Sized,
{
    let mut purge = InstancePurge::default();

    match tx.action_ids(uuid).await {
        Ok(action_ids) => {
            for action_id in action_ids {
                let result = tx.delete_action_events(action_id).await;
                purge.record(INSTANCE_ACTIONS_EVENTS.table, &action_id.to_string(), result);
            }
        }
        Err(e) => {
            let table = DependentTable::InstanceActions.table_name();
            purge.record(table, uuid, Err(e));
        }
    }

    for table in DEPENDENT_TABLES {
        let result = tx.delete_dependent(*table, uuid).await;
        purge.record(table.table_name(), uuid, result);
    }

    let result = tx.delete_id_mapping(uuid).await;
    purge.record(INSTANCE_ID_MAPPINGS.table, uuid, result);

    let result = tx.delete_instance(uuid).await;
    purge.record(INSTANCES.table, uuid, result);

    purge
}
