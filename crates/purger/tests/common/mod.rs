//! In-memory purge store for orchestrator tests.
//!
//! Mirrors the compute schema closely enough to check ordering and
//! isolation: every delete is logged, selected deletes can be made to fail,
//! and foreign keys (events → actions → instance, dependents → instance) can
//! be enforced so an out-of-order delete fails like it would in PostgreSQL.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use purger_core::instance::InstanceRecord;
use purger_core::schema::{DependentTable, DEPENDENT_TABLES};
use purger_core::types::{DbId, Timestamp};
use purger_db::store::{PurgeStore, PurgeTx};

/// One store call, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Verify(String),
    Begin,
    ActionIds(String),
    DeleteEvents(DbId),
    DeleteDependent(&'static str, String),
    DeleteIdMapping(String),
    DeleteInstance(String),
    Commit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRow {
    pub record: InstanceRecord,
    /// Soft-delete marker; non-zero once deleted.
    pub deleted: i64,
}

/// Full table contents, comparable before and after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tables {
    pub instances: Vec<InstanceRow>,
    /// `(action id, instance uuid)`.
    pub actions: Vec<(DbId, String)>,
    /// `(event id, action id)`.
    pub events: Vec<(DbId, DbId)>,
    /// Direct dependents other than `instance_actions`, by table name.
    pub dependents: BTreeMap<&'static str, Vec<String>>,
    pub id_mappings: Vec<String>,
}

#[derive(Default)]
struct State {
    tables: Tables,
    ops: Vec<Op>,
    failing: HashSet<(String, String)>,
    failing_verify: HashSet<String>,
    enforce_foreign_keys: bool,
    next_id: DbId,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn check_failure(&self, table: &str, key: &str) -> Result<(), sqlx::Error> {
        if self.failing.contains(&(table.to_string(), key.to_string())) {
            Err(sqlx::Error::Protocol(format!(
                "injected failure deleting from {table} for {key}"
            )))
        } else {
            Ok(())
        }
    }

    fn fk_violation(table: &str) -> sqlx::Error {
        sqlx::Error::Protocol(format!(
            "update or delete on table \"{table}\" violates foreign key constraint"
        ))
    }

    fn references(&self, uuid: &str) -> usize {
        let actions = self.tables.actions.iter().filter(|(_, u)| u == uuid).count();
        let dependents: usize = self
            .tables
            .dependents
            .values()
            .map(|uuids| uuids.iter().filter(|u| *u == uuid).count())
            .sum();
        actions + dependents
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

pub fn ts(year: i32, month: u32, day: u32) -> Timestamp {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject deletes that would orphan rows, like the real schema.
    pub fn with_foreign_keys(self) -> Self {
        self.state.lock().unwrap().enforce_foreign_keys = true;
        self
    }

    /// Insert a soft-deleted instance and return its uuid.
    pub fn deleted_instance(&self, deleted_at: Timestamp, cell: Option<&str>) -> String {
        self.insert_instance(Some(deleted_at), cell)
    }

    /// Insert a live instance and return its uuid.
    pub fn live_instance(&self, cell: Option<&str>) -> String {
        self.insert_instance(None, cell)
    }

    fn insert_instance(&self, deleted_at: Option<Timestamp>, cell: Option<&str>) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let uuid = uuid::Uuid::new_v4().to_string();
        state.tables.instances.push(InstanceRow {
            record: InstanceRecord {
                id,
                uuid: Some(uuid.clone()),
                created_at: Some(ts(2013, 6, 1)),
                deleted_at,
                display_name: Some(format!("vm-{id}")),
                cell_name: cell.map(str::to_string),
            },
            deleted: if deleted_at.is_some() { id } else { 0 },
        });
        uuid
    }

    /// Give an instance one row in every direct dependent table, an id
    /// mapping, and `actions` actions with two events each.
    pub fn with_dependents(&self, uuid: &str, actions: usize) -> Vec<DbId> {
        let mut state = self.state.lock().unwrap();
        for table in DEPENDENT_TABLES {
            if *table != DependentTable::InstanceActions {
                state
                    .tables
                    .dependents
                    .entry(table.table_name())
                    .or_default()
                    .push(uuid.to_string());
            }
        }
        state.tables.id_mappings.push(uuid.to_string());

        let mut action_ids = Vec::new();
        for _ in 0..actions {
            let action_id = state.next_id();
            state.tables.actions.push((action_id, uuid.to_string()));
            for _ in 0..2 {
                let event_id = state.next_id();
                state.tables.events.push((event_id, action_id));
            }
            action_ids.push(action_id);
        }
        action_ids
    }

    /// Make the delete of `key` from `table` fail.
    pub fn fail_on(&self, table: &str, key: &str) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert((table.to_string(), key.to_string()));
    }

    /// Make the eligibility query for `uuid` fail.
    pub fn fail_verify(&self, uuid: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_verify
            .insert(uuid.to_string());
    }

    pub fn rename(&self, uuid: &str, display_name: &str) {
        let mut state = self.state.lock().unwrap();
        for row in &mut state.tables.instances {
            if row.record.uuid.as_deref() == Some(uuid) {
                row.record.display_name = Some(display_name.to_string());
            }
        }
    }

    /// Mark a soft-deleted instance as restored.
    pub fn restore(&self, uuid: &str) {
        let mut state = self.state.lock().unwrap();
        for row in &mut state.tables.instances {
            if row.record.uuid.as_deref() == Some(uuid) {
                row.deleted = 0;
            }
        }
    }

    pub fn tables(&self) -> Tables {
        self.state.lock().unwrap().tables.clone()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state.lock().unwrap().ops.clear();
    }

    pub fn has_instance(&self, uuid: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .tables
            .instances
            .iter()
            .any(|row| row.record.uuid.as_deref() == Some(uuid))
    }

    /// Rows in any table that still reference `uuid`, including events of
    /// its actions and the instance row itself.
    pub fn rows_referencing(&self, uuid: &str) -> usize {
        let state = self.state.lock().unwrap();
        let action_ids: Vec<DbId> = state
            .tables
            .actions
            .iter()
            .filter(|(_, u)| u == uuid)
            .map(|(id, _)| *id)
            .collect();
        let events = state
            .tables
            .events
            .iter()
            .filter(|(_, action)| action_ids.contains(action))
            .count();
        let mappings = state.tables.id_mappings.iter().filter(|u| *u == uuid).count();
        let instance = state
            .tables
            .instances
            .iter()
            .filter(|row| row.record.uuid.as_deref() == Some(uuid))
            .count();
        state.references(uuid) + events + mappings + instance
    }

    /// What a correct date query would return.
    pub fn expected_selection(&self, cutoff: Timestamp, cell: Option<&str>) -> Vec<InstanceRecord> {
        let state = self.state.lock().unwrap();
        select(&state.tables, cutoff, cell)
    }
}

fn select(tables: &Tables, cutoff: Timestamp, cell: Option<&str>) -> Vec<InstanceRecord> {
    tables
        .instances
        .iter()
        .filter(|row| row.deleted != 0)
        .filter(|row| row.record.deleted_at.is_some_and(|at| at < cutoff))
        .filter(|row| row.record.in_cell(cell))
        .map(|row| row.record.clone())
        .collect()
}

#[async_trait]
impl PurgeStore for MemoryStore {
    fn deleted_before<'a>(
        &'a self,
        cutoff: Timestamp,
        cell: Option<&'a str>,
    ) -> BoxStream<'a, Result<InstanceRecord, sqlx::Error>> {
        let records = select(&self.state.lock().unwrap().tables, cutoff, cell);
        stream::iter(records.into_iter().map(Ok)).boxed()
    }

    async fn is_soft_deleted(&self, uuid: &str) -> Result<bool, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Verify(uuid.to_string()));
        if state.failing_verify.contains(uuid) {
            return Err(sqlx::Error::Protocol("injected verification failure".into()));
        }
        Ok(state
            .tables
            .instances
            .iter()
            .any(|row| row.record.uuid.as_deref() == Some(uuid) && row.deleted != 0))
    }

    async fn begin(&self) -> Result<Box<dyn PurgeTx>, sqlx::Error> {
        self.state.lock().unwrap().ops.push(Op::Begin);
        Ok(Box::new(MemoryTx {
            state: Arc::clone(&self.state),
            committed: false,
        }))
    }
}

pub struct MemoryTx {
    state: Arc<Mutex<State>>,
    committed: bool,
}

#[async_trait]
impl PurgeTx for MemoryTx {
    async fn action_ids(&mut self, uuid: &str) -> Result<Vec<DbId>, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::ActionIds(uuid.to_string()));
        Ok(state
            .tables
            .actions
            .iter()
            .filter(|(_, u)| u == uuid)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn delete_action_events(&mut self, action_id: DbId) -> Result<u64, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::DeleteEvents(action_id));
        state.check_failure("instance_actions_events", &action_id.to_string())?;
        let before = state.tables.events.len();
        state.tables.events.retain(|(_, action)| *action != action_id);
        Ok((before - state.tables.events.len()) as u64)
    }

    async fn delete_dependent(
        &mut self,
        table: DependentTable,
        uuid: &str,
    ) -> Result<u64, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        let name = table.table_name();
        state.ops.push(Op::DeleteDependent(name, uuid.to_string()));
        state.check_failure(name, uuid)?;

        if table == DependentTable::InstanceActions {
            let owned: Vec<DbId> = state
                .tables
                .actions
                .iter()
                .filter(|(_, u)| u == uuid)
                .map(|(id, _)| *id)
                .collect();
            if state.enforce_foreign_keys
                && state.tables.events.iter().any(|(_, a)| owned.contains(a))
            {
                return Err(State::fk_violation(name));
            }
            let before = state.tables.actions.len();
            state.tables.actions.retain(|(_, u)| u != uuid);
            return Ok((before - state.tables.actions.len()) as u64);
        }

        let rows = state.tables.dependents.entry(name).or_default();
        let before = rows.len();
        rows.retain(|u| u != uuid);
        Ok((before - rows.len()) as u64)
    }

    async fn delete_id_mapping(&mut self, uuid: &str) -> Result<u64, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::DeleteIdMapping(uuid.to_string()));
        state.check_failure("instance_id_mappings", uuid)?;
        let before = state.tables.id_mappings.len();
        state.tables.id_mappings.retain(|u| u != uuid);
        Ok((before - state.tables.id_mappings.len()) as u64)
    }

    async fn delete_instance(&mut self, uuid: &str) -> Result<u64, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::DeleteInstance(uuid.to_string()));
        state.check_failure("instances", uuid)?;
        if state.enforce_foreign_keys && state.references(uuid) > 0 {
            return Err(State::fk_violation("instances"));
        }
        let before = state.tables.instances.len();
        state
            .tables
            .instances
            .retain(|row| row.record.uuid.as_deref() != Some(uuid));
        Ok((before - state.tables.instances.len()) as u64)
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        if self.committed {
            return Err(sqlx::Error::Protocol("already committed".into()));
        }
        self.committed = true;
        self.state.lock().unwrap().ops.push(Op::Commit);
        Ok(())
    }
}

/// Write a replay file with one line per record plus any `extra` lines.
pub fn write_replay(dir: &Path, records: &[InstanceRecord], extra: &[&str]) -> PathBuf {
    let mut contents = String::new();
    for record in records {
        contents.push_str(&format!("{record}\n"));
    }
    for line in extra {
        contents.push_str(line);
        contents.push('\n');
    }
    let path = dir.join("replay.csv");
    std::fs::write(&path, contents).unwrap();
    path
}

/// The single audit file a date run left in `dir`.
pub fn audit_file(dir: &Path) -> PathBuf {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("purge-"))
        })
        .collect();
    assert_eq!(files.len(), 1, "expected exactly one audit file, got {files:?}");
    files.remove(0)
}
