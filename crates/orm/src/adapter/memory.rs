//! In-memory storage adapter
//!
//! Keeps tables as vectors of JSON rows. A transaction holds the store lock
//! for its whole lifetime and works on a copy that replaces the committed
//! state on commit. Used by the test suites and for prototyping models
//! without a database.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::{AdapterTransaction, QueryExpression, QueryResult, Row, StorageAdapter};
use crate::error::{ModelError, ModelResult};
use crate::migration::{MigrationField, MigrationIndex, MigrationRecord};

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<MigrationField>,
    indexes: Vec<MigrationIndex>,
    rows: Vec<Row>,
    counter: i64,
}

impl Table {
    fn counter_key(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.primary && c.type_name == "Counter")
            .map(|c| c.name.as_str())
    }

    fn primary_key(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.primary)
            .map(|c| c.name.as_str())
    }
}

#[derive(Debug, Clone, Default)]
struct Store {
    tables: BTreeMap<String, Table>,
    views: BTreeMap<String, QueryExpression>,
}

/// Counters describing adapter activity
#[derive(Debug, Default)]
pub struct MemoryAdapterStats {
    migrate_calls: AtomicUsize,
    ddl_changes: AtomicUsize,
    executed: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl MemoryAdapterStats {
    /// Calls to `migrate`
    pub fn migrate_calls(&self) -> usize {
        self.migrate_calls.load(Ordering::SeqCst)
    }

    /// Migrations that created or altered a table
    pub fn ddl_changes(&self) -> usize {
        self.ddl_changes.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }
}

/// In-memory adapter
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    store: Arc<Mutex<Store>>,
    stats: Arc<MemoryAdapterStats>,
    next_identity: bool,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pre-allocated identities through `next_identity`
    pub fn with_next_identity(mut self, enabled: bool) -> Self {
        self.next_identity = enabled;
        self
    }

    pub fn stats(&self) -> &MemoryAdapterStats {
        &self.stats
    }

    /// Committed rows of a table
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        let store = self.store.lock().await;
        store
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub async fn has_table(&self, table: &str) -> bool {
        self.store.lock().await.tables.contains_key(table)
    }

    /// Committed column names of a table
    pub async fn columns(&self, table: &str) -> Vec<String> {
        let store = self.store.lock().await;
        store
            .tables
            .get(table)
            .map(|t| t.columns.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Committed index names of a table
    pub async fn indexes(&self, table: &str) -> Vec<String> {
        let store = self.store.lock().await;
        store
            .tables
            .get(table)
            .map(|t| t.indexes.iter().map(|i| i.name.clone()).collect())
            .unwrap_or_default()
    }

    pub async fn view(&self, name: &str) -> Option<QueryExpression> {
        self.store.lock().await.views.get(name).cloned()
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    async fn begin_transaction(&self) -> ModelResult<Box<dyn AdapterTransaction>> {
        let guard = self.store.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            stats: self.stats.clone(),
            next_identity: self.next_identity,
            last_identity: None,
        }))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Transaction over a private copy of the store
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Store>,
    working: Store,
    stats: Arc<MemoryAdapterStats>,
    next_identity: bool,
    last_identity: Option<Value>,
}

impl MemoryTransaction {
    fn table_mut(&mut self, name: &str) -> ModelResult<&mut Table> {
        self.working
            .tables
            .get_mut(name)
            .ok_or_else(|| ModelError::Database(format!("Storage object '{}' does not exist", name)))
    }

    fn insert(&mut self, into: &str, values: &Row) -> ModelResult<QueryResult> {
        let table = self.table_mut(into)?;
        let mut row = values.clone();

        let mut generated = None;
        if let Some(key) = table.counter_key().map(str::to_string) {
            match row.get(&key).and_then(Value::as_i64) {
                Some(id) => table.counter = table.counter.max(id),
                None => {
                    table.counter += 1;
                    let id = Value::from(table.counter);
                    row.insert(key, id.clone());
                    generated = Some(id);
                }
            }
        }

        if let Some(key) = table.primary_key() {
            let value = row.get(key).cloned().unwrap_or(Value::Null);
            if !value.is_null() && table.rows.iter().any(|r| r.get(key) == Some(&value)) {
                return Err(ModelError::Database(format!(
                    "Duplicate key {} in '{}'",
                    value, into
                )));
            }
        }

        for index in table.indexes.iter().filter(|i| i.unique) {
            // Nulls never collide
            if index.columns.iter().any(|c| row.get(c).map_or(true, Value::is_null)) {
                continue;
            }
            let duplicate = table.rows.iter().any(|existing| {
                index
                    .columns
                    .iter()
                    .all(|c| existing.get(c).unwrap_or(&Value::Null) == row.get(c).unwrap_or(&Value::Null))
            });
            if duplicate {
                return Err(ModelError::Database(format!(
                    "Unique index '{}' violated in '{}'",
                    index.name, into
                )));
            }
        }

        table.rows.push(row);
        if generated.is_some() {
            self.last_identity = generated;
        }
        Ok(QueryResult::affected(1))
    }
}

#[async_trait]
impl AdapterTransaction for MemoryTransaction {
    async fn execute(&mut self, query: &QueryExpression) -> ModelResult<QueryResult> {
        self.stats.executed.fetch_add(1, Ordering::SeqCst);
        debug!("Executing {:?}", query);

        match query {
            QueryExpression::Insert { into, values } => self.insert(into, values),
            QueryExpression::Update {
                table,
                values,
                filter,
            } => {
                let table = self.table_mut(table)?;
                let mut affected = 0;
                for row in table.rows.iter_mut().filter(|r| filter.matches(r)) {
                    for (column, value) in values {
                        row.insert(column.clone(), value.clone());
                    }
                    affected += 1;
                }
                Ok(QueryResult::affected(affected))
            }
            QueryExpression::Delete { from, filter } => {
                let table = self.table_mut(from)?;
                let before = table.rows.len();
                table.rows.retain(|r| !filter.matches(r));
                Ok(QueryResult::affected((before - table.rows.len()) as u64))
            }
            QueryExpression::Select {
                from,
                fields,
                joins,
                filter,
                limit,
            } => {
                if !joins.is_empty() {
                    return Err(ModelError::Query(
                        "Joins are not supported by the memory adapter".to_string(),
                    ));
                }
                let table = self.table_mut(from)?;
                let rows = table
                    .rows
                    .iter()
                    .filter(|r| filter.matches(r))
                    .take(limit.unwrap_or(usize::MAX))
                    .map(|r| {
                        if fields.is_empty() {
                            r.clone()
                        } else {
                            fields
                                .iter()
                                .filter_map(|f| r.get(f).map(|v| (f.clone(), v.clone())))
                                .collect()
                        }
                    })
                    .collect();
                Ok(QueryResult::rows(rows))
            }
        }
    }

    async fn migrate(&mut self, migration: &mut MigrationRecord) -> ModelResult<()> {
        self.stats.migrate_calls.fetch_add(1, Ordering::SeqCst);

        let table = self
            .working
            .tables
            .entry(migration.applies_to.clone())
            .or_default();

        let mut changed = false;
        for field in &migration.add {
            match table.columns.iter().find(|c| c.name == field.name) {
                Some(existing) if existing.type_name != field.type_name => {
                    return Err(ModelError::Database(format!(
                        "Column '{}' of '{}' cannot change type from {} to {}",
                        field.name, migration.applies_to, existing.type_name, field.type_name
                    )));
                }
                Some(_) => {}
                None => {
                    table.columns.push(field.clone());
                    changed = true;
                }
            }
        }
        for index in &migration.indexes {
            if !table.indexes.iter().any(|i| i.name == index.name) {
                table.indexes.push(index.clone());
                changed = true;
            }
        }

        migration.updated = !changed;
        if changed {
            self.stats.ddl_changes.fetch_add(1, Ordering::SeqCst);
            debug!("Migrated storage object '{}'", migration.applies_to);
        }
        Ok(())
    }

    async fn next_identity(&mut self, storage: &str, _key: &str) -> ModelResult<Option<Value>> {
        if !self.next_identity {
            return Ok(None);
        }
        let table = self.table_mut(storage)?;
        table.counter += 1;
        Ok(Some(Value::from(table.counter)))
    }

    async fn last_identity(&mut self) -> ModelResult<Option<Value>> {
        Ok(self.last_identity.clone())
    }

    async fn create_view(&mut self, name: &str, query: &QueryExpression) -> ModelResult<bool> {
        self.working.views.insert(name.to_string(), query.clone());
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> ModelResult<()> {
        let MemoryTransaction {
            mut guard,
            working,
            stats,
            ..
        } = *self;
        *guard = working;
        stats.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> ModelResult<()> {
        self.stats.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
