//! Storage Adapter Contract
//!
//! The engine never talks to a database directly. Everything goes through
//! a `StorageAdapter` that hands out transactions able to run structured
//! query expressions, apply migrations and report identities.

pub mod memory;

pub use memory::{MemoryAdapter, MemoryAdapterStats};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ModelResult;
use crate::migration::MigrationRecord;

/// A storage row: column name to value
pub type Row = Map<String, Value>;

/// Conjunction of equality conditions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.conditions.push((column.into(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// True when every condition holds for the row. Missing columns compare
    /// as null.
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions
            .iter()
            .all(|(column, value)| row.get(column).unwrap_or(&Value::Null) == value)
    }
}

/// Equality join used by view definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub table: String,
    pub left: String,
    pub right: String,
}

/// Structured query handed to adapters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryExpression {
    Insert {
        into: String,
        values: Row,
    },
    Update {
        table: String,
        values: Row,
        filter: Filter,
    },
    Delete {
        from: String,
        filter: Filter,
    },
    Select {
        from: String,
        /// Empty selects every column
        fields: Vec<String>,
        joins: Vec<Join>,
        filter: Filter,
        limit: Option<usize>,
    },
}

impl QueryExpression {
    pub fn insert(into: impl Into<String>, values: Row) -> Self {
        QueryExpression::Insert {
            into: into.into(),
            values,
        }
    }

    pub fn update(table: impl Into<String>, values: Row, filter: Filter) -> Self {
        QueryExpression::Update {
            table: table.into(),
            values,
            filter,
        }
    }

    pub fn delete(from: impl Into<String>, filter: Filter) -> Self {
        QueryExpression::Delete {
            from: from.into(),
            filter,
        }
    }

    pub fn select(from: impl Into<String>, filter: Filter) -> Self {
        QueryExpression::Select {
            from: from.into(),
            fields: Vec::new(),
            joins: Vec::new(),
            filter,
            limit: None,
        }
    }

    /// Restrict a select to the given columns
    pub fn fields(mut self, columns: Vec<String>) -> Self {
        if let QueryExpression::Select { fields, .. } = &mut self {
            *fields = columns;
        }
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        if let QueryExpression::Select { joins, .. } = &mut self {
            joins.push(join);
        }
        self
    }

    pub fn limit(mut self, count: usize) -> Self {
        if let QueryExpression::Select { limit, .. } = &mut self {
            *limit = Some(count);
        }
        self
    }

    /// Storage object the expression targets
    pub fn target(&self) -> &str {
        match self {
            QueryExpression::Insert { into, .. } => into,
            QueryExpression::Update { table, .. } => table,
            QueryExpression::Delete { from, .. } => from,
            QueryExpression::Select { from, .. } => from,
        }
    }
}

/// Outcome of an executed expression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub affected: u64,
}

impl QueryResult {
    pub fn rows(rows: Vec<Row>) -> Self {
        let affected = rows.len() as u64;
        Self { rows, affected }
    }

    pub fn affected(affected: u64) -> Self {
        Self {
            rows: Vec::new(),
            affected,
        }
    }
}

/// Source of transactions
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Begin a transaction. Operations of one transaction either all persist
    /// on commit or none do.
    async fn begin_transaction(&self) -> ModelResult<Box<dyn AdapterTransaction>>;

    /// Adapter name used in logs
    fn name(&self) -> &str {
        "adapter"
    }
}

/// An open transaction
#[async_trait]
pub trait AdapterTransaction: Send {
    /// Execute a query expression within the transaction
    async fn execute(&mut self, query: &QueryExpression) -> ModelResult<QueryResult>;

    /// Create or alter the storage object described by the record. The
    /// adapter sets `updated` when nothing had to change.
    async fn migrate(&mut self, migration: &mut MigrationRecord) -> ModelResult<()>;

    /// Pre-allocate the next identity of a Counter key. `None` means the
    /// adapter does not support it.
    async fn next_identity(&mut self, _storage: &str, _key: &str) -> ModelResult<Option<Value>> {
        Ok(None)
    }

    /// Identity generated by the last insert of this transaction
    async fn last_identity(&mut self) -> ModelResult<Option<Value>>;

    /// Create or replace a view. Returns false when views are unsupported.
    async fn create_view(&mut self, _name: &str, _query: &QueryExpression) -> ModelResult<bool> {
        Ok(false)
    }

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> ModelResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> ModelResult<()>;
}

/// Commit on success, roll back on failure. The original error wins over
/// a failed rollback.
pub async fn finish_transaction<T>(
    tx: Box<dyn AdapterTransaction>,
    result: ModelResult<T>,
) -> ModelResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            debug!("Transaction committed");
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_error) = tx.rollback().await {
                warn!("Rollback failed after '{}': {}", e, rollback_error);
            } else {
                debug!("Transaction rolled back: {}", e);
            }
            Err(e)
        }
    }
}
