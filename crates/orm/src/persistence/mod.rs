//! Persistence Orchestrator
//!
//! Saves and removes objects inside one transaction per call. Every object
//! runs through its model's event pipeline; inherited models store their
//! share of the object first and the derived row reuses the base key.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::adapter::{finish_transaction, AdapterTransaction, Filter, QueryExpression, Row};
use crate::context::DataContext;
use crate::error::{ModelError, ModelResult};
use crate::events::{DataEvent, EventPhase, ExecuteEvent};
use crate::migration::MigrationPlanner;
use crate::object::{DataObject, ObjectState};
use crate::schema::DataModel;
use crate::BoxFuture;

/// Read options
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Serve from and fill the model cache when the model allows it
    pub cache: bool,
}

impl ExecuteOptions {
    pub fn cached() -> Self {
        Self { cache: true }
    }
}

/// Runs saves, removes and keyed reads for a context
pub struct Persister<'a> {
    context: &'a DataContext,
}

impl<'a> Persister<'a> {
    pub fn new(context: &'a DataContext) -> Self {
        Self { context }
    }

    /// Save objects in order within one transaction. Any failure rolls the
    /// whole batch back.
    pub async fn save(&self, model: &DataModel, objects: Vec<DataObject>) -> ModelResult<Vec<DataObject>> {
        if objects.is_empty() {
            return Ok(Vec::new());
        }
        MigrationPlanner::new(self.context).migrate(model).await?;

        let count = objects.len();
        let mut tx = self.context.adapter().begin_transaction().await?;
        let result = self.save_all(model, objects, &mut *tx).await;
        let saved = finish_transaction(tx, result).await?;
        info!("Saved {} {} object(s)", count, model.name());
        Ok(saved)
    }

    async fn save_all(
        &self,
        model: &DataModel,
        objects: Vec<DataObject>,
        tx: &mut dyn AdapterTransaction,
    ) -> ModelResult<Vec<DataObject>> {
        let mut saved = Vec::with_capacity(objects.len());
        for object in objects {
            saved.push(self.save_within(model, object, &mut *tx).await?);
        }
        Ok(saved)
    }

    pub async fn insert(&self, model: &DataModel, objects: Vec<DataObject>) -> ModelResult<Vec<DataObject>> {
        self.save(model, with_state(objects, ObjectState::Insert)).await
    }

    pub async fn update(&self, model: &DataModel, objects: Vec<DataObject>) -> ModelResult<Vec<DataObject>> {
        self.save(model, with_state(objects, ObjectState::Update)).await
    }

    pub async fn remove(&self, model: &DataModel, objects: Vec<DataObject>) -> ModelResult<Vec<DataObject>> {
        self.save(model, with_state(objects, ObjectState::Delete)).await
    }

    /// Save one object inside an open transaction
    pub fn save_within<'b>(
        &'b self,
        model: &'b DataModel,
        mut object: DataObject,
        tx: &'b mut dyn AdapterTransaction,
    ) -> BoxFuture<'b, ModelResult<DataObject>> {
        Box::pin(async move {
            if object.state == Some(ObjectState::Delete) {
                return self.remove_within(model, object, tx).await;
            }

            let key = model.primary_key()?;
            let state = object.state.unwrap_or_else(|| {
                if object.key_value(&key.name).is_some() {
                    ObjectState::Update
                } else {
                    ObjectState::Insert
                }
            });
            let pipeline = model.pipeline()?;

            let state = {
                let mut event = DataEvent {
                    model,
                    context: self.context,
                    target: &mut object,
                    state,
                    previous: None,
                    tx: &mut *tx,
                };
                pipeline.emit(EventPhase::BeforeSave, &mut event).await?;
                event.state
            };
            object.state = Some(state);

            if let Some(base) = model.base()? {
                let inherited = DataObject {
                    type_name: base.name().to_string(),
                    state: Some(state),
                    payload: object.payload.clone(),
                };
                let saved = self.save_within(&base, inherited, &mut *tx).await?;
                for (name, value) in saved.payload {
                    object.payload.insert(name, value);
                }
            }

            let source = model.source_adapter();
            let mut row = model.cast(&object.payload, state)?;
            match state {
                ObjectState::Insert => {
                    let generated = key.type_name == "Counter"
                        && row.get(&key.name).map_or(true, Value::is_null);
                    if generated {
                        let id = self.insert_with_identity(&source, &key.name, row, &mut *tx).await?;
                        object.set(key.name.clone(), id);
                    } else {
                        tx.execute(&QueryExpression::insert(source, row)).await?;
                    }
                }
                ObjectState::Update => {
                    let id = object
                        .key_value(&key.name)
                        .cloned()
                        .ok_or_else(|| ModelError::MissingPrimaryKey(model.name().to_string()))?;
                    row.remove(&key.name);
                    if row.is_empty() {
                        debug!("Nothing to update in {} for {}({})", source, model.name(), id);
                    } else {
                        tx.execute(&QueryExpression::update(
                            source,
                            row,
                            Filter::new().eq(key.name.clone(), id),
                        ))
                        .await?;
                    }
                }
                ObjectState::Delete => {}
            }

            let mut event = DataEvent {
                model,
                context: self.context,
                target: &mut object,
                state,
                previous: None,
                tx: &mut *tx,
            };
            pipeline.emit(EventPhase::AfterSave, &mut event).await?;
            Ok(object)
        })
    }

    /// Insert a row whose Counter key the storage generates. A pre-allocated
    /// identity is used when the adapter offers one, otherwise the last
    /// identity of the transaction is read back after the insert.
    async fn insert_with_identity(
        &self,
        source: &str,
        key: &str,
        mut row: Row,
        tx: &mut dyn AdapterTransaction,
    ) -> ModelResult<Value> {
        if self.context.config().settings().use_next_identity {
            if let Some(id) = tx.next_identity(source, key).await? {
                row.insert(key.to_string(), id.clone());
                tx.execute(&QueryExpression::insert(source, row)).await?;
                return Ok(id);
            }
        }

        row.remove(key);
        tx.execute(&QueryExpression::insert(source, row)).await?;
        // Only reliable while nothing else inserts on this transaction's
        // connection between the two calls.
        tx.last_identity().await?.ok_or_else(|| {
            ModelError::Database(format!("No identity was generated for {}", source))
        })
    }

    /// Remove one object inside an open transaction. The derived row goes
    /// first, then the inherited ones.
    pub fn remove_within<'b>(
        &'b self,
        model: &'b DataModel,
        mut object: DataObject,
        tx: &'b mut dyn AdapterTransaction,
    ) -> BoxFuture<'b, ModelResult<DataObject>> {
        Box::pin(async move {
            let key = model.primary_key()?;
            let pipeline = model.pipeline()?;
            object.state = Some(ObjectState::Delete);

            {
                let mut event = DataEvent {
                    model,
                    context: self.context,
                    target: &mut object,
                    state: ObjectState::Delete,
                    previous: None,
                    tx: &mut *tx,
                };
                pipeline.emit(EventPhase::BeforeRemove, &mut event).await?;
            }

            let id = object
                .key_value(&key.name)
                .cloned()
                .ok_or_else(|| ModelError::MissingPrimaryKey(model.name().to_string()))?;
            let result = tx
                .execute(&QueryExpression::delete(
                    model.source_adapter(),
                    Filter::new().eq(key.name.clone(), id.clone()),
                ))
                .await?;
            if result.affected == 0 {
                warn!("{}({}) was not stored, nothing removed", model.name(), id);
            }

            if let Some(base) = model.base()? {
                let inherited = DataObject {
                    type_name: base.name().to_string(),
                    state: Some(ObjectState::Delete),
                    payload: object.payload.clone(),
                };
                self.remove_within(&base, inherited, &mut *tx).await?;
            }

            let mut event = DataEvent {
                model,
                context: self.context,
                target: &mut object,
                state: ObjectState::Delete,
                previous: None,
                tx: &mut *tx,
            };
            pipeline.emit(EventPhase::AfterRemove, &mut event).await?;
            Ok(object)
        })
    }

    /// Read one object by key, inherited columns included
    pub async fn get(&self, model: &DataModel, key: Value, options: ExecuteOptions) -> ModelResult<Option<DataObject>> {
        MigrationPlanner::new(self.context).migrate(model).await?;
        let mut tx = self.context.adapter().begin_transaction().await?;
        let result = self.get_within(model, key, options, &mut *tx).await;
        finish_transaction(tx, result).await
    }

    async fn get_within(
        &self,
        model: &DataModel,
        key: Value,
        options: ExecuteOptions,
        tx: &mut dyn AdapterTransaction,
    ) -> ModelResult<Option<DataObject>> {
        let attribute = model.primary_key()?;
        let pipeline = model.pipeline()?;
        let filter = Filter::new().eq(attribute.name.clone(), key.clone());

        let mut event = ExecuteEvent {
            model,
            context: self.context,
            query: QueryExpression::select(model.source_adapter(), filter.clone()).limit(1),
            key: Some(key),
            cache: options.cache,
            result: None,
            tx,
        };
        pipeline.emit_execute(EventPhase::BeforeExecute, &mut event).await?;

        if event.result.is_none() {
            let mut rows = event.tx.execute(&event.query).await?.rows;
            if let Some(row) = rows.first_mut() {
                let mut current = model.base()?;
                while let Some(base) = current {
                    let inherited = event
                        .tx
                        .execute(&QueryExpression::select(base.source_adapter(), filter.clone()).limit(1))
                        .await?;
                    if let Some(base_row) = inherited.rows.into_iter().next() {
                        for (name, value) in base_row {
                            row.entry(name).or_insert(value);
                        }
                    }
                    current = base.base()?;
                }
            }
            event.result = Some(rows);
        }

        pipeline.emit_execute(EventPhase::AfterExecute, &mut event).await?;
        let rows = event.result.take().unwrap_or_default();
        Ok(rows
            .first()
            .map(|row| DataObject::new(model.name(), model.convert(row))))
    }
}

fn with_state(objects: Vec<DataObject>, state: ObjectState) -> Vec<DataObject> {
    objects.into_iter().map(|o| o.with_state(state)).collect()
}

impl DataModel {
    /// Save objects of this model in one transaction
    pub async fn save(&self, context: &DataContext, objects: Vec<DataObject>) -> ModelResult<Vec<DataObject>> {
        Persister::new(context).save(self, objects).await
    }

    /// Save a single JSON object, `$state` honoured
    pub async fn save_one(&self, context: &DataContext, value: Value) -> ModelResult<DataObject> {
        let object = DataObject::from_value(self.name(), value)?;
        Persister::new(context)
            .save(self, vec![object])
            .await?
            .pop()
            .ok_or_else(|| ModelError::Database(format!("{} object was not saved", self.name())))
    }

    pub async fn insert(&self, context: &DataContext, objects: Vec<DataObject>) -> ModelResult<Vec<DataObject>> {
        Persister::new(context).insert(self, objects).await
    }

    pub async fn update(&self, context: &DataContext, objects: Vec<DataObject>) -> ModelResult<Vec<DataObject>> {
        Persister::new(context).update(self, objects).await
    }

    pub async fn remove(&self, context: &DataContext, objects: Vec<DataObject>) -> ModelResult<Vec<DataObject>> {
        Persister::new(context).remove(self, objects).await
    }

    /// Bring the storage of this model and its bases up to date
    pub async fn migrate(&self, context: &DataContext) -> ModelResult<()> {
        MigrationPlanner::new(context).migrate(self).await
    }

    pub async fn get(&self, context: &DataContext, key: Value, options: ExecuteOptions) -> ModelResult<Option<DataObject>> {
        Persister::new(context).get(self, key, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;
    use crate::config::DataConfiguration;
    use serde_json::json;
    use std::sync::Arc;

    const MODELS: &str = r#"[
        { "name": "Thing", "fields": [
            { "name": "id", "type": "Counter", "primary": true },
            { "name": "name", "type": "Text", "size": 100 },
            { "name": "dateCreated", "type": "DateTime", "readonly": true, "editable": false, "value": "now()" }
        ] },
        { "name": "Product", "inherits": "Thing", "fields": [
            { "name": "price", "type": "Number", "validation": { "minValue": 0 } },
            { "name": "sku", "type": "Text", "nullable": false }
        ] }
    ]"#;

    fn context(adapter: Arc<MemoryAdapter>) -> DataContext {
        let config = DataConfiguration::builder()
            .models_from_json(MODELS)
            .unwrap()
            .build()
            .unwrap();
        DataContext::new(config, adapter)
    }

    #[tokio::test]
    async fn test_insert_assigns_key_through_base() {
        let adapter = Arc::new(MemoryAdapter::new());
        let context = context(adapter.clone());
        let product = context.model("Product").unwrap();

        let saved = product
            .save_one(&context, json!({ "name": "Lamp", "price": 10, "sku": "L-1" }))
            .await
            .unwrap();
        assert_eq!(saved.state, Some(ObjectState::Insert));
        let id = saved.key_value("id").cloned().unwrap();

        let things = adapter.rows("ThingBase").await;
        let products = adapter.rows("ProductBase").await;
        assert_eq!(things.len(), 1);
        assert_eq!(things[0]["id"], id);
        assert_eq!(things[0]["name"], "Lamp");
        assert!(!things[0]["dateCreated"].is_null());
        assert_eq!(products[0]["id"], id);
        assert!(products[0].get("name").is_none());
    }

    #[tokio::test]
    async fn test_get_merges_inherited_columns() {
        let adapter = Arc::new(MemoryAdapter::new());
        let context = context(adapter.clone());
        let product = context.model("Product").unwrap();

        let saved = product
            .save_one(&context, json!({ "name": "Desk", "price": 120.5, "sku": "D-1" }))
            .await
            .unwrap();
        let id = saved.key_value("id").cloned().unwrap();

        let loaded = product
            .get(&context, id.clone(), ExecuteOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.get("name"), Some(&json!("Desk")));
        assert_eq!(loaded.get("price"), Some(&json!(120.5)));

        assert!(product
            .get(&context, json!(999), ExecuteOptions::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_leaves_readonly_columns() {
        let adapter = Arc::new(MemoryAdapter::new());
        let context = context(adapter.clone());
        let product = context.model("Product").unwrap();

        let saved = product
            .save_one(&context, json!({ "name": "Chair", "price": 40, "sku": "C-1" }))
            .await
            .unwrap();
        let created = adapter.rows("ThingBase").await[0]["dateCreated"].clone();

        let mut update = saved.payload.clone();
        update.insert("price".to_string(), json!(45));
        update.insert("dateCreated".to_string(), json!("2000-01-01T00:00:00Z"));
        let updated = product
            .save(&context, vec![DataObject::new("Product", update)])
            .await
            .unwrap();
        assert_eq!(updated[0].state, Some(ObjectState::Update));

        assert_eq!(adapter.rows("ProductBase").await[0]["price"], 45);
        assert_eq!(adapter.rows("ThingBase").await[0]["dateCreated"], created);
    }

    #[tokio::test]
    async fn test_batch_rolls_back_on_failure() {
        let adapter = Arc::new(MemoryAdapter::new());
        let context = context(adapter.clone());
        let product = context.model("Product").unwrap();
        product.migrate(&context).await.unwrap();
        let rollbacks = adapter.stats().rollbacks();

        let objects = vec![
            DataObject::from_value("Product", json!({ "name": "A", "price": 1, "sku": "A" })).unwrap(),
            DataObject::from_value("Product", json!({ "name": "B", "price": -1, "sku": "B" })).unwrap(),
            DataObject::from_value("Product", json!({ "name": "C", "price": 3, "sku": "C" })).unwrap(),
        ];
        let err = product.save(&context, objects).await.unwrap_err();

        assert_eq!(err.as_field_error().unwrap().field, "price");
        assert!(adapter.rows("ProductBase").await.is_empty());
        assert!(adapter.rows("ThingBase").await.is_empty());
        assert_eq!(adapter.stats().rollbacks(), rollbacks + 1);
    }

    #[tokio::test]
    async fn test_remove_deletes_inherited_rows() {
        let adapter = Arc::new(MemoryAdapter::new());
        let context = context(adapter.clone());
        let product = context.model("Product").unwrap();

        let saved = product
            .save_one(&context, json!({ "name": "Shelf", "price": 15, "sku": "S-1" }))
            .await
            .unwrap();
        product
            .remove(&context, vec![DataObject::new("Product", saved.payload)])
            .await
            .unwrap();

        assert!(adapter.rows("ProductBase").await.is_empty());
        assert!(adapter.rows("ThingBase").await.is_empty());
    }

    #[tokio::test]
    async fn test_state_marker_removes() {
        let adapter = Arc::new(MemoryAdapter::new());
        let context = context(adapter.clone());
        let thing = context.model("Thing").unwrap();

        let saved = thing.save_one(&context, json!({ "name": "Box" })).await.unwrap();
        let id = saved.key_value("id").cloned().unwrap();
        let removed = thing
            .save_one(&context, json!({ "id": id, "$state": 4 }))
            .await
            .unwrap();

        assert_eq!(removed.state, Some(ObjectState::Delete));
        assert!(adapter.rows("ThingBase").await.is_empty());
    }

    #[tokio::test]
    async fn test_preallocated_identity() {
        let adapter = Arc::new(MemoryAdapter::new().with_next_identity(true));
        let context = context(adapter.clone());
        let thing = context.model("Thing").unwrap();

        let first = thing.save_one(&context, json!({ "name": "One" })).await.unwrap();
        let second = thing.save_one(&context, json!({ "name": "Two" })).await.unwrap();
        assert_eq!(first.get("id"), Some(&json!(1)));
        assert_eq!(second.get("id"), Some(&json!(2)));
    }
}
