//! Migration planning and execution

use tracing::{debug, info};

use super::record::{MigrationField, MigrationIndex, MigrationRecord};
use crate::adapter::{finish_transaction, AdapterTransaction, Filter, QueryExpression};
use crate::config::MIGRATION_MODEL;
use crate::context::DataContext;
use crate::error::{ModelError, ModelResult};
use crate::events::{EventPhase, UpgradeEvent};
use crate::schema::{Attribute, DataModel, StorageKind};
use crate::BoxFuture;

/// Models confirmed at a version, as (model, version)
pub type AppliedVersions = Vec<(String, String)>;

fn index_name(source: &str, field: &str) -> String {
    format!("INDEX_{}_{}", source, field).to_uppercase()
}

fn column(attribute: &Attribute, type_name: String) -> MigrationField {
    MigrationField {
        name: attribute.name.clone(),
        type_name,
        primary: attribute.primary,
        nullable: attribute.nullable && !attribute.primary,
        size: attribute.size,
        scale: attribute.scale,
    }
}

/// Brings storage objects in line with model versions
pub struct MigrationPlanner<'a> {
    context: &'a DataContext,
}

impl<'a> MigrationPlanner<'a> {
    pub fn new(context: &'a DataContext) -> Self {
        Self { context }
    }

    /// Migration record for the model's own storage columns
    pub fn build_record(&self, model: &DataModel) -> ModelResult<MigrationRecord> {
        model.primary_key()?;
        let config = self.context.config();
        let source = model.source_adapter();
        let definition = model.definition();

        let mut record = MigrationRecord::new(source.clone(), model.name(), model.version());
        record.description = Some(
            definition
                .title
                .clone()
                .unwrap_or_else(|| model.name().to_string()),
        );

        for attribute in model.own_attributes() {
            match model.storage_kind(&attribute)? {
                StorageKind::Column => {
                    record.add.push(column(&attribute, attribute.type_name.clone()));
                    if attribute.indexed && !attribute.primary {
                        record.indexes.push(MigrationIndex {
                            name: index_name(&source, &attribute.name),
                            columns: vec![attribute.name.clone()],
                            unique: false,
                        });
                    }
                }
                StorageKind::ForeignKey(mapping) => {
                    let parent_type = config
                        .model(mapping.parent_model())
                        .and_then(|parent| parent.attribute(mapping.parent_field()))
                        .map(|key| key.type_name.clone())
                        .unwrap_or_else(|| "Integer".to_string());
                    let type_name = if parent_type == "Counter" {
                        "Integer".to_string()
                    } else {
                        parent_type
                    };
                    record.add.push(column(&attribute, type_name));
                    record.indexes.push(MigrationIndex {
                        name: index_name(&source, &attribute.name),
                        columns: vec![attribute.name.clone()],
                        unique: false,
                    });
                }
                StorageKind::Collection(_) | StorageKind::Virtual => {}
            }
        }

        for constraint in definition.constraints.iter().filter(|c| c.is_unique()) {
            let own = constraint
                .fields
                .iter()
                .all(|f| record.field(f).is_some());
            if own && !constraint.fields.is_empty() {
                record.indexes.push(MigrationIndex {
                    name: format!("UNIQUE_{}_{}", source, constraint.fields.join("_")).to_uppercase(),
                    columns: constraint.fields.clone(),
                    unique: true,
                });
            }
        }

        Ok(record)
    }

    /// Migrate a model and its bases in one transaction. Versions are
    /// cached once the transaction commits.
    pub async fn migrate(&self, model: &DataModel) -> ModelResult<()> {
        if model.is_sealed() || self.is_current(model) {
            return Ok(());
        }
        let mut tx = self.context.adapter().begin_transaction().await?;
        let result = self.migrate_within(model, &mut *tx).await;
        let applied = finish_transaction(tx, result).await?;

        let config = self.context.config();
        for (name, version) in applied {
            config.set_applied_version(&name, &version);
        }
        Ok(())
    }

    fn is_current(&self, model: &DataModel) -> bool {
        self.context
            .config()
            .applied_version(model.name())
            .map(|v| v == model.version())
            .unwrap_or(false)
    }

    /// Migrate inside an open transaction. Returns the versions confirmed
    /// by this call; the caller caches them after committing.
    pub fn migrate_within<'b>(
        &'b self,
        model: &'b DataModel,
        tx: &'b mut dyn AdapterTransaction,
    ) -> BoxFuture<'b, ModelResult<AppliedVersions>> {
        Box::pin(async move {
            let mut applied = AppliedVersions::new();
            if model.is_sealed() {
                debug!("Model '{}' is sealed, migration skipped", model.name());
                return Ok(applied);
            }
            if self.is_current(model) {
                return Ok(applied);
            }

            if let Some(base) = model.base()? {
                applied.extend(self.migrate_within(&base, &mut *tx).await?);
            }
            applied.extend(self.ensure_history(&mut *tx).await?);

            let source = model.source_adapter();
            let version = model.version();
            let history = self.context.config().settings().migrations_table.clone();
            let found = tx
                .execute(
                    &QueryExpression::select(
                        history.clone(),
                        Filter::new()
                            .eq("appliesTo", source.clone().into())
                            .eq("version", version.clone().into()),
                    )
                    .limit(1),
                )
                .await?;
            if !found.rows.is_empty() {
                debug!("'{}' already at version {}", source, version);
                applied.push((model.name().to_string(), version));
                return Ok(applied);
            }

            let mut record = self.build_record(model)?;
            let pipeline = model.pipeline()?;
            {
                let mut event = UpgradeEvent {
                    model,
                    context: self.context,
                    migration: &record,
                    tx: &mut *tx,
                };
                pipeline.emit_upgrade(EventPhase::BeforeUpgrade, &mut event).await?;
            }

            tx.migrate(&mut record).await?;
            if !record.updated {
                tx.execute(&QueryExpression::insert(history, record.history_row()))
                    .await?;
            }

            {
                let mut event = UpgradeEvent {
                    model,
                    context: self.context,
                    migration: &record,
                    tx: &mut *tx,
                };
                pipeline.emit_upgrade(EventPhase::AfterUpgrade, &mut event).await?;
            }

            info!("Migrated '{}' ({}) to version {}", model.name(), source, version);
            applied.push((model.name().to_string(), version));
            Ok(applied)
        })
    }

    /// Create the migration history storage object when needed
    async fn ensure_history(&self, tx: &mut dyn AdapterTransaction) -> ModelResult<AppliedVersions> {
        let config = self.context.config();
        let history = config.model(MIGRATION_MODEL).ok_or_else(|| {
            ModelError::Migration("Migration history model is not registered".to_string())
        })?;
        if self.is_current(&history) {
            return Ok(AppliedVersions::new());
        }
        let mut record = self.build_record(&history)?;
        tx.migrate(&mut record).await?;
        Ok(vec![(history.name().to_string(), history.version())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;
    use crate::config::DataConfiguration;
    use std::sync::Arc;

    fn context(adapter: Arc<MemoryAdapter>) -> DataContext {
        let config = DataConfiguration::builder()
            .models_from_json(
                r#"[
                    { "name": "Thing", "fields": [
                        { "name": "id", "type": "Counter", "primary": true },
                        { "name": "name", "type": "Text", "size": 100, "indexed": true }
                    ] },
                    { "name": "Product", "inherits": "Thing", "version": "2.0", "fields": [
                        { "name": "price", "type": "Number" },
                        { "name": "category", "type": "Category" }
                    ] },
                    { "name": "Category", "fields": [
                        { "name": "id", "type": "Counter", "primary": true },
                        { "name": "code", "type": "Text" }
                    ], "constraints": [ { "type": "unique", "fields": ["code"] } ] },
                    { "name": "Note", "fields": [ { "name": "body", "type": "Text" } ] }
                ]"#,
            )
            .unwrap()
            .build()
            .unwrap();
        DataContext::new(config, adapter)
    }

    #[test]
    fn test_build_record_for_derived_model() {
        let context = context(Arc::new(MemoryAdapter::new()));
        let product = context.model("Product").unwrap();
        let record = MigrationPlanner::new(&context).build_record(&product).unwrap();

        assert_eq!(record.applies_to, "ProductBase");
        assert_eq!(record.version, "2.0");
        let names: Vec<&str> = record.add.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["price", "category", "id"]);
        assert_eq!(record.field("id").unwrap().type_name, "Integer");
        assert_eq!(record.field("category").unwrap().type_name, "Integer");
        assert_eq!(record.indexes[0].name, "INDEX_PRODUCTBASE_CATEGORY");
    }

    #[test]
    fn test_build_record_indexes() {
        let context = context(Arc::new(MemoryAdapter::new()));
        let planner = MigrationPlanner::new(&context);

        let thing = planner.build_record(&context.model("Thing").unwrap()).unwrap();
        assert_eq!(thing.field("id").unwrap().type_name, "Counter");
        assert_eq!(thing.indexes[0].name, "INDEX_THINGBASE_NAME");

        let category = planner.build_record(&context.model("Category").unwrap()).unwrap();
        assert!(category.indexes.iter().any(|i| i.unique && i.columns == vec!["code"]));
    }

    #[test]
    fn test_build_record_requires_key() {
        let context = context(Arc::new(MemoryAdapter::new()));
        let note = context.model("Note").unwrap();
        assert!(matches!(
            MigrationPlanner::new(&context).build_record(&note),
            Err(ModelError::MissingPrimaryKey(_))
        ));
    }

    #[tokio::test]
    async fn test_migrate_base_first_and_once() {
        let adapter = Arc::new(MemoryAdapter::new());
        let context = context(adapter.clone());
        let product = context.model("Product").unwrap();
        let planner = MigrationPlanner::new(&context);

        planner.migrate(&product).await.unwrap();
        assert!(adapter.has_table("ThingBase").await);
        assert!(adapter.has_table("ProductBase").await);

        let history = adapter.rows("migrations").await;
        let applied: Vec<&str> = history
            .iter()
            .filter_map(|r| r["appliesTo"].as_str())
            .collect();
        assert_eq!(applied, vec!["ThingBase", "ProductBase"]);

        let calls = adapter.stats().migrate_calls();
        planner.migrate(&product).await.unwrap();
        assert_eq!(adapter.stats().migrate_calls(), calls);
        assert_eq!(context.config().applied_version("Product").unwrap(), "2.0");
    }

    #[tokio::test]
    async fn test_history_skips_after_cache_reset() {
        let adapter = Arc::new(MemoryAdapter::new());
        let context = context(adapter.clone());
        let thing = context.model("Thing").unwrap();
        let planner = MigrationPlanner::new(&context);

        planner.migrate(&thing).await.unwrap();
        let ddl = adapter.stats().ddl_changes();
        context.config().reset_applied_versions();
        planner.migrate(&thing).await.unwrap();

        assert_eq!(adapter.stats().ddl_changes(), ddl);
        assert_eq!(adapter.rows("migrations").await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_migration_is_not_cached() {
        let adapter = Arc::new(MemoryAdapter::new());
        let context = context(adapter.clone());
        let note = context.model("Note").unwrap();

        let result = MigrationPlanner::new(&context).migrate(&note).await;
        assert!(matches!(result, Err(ModelError::MissingPrimaryKey(_))));
        assert!(context.config().applied_version("Note").is_none());
        assert!(!adapter.has_table("migrations").await);
        assert_eq!(adapter.stats().rollbacks(), 1);
    }

    #[tokio::test]
    async fn test_adapter_error_propagates_unchanged() {
        let adapter = Arc::new(MemoryAdapter::new());
        let context = context(adapter.clone());
        let category = context.model("Category").unwrap();
        let planner = MigrationPlanner::new(&context);
        planner.migrate(&category).await.unwrap();

        let config = DataConfiguration::builder()
            .models_from_json(
                r#"{ "name": "Category", "version": "2.0", "fields": [
                    { "name": "id", "type": "Counter", "primary": true },
                    { "name": "code", "type": "Integer" }
                ] }"#,
            )
            .unwrap()
            .build()
            .unwrap();
        let context = DataContext::new(config, adapter.clone());
        let category = context.model("Category").unwrap();

        let result = MigrationPlanner::new(&context).migrate(&category).await;
        let error = result.unwrap_err();
        assert!(matches!(error, ModelError::Database(_)));
        assert!(error.to_string().contains("cannot change type"));
        assert!(context.config().applied_version("Category").is_none());
        assert_eq!(adapter.rows("migrations").await.len(), 1);
    }

    #[tokio::test]
    async fn test_shared_storage_cached_per_model() {
        let adapter = Arc::new(MemoryAdapter::new());
        let config = DataConfiguration::builder()
            .models_from_json(
                r#"[
                    { "name": "Label", "source": "Labels", "fields": [
                        { "name": "id", "type": "Counter", "primary": true },
                        { "name": "text", "type": "Text" }
                    ] },
                    { "name": "ColoredLabel", "source": "Labels", "version": "2.0", "fields": [
                        { "name": "id", "type": "Counter", "primary": true },
                        { "name": "text", "type": "Text" },
                        { "name": "color", "type": "Text" }
                    ] }
                ]"#,
            )
            .unwrap()
            .build()
            .unwrap();
        let context = DataContext::new(config, adapter.clone());
        let label = context.model("Label").unwrap();
        let colored = context.model("ColoredLabel").unwrap();
        let planner = MigrationPlanner::new(&context);

        planner.migrate(&label).await.unwrap();
        planner.migrate(&colored).await.unwrap();
        assert_eq!(context.config().applied_version("Label").unwrap(), "1.0");
        assert_eq!(context.config().applied_version("ColoredLabel").unwrap(), "2.0");
        assert_eq!(adapter.columns("Labels").await, vec!["id", "text", "color"]);

        let executed = adapter.stats().executed();
        let calls = adapter.stats().migrate_calls();
        planner.migrate(&label).await.unwrap();
        planner.migrate(&colored).await.unwrap();
        assert_eq!(adapter.stats().executed(), executed);
        assert_eq!(adapter.stats().migrate_calls(), calls);
    }
}
