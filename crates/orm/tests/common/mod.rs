//! Shared fixtures for integration tests

use std::sync::Arc;
use themis_orm::{DataConfiguration, DataContext, MemoryAdapter};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Configuration built from a JSON array of model documents
pub fn config(models: &str) -> Arc<DataConfiguration> {
    DataConfiguration::builder()
        .models_from_json(models)
        .expect("model documents should parse")
        .build()
        .expect("configuration should build")
}

pub fn context(models: &str) -> (DataContext, Arc<MemoryAdapter>) {
    init_tracing();
    let adapter = Arc::new(MemoryAdapter::new());
    let context = DataContext::new(config(models), adapter.clone());
    (context, adapter)
}
