mod common;

use serde_json::json;
use themis_orm::{CachingMode, DataObject, ExecuteOptions, ModelError, ObjectState, UserIdentity};

const CATALOG: &str = r#"[
    { "name": "Thing", "fields": [
        { "name": "id", "type": "Counter", "primary": true },
        { "name": "name", "type": "Text", "size": 50, "nullable": false }
    ] },
    { "name": "Product", "inherits": "Thing", "fields": [
        { "name": "price", "type": "Number", "validation": { "minValue": 0, "maxValue": 1000 } },
        { "name": "category", "type": "Category" }
    ], "caching": "always" },
    { "name": "Category", "fields": [
        { "name": "id", "type": "Counter", "primary": true },
        { "name": "code", "type": "Text", "size": 10, "nullable": false },
        { "name": "title", "type": "Text" }
    ], "constraints": [ { "type": "unique", "fields": ["code"] } ] },
    { "name": "Invoice", "fields": [
        { "name": "id", "type": "Counter", "primary": true },
        { "name": "total", "type": "Number" }
    ], "privileges": [
        { "mask": 1, "type": "global", "account": "*" },
        { "mask": 7, "type": "global", "account": "Accounting" }
    ] }
]"#;

#[tokio::test]
async fn test_out_of_range_price_is_rejected() {
    let (context, adapter) = common::context(CATALOG);
    let product = context.model("Product").unwrap();

    let err = product
        .save_one(&context, json!({ "name": "Lamp", "price": -5 }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ERANGE");
    let field = err.as_field_error().unwrap();
    assert_eq!(field.field, "price");
    assert_eq!(field.model, "Product");
    assert!(adapter.rows("ThingBase").await.is_empty());

    let saved = product
        .save_one(&context, json!({ "name": "Lamp", "price": 10 }))
        .await
        .unwrap();
    assert!(saved.key_value("id").is_some());
    assert_eq!(adapter.rows("ProductBase").await.len(), 1);
}

#[tokio::test]
async fn test_required_checked_on_insert_only() {
    let (context, adapter) = common::context(CATALOG);
    let thing = context.model("Thing").unwrap();

    let err = thing.save_one(&context, json!({})).await.unwrap_err();
    assert_eq!(err.code(), "EREQUIRED");
    assert_eq!(err.as_field_error().unwrap().field, "name");

    let saved = thing.save_one(&context, json!({ "name": "Crate" })).await.unwrap();
    let id = saved.get("id").cloned().unwrap();

    // An update that leaves `name` out is accepted
    let updated = thing
        .update(&context, vec![DataObject::from_value("Thing", json!({ "id": id })).unwrap()])
        .await
        .unwrap();
    assert_eq!(updated[0].state, Some(ObjectState::Update));
    assert_eq!(adapter.rows("ThingBase").await[0]["name"], "Crate");
}

#[tokio::test]
async fn test_foreign_key_object_is_reduced_to_key() {
    let (context, adapter) = common::context(CATALOG);
    let category = context.model("Category").unwrap();
    let product = context.model("Product").unwrap();

    let lighting = category
        .save_one(&context, json!({ "code": "LGT", "title": "Lighting" }))
        .await
        .unwrap();
    let category_id = lighting.get("id").cloned().unwrap();

    product
        .save_one(
            &context,
            json!({ "name": "Lamp", "price": 12, "category": { "id": category_id, "code": "LGT" } }),
        )
        .await
        .unwrap();
    assert_eq!(adapter.rows("ProductBase").await[0]["category"], category_id);
}

#[tokio::test]
async fn test_unique_constraint_settles_state() {
    let (context, adapter) = common::context(CATALOG);
    let category = context.model("Category").unwrap();

    let first = category
        .save_one(&context, json!({ "code": "OUT", "title": "Outdoor" }))
        .await
        .unwrap();

    // Inferred insert matching the constraint becomes an update
    let second = category
        .save_one(&context, json!({ "code": "OUT", "title": "Garden" }))
        .await
        .unwrap();
    assert_eq!(second.state, Some(ObjectState::Update));
    assert_eq!(second.get("id"), first.get("id"));

    let rows = adapter.rows("CategoryBase").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["title"], "Garden");

    // Explicit insert is a duplicate
    let err = category
        .insert(
            &context,
            vec![DataObject::from_value("Category", json!({ "code": "OUT" })).unwrap()],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Constraint { .. }));
    assert_eq!(err.code(), "EUNQ");
}

#[tokio::test]
async fn test_explicit_update_of_missing_object() {
    let (context, _adapter) = common::context(CATALOG);
    let thing = context.model("Thing").unwrap();

    let err = thing
        .save_one(&context, json!({ "id": 42, "name": "Ghost", "$state": 2 }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ENOTFOUND");

    // Inferred update of an unknown key falls back to insert
    let saved = thing
        .save_one(&context, json!({ "id": 42, "name": "Ghost" }))
        .await
        .unwrap();
    assert_eq!(saved.state, Some(ObjectState::Insert));
}

#[tokio::test]
async fn test_cached_reads() {
    let (context, _adapter) = common::context(CATALOG);
    let product = context.model("Product").unwrap();
    assert_eq!(product.caching(), CachingMode::Always);

    let saved = product
        .save_one(&context, json!({ "name": "Desk", "price": 99 }))
        .await
        .unwrap();
    let id = saved.get("id").cloned().unwrap();

    let first = product.get(&context, id.clone(), ExecuteOptions::default()).await.unwrap();
    let (hits, _) = context.config().cache().stats();
    let second = product.get(&context, id.clone(), ExecuteOptions::default()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(context.config().cache().stats().0, hits + 1);

    // Saving evicts the cached object
    product
        .save_one(&context, json!({ "id": id, "price": 89 }))
        .await
        .unwrap();
    let reloaded = product
        .get(&context, id, ExecuteOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.get("price"), Some(&json!(89)));
    assert_eq!(reloaded.get("name"), Some(&json!("Desk")));
}

#[tokio::test]
async fn test_privileges() {
    let (context, adapter) = common::context(CATALOG);
    let invoice = context.model("Invoice").unwrap();

    let guest = context.clone().with_user(UserIdentity::new("eve"));
    let err = invoice
        .save_one(&guest, json!({ "total": 100 }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "EACCESS");
    assert!(adapter.rows("InvoiceBase").await.is_empty());

    let clerk = context
        .clone()
        .with_user(UserIdentity::new("bob").group("Accounting"));
    let saved = invoice.save_one(&clerk, json!({ "total": 100 })).await.unwrap();

    // Reading is granted to everyone, removing to nobody
    let id = saved.get("id").cloned().unwrap();
    assert!(invoice
        .get(&guest, id.clone(), ExecuteOptions::default())
        .await
        .unwrap()
        .is_some());
    let err = invoice
        .remove(&clerk, vec![DataObject::from_value("Invoice", json!({ "id": id })).unwrap()])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "EACCESS");

    let system = context.clone().unattended(true);
    invoice
        .remove(&system, vec![DataObject::from_value("Invoice", json!({ "id": id })).unwrap()])
        .await
        .unwrap();
    assert!(adapter.rows("InvoiceBase").await.is_empty());
}
