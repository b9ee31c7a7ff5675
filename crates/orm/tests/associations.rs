mod common;

use serde_json::json;
use themis_orm::{AssociationKind, CascadeMode, DataObject, ModelError, StorageKind};

const MODELS: &str = r#"[
    { "name": "Group", "fields": [
        { "name": "id", "type": "Counter", "primary": true },
        { "name": "name", "type": "Text", "size": 64 }
    ] },
    { "name": "User", "fields": [
        { "name": "id", "type": "Counter", "primary": true },
        { "name": "name", "type": "Text", "nullable": false },
        { "name": "groups", "type": "Group" }
    ] },
    { "name": "Customer", "fields": [
        { "name": "id", "type": "Counter", "primary": true },
        { "name": "name", "type": "Text" },
        { "name": "orders", "type": "Order", "mapping": {
            "associationType": "association",
            "parentModel": "Customer", "parentField": "id",
            "childModel": "Order", "childField": "customer",
            "cascade": "delete"
        } }
    ] },
    { "name": "Order", "fields": [
        { "name": "id", "type": "Counter", "primary": true },
        { "name": "customer", "type": "Customer" },
        { "name": "total", "type": "Number" }
    ] },
    { "name": "Article", "fields": [
        { "name": "id", "type": "Counter", "primary": true },
        { "name": "title", "type": "Text" },
        { "name": "tags", "type": "Text", "many": true }
    ] }
]"#;

#[test]
fn test_inferred_junction() {
    let config = common::config(MODELS);
    let user = config.model("User").unwrap();

    let mapping = user.infer_mapping("groups").unwrap().unwrap();
    assert_eq!(mapping.association_type, AssociationKind::Junction);
    assert_eq!(mapping.association_adapter.as_deref(), Some("UserGroups"));
    assert_eq!(mapping.cascade, CascadeMode::Delete);
    assert_eq!(mapping.parent_model(), "User");
    assert_eq!(mapping.child_model(), "Group");

    let junction = config.model("UserGroups").unwrap();
    assert!(junction.is_hidden());
    assert_eq!(junction.source_adapter(), "UserGroups");
}

#[tokio::test]
async fn test_junction_attach_and_cascade() {
    let (context, adapter) = common::context(MODELS);
    let user = context.model("User").unwrap();

    let saved = user
        .save_one(
            &context,
            json!({ "name": "alice", "groups": [ { "name": "Admins" }, { "name": "Editors" } ] }),
        )
        .await
        .unwrap();
    let user_id = saved.get("id").cloned().unwrap();

    let groups = adapter.rows("GroupBase").await;
    assert_eq!(groups.len(), 2);
    let links = adapter.rows("UserGroups").await;
    assert_eq!(links.len(), 2);
    assert!(links.iter().all(|l| l["parentId"] == user_id));

    // Linking an existing pair again is skipped, `$state: 4` detaches
    let admins = groups[0]["id"].clone();
    let editors = groups[1]["id"].clone();
    user.save_one(
        &context,
        json!({ "id": user_id, "groups": [ admins, { "id": editors, "$state": 4 } ] }),
    )
    .await
    .unwrap();
    let links = adapter.rows("UserGroups").await;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0]["valueId"], admins);

    user.remove(&context, vec![DataObject::from_value("User", json!({ "id": user_id })).unwrap()])
        .await
        .unwrap();
    assert!(adapter.rows("UserGroups").await.is_empty());
    assert_eq!(adapter.rows("GroupBase").await.len(), 2);
}

#[tokio::test]
async fn test_tag_junction() {
    let (context, adapter) = common::context(MODELS);
    let article = context.model("Article").unwrap();

    let tags = article.attribute("tags").unwrap();
    match article.storage_kind(&tags).unwrap() {
        StorageKind::Collection(mapping) => assert!(mapping.is_tag()),
        other => panic!("Expected a collection, got {:?}", other),
    }

    article
        .save_one(&context, json!({ "title": "Schemas", "tags": ["rust", "orm", "rust"] }))
        .await
        .unwrap();
    let rows = adapter.rows("ArticleTags").await;
    let mut values: Vec<&str> = rows.iter().filter_map(|r| r["value"].as_str()).collect();
    values.sort();
    assert_eq!(values, vec!["orm", "rust"]);
}

#[tokio::test]
async fn test_children_saved_with_owner_key() {
    let (context, adapter) = common::context(MODELS);
    let customer = context.model("Customer").unwrap();

    let saved = customer
        .save_one(
            &context,
            json!({ "name": "ACME", "orders": [ { "total": 10 }, { "total": 20 } ] }),
        )
        .await
        .unwrap();
    let customer_id = saved.get("id").cloned().unwrap();

    let orders = adapter.rows("OrderBase").await;
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o["customer"] == customer_id));

    customer
        .remove(&context, vec![DataObject::from_value("Customer", json!({ "id": customer_id })).unwrap()])
        .await
        .unwrap();
    assert!(adapter.rows("OrderBase").await.is_empty());
}

#[test]
fn test_foreign_key_side() {
    let config = common::config(MODELS);
    let order = config.model("Order").unwrap();
    let customer = order.attribute("customer").unwrap();

    match order.storage_kind(&customer).unwrap() {
        StorageKind::ForeignKey(mapping) => {
            assert_eq!(mapping.parent_model(), "Customer");
            assert_eq!(mapping.child_field(), "customer");
        }
        other => panic!("Expected a foreign key, got {:?}", other),
    }
}

#[test]
fn test_inherited_mapping_is_repointed() {
    let config = common::config(
        r#"[
            { "name": "Party", "fields": [
                { "name": "id", "type": "Counter", "primary": true },
                { "name": "account", "type": "Account", "mapping": {
                    "parentModel": "Account", "parentField": "id",
                    "childModel": "Party", "childField": "account"
                } }
            ] },
            { "name": "Person", "inherits": "Party", "fields": [
                { "name": "givenName", "type": "Text" }
            ] },
            { "name": "Account", "fields": [
                { "name": "id", "type": "Counter", "primary": true }
            ] },
            { "name": "Robot", "inherits": "Account", "fields": [
                { "name": "serial", "type": "Text" },
                { "name": "owner", "type": "Account", "mapping": {
                    "parentModel": "Party", "parentField": "id",
                    "childModel": "Person", "childField": "owner"
                } }
            ] },
            { "name": "Droid", "inherits": "Robot", "fields": [] }
        ]"#,
    );

    let person = config.model("Person").unwrap();
    let mapping = person.infer_mapping("account").unwrap().unwrap();
    assert_eq!(mapping.child_model(), "Person");

    let droid = config.model("Droid").unwrap();
    let err = droid.infer_mapping("owner").unwrap_err();
    assert!(matches!(err, ModelError::Mapping(_)));
}
