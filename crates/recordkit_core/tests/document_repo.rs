use chrono::{FixedOffset, TimeZone};
use recordkit_core::{
    open_db_in_memory, AuditEntry, CollectionSchema, DocumentRepository, DocumentStore, Fields,
    Filter, NewDocument, RepoError, SqliteDocumentStore,
};
use rusqlite::Connection;
use serde_json::json;

fn entry(description: &str) -> AuditEntry {
    AuditEntry {
        actor_id: "u-1".to_string(),
        actor_name: "Ayu".to_string(),
        timestamp: FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 9, 30, 0)
            .unwrap(),
        description: description.to_string(),
    }
}

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap()
}

fn repo(conn: &Connection) -> DocumentRepository<SqliteDocumentStore<'_>> {
    let schema =
        CollectionSchema::new("categories", "name").with_sub_collection("products", "name");
    DocumentRepository::new(SqliteDocumentStore::try_new(conn, schema).unwrap())
}

#[test]
fn second_insert_with_same_natural_key_is_duplicate() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo(&conn);

    repo.insert(NewDocument::new(fields(json!({"name": "A"}))), entry("POST category add"))
        .unwrap();
    let err = repo
        .insert(NewDocument::new(fields(json!({"name": "A"}))), entry("POST category add"))
        .unwrap_err();

    assert!(matches!(err, RepoError::DuplicateKey(ref field) if field == "name"));
    assert_eq!(err.status_code(), 400);
    assert_eq!(repo.count(&Filter::new()).unwrap(), 1);
}

#[test]
fn sub_document_scoped_key_must_be_unique_among_siblings() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo(&conn);
    let parent = repo
        .insert(NewDocument::new(fields(json!({"name": "Drinks"}))), entry("add"))
        .unwrap();
    let other = repo
        .insert(NewDocument::new(fields(json!({"name": "Snacks"}))), entry("add"))
        .unwrap();

    repo.insert_sub(parent.id, "products", fields(json!({"name": "Tea"})), entry("add"))
        .unwrap();
    let err = repo
        .insert_sub(parent.id, "products", fields(json!({"name": "Tea"})), entry("add"))
        .unwrap_err();
    assert!(matches!(err, RepoError::DuplicateKey(_)));

    let updated = repo
        .insert_sub(parent.id, "products", fields(json!({"name": "Milk"})), entry("add"))
        .unwrap();
    assert_eq!(updated.sub_documents("products").len(), 2);

    // Scope is per parent.
    let other = repo
        .insert_sub(other.id, "products", fields(json!({"name": "Tea"})), entry("add"))
        .unwrap();
    assert_eq!(other.sub_documents("products").len(), 1);
}

#[test]
fn insert_sub_on_missing_parent_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo(&conn);
    let missing = uuid::Uuid::new_v4();

    let err = repo
        .insert_sub(missing, "products", fields(json!({"name": "Tea"})), entry("add"))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound { ref kind, id } if kind == "categories" && id == missing
    ));
}

#[test]
fn soft_deleted_document_disappears_from_reads_but_stays_in_store() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo(&conn);
    let doc = repo
        .insert(NewDocument::new(fields(json!({"name": "A"}))), entry("add"))
        .unwrap();
    repo.insert(NewDocument::new(fields(json!({"name": "B"}))), entry("add"))
        .unwrap();

    repo.soft_delete(doc.id, entry("DELETE category remove")).unwrap();

    assert!(matches!(
        repo.find_by_id(doc.id),
        Err(RepoError::NotFound { .. })
    ));
    assert_eq!(repo.find_all().unwrap().len(), 1);
    assert_eq!(repo.find_by_filter(&Filter::new(), None, None).unwrap().len(), 1);
    assert_eq!(repo.count(&Filter::new()).unwrap(), 1);

    let raw = repo.store().find_one(&Filter::by_id(doc.id)).unwrap().unwrap();
    assert!(raw.is_deleted);
    assert_eq!(raw.deleted_by.unwrap().description, "DELETE category remove");

    // A tombstone keeps its natural key reserved.
    let err = repo
        .insert(NewDocument::new(fields(json!({"name": "A"}))), entry("add"))
        .unwrap_err();
    assert!(matches!(err, RepoError::DuplicateKey(_)));
}

#[test]
fn toggling_twice_restores_flag_and_records_two_entries() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo(&conn);
    let doc = repo
        .insert(NewDocument::new(fields(json!({"name": "A"}))), entry("add"))
        .unwrap();

    repo.toggle_active(doc.id, entry("toggle")).unwrap();
    assert!(!repo.find_by_id(doc.id).unwrap().is_active);
    repo.toggle_active(doc.id, entry("toggle")).unwrap();

    let reloaded = repo.find_by_id(doc.id).unwrap();
    assert!(reloaded.is_active);
    assert_eq!(reloaded.updated_by.len(), 2);
}

#[test]
fn active_filter_is_combined_with_default_scope() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo(&conn);
    let a = repo
        .insert(NewDocument::new(fields(json!({"name": "A"}))), entry("add"))
        .unwrap();
    let b = repo
        .insert(NewDocument::new(fields(json!({"name": "B"}))), entry("add"))
        .unwrap();
    repo.toggle_active(a.id, entry("toggle")).unwrap();
    repo.toggle_active(b.id, entry("toggle")).unwrap();
    repo.soft_delete(b.id, entry("remove")).unwrap();

    let inactive = repo
        .find_by_filter(&Filter::new().active(false), None, None)
        .unwrap();
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].id, a.id);
}

#[test]
fn sub_document_toggle_and_soft_delete_keep_history() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo(&conn);
    let doc = repo
        .insert(
            NewDocument::new(fields(json!({"name": "Drinks"})))
                .with_sub_documents("products", vec![fields(json!({"name": "Tea"}))]),
            entry("add"),
        )
        .unwrap();
    let tea = doc.sub_documents("products")[0].id;

    let doc = repo
        .toggle_active_sub(doc.id, tea, "products", entry("toggle"))
        .unwrap();
    let product = doc.find_sub_document("products", tea).unwrap();
    assert!(!product.is_active);
    assert_eq!(product.updated_by.len(), 1);

    let doc = repo
        .soft_delete_sub(doc.id, tea, "products", entry("remove"))
        .unwrap();
    let product = doc.find_sub_document("products", tea).unwrap();
    assert!(product.is_deleted);
    assert_eq!(product.deleted_by.as_ref().unwrap().description, "remove");

    let reloaded = repo.find_by_id(doc.id).unwrap();
    assert!(reloaded.find_sub_document("products", tea).unwrap().is_deleted);
}

#[test]
fn insert_update_toggle_delete_lifecycle() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo(&conn);

    let doc = repo
        .insert(NewDocument::new(fields(json!({"name": "A"}))), entry("add"))
        .unwrap();
    assert!(doc.created_by.is_some());
    assert!(doc.is_active);
    assert!(!doc.is_deleted);

    let doc = repo
        .update(doc.id, &fields(json!({"name": "B"})), entry("update"))
        .unwrap();
    assert_eq!(doc.field("name"), Some(&json!("B")));
    assert_eq!(doc.updated_by.len(), 1);

    repo.toggle_active(doc.id, entry("toggle")).unwrap();
    let doc = repo.find_by_id(doc.id).unwrap();
    assert!(!doc.is_active);
    assert_eq!(doc.updated_by.len(), 2);

    repo.soft_delete(doc.id, entry("remove")).unwrap();
    let raw = repo.store().find_one(&Filter::by_id(doc.id)).unwrap().unwrap();
    assert!(raw.is_deleted);
    assert!(matches!(
        repo.find_by_id(doc.id),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn renaming_onto_existing_natural_key_is_duplicate() {
    let conn = open_db_in_memory().unwrap();
    let repo = repo(&conn);
    repo.insert(NewDocument::new(fields(json!({"name": "A"}))), entry("add"))
        .unwrap();
    let b = repo
        .insert(NewDocument::new(fields(json!({"name": "B"}))), entry("add"))
        .unwrap();

    let err = repo
        .update(b.id, &fields(json!({"name": "A"})), entry("update"))
        .unwrap_err();
    assert!(matches!(err, RepoError::DuplicateKey(_)));
    assert_eq!(
        repo.find_by_id(b.id).unwrap().field("name"),
        Some(&json!("B"))
    );
}
