use std::sync::Arc;

use viewdex::common::Key;
use viewdex::doc;
use viewdex::docstore::MemoryDocumentStore;
use viewdex::errors::ErrorKind;
use viewdex::key;
use viewdex::mapreduce::{MapEmission, ViewDefinition};
use viewdex::query::{QueryOptions, RowFilter, StalePolicy};
use viewdex::view::{UpdateOutcome, ViewDiagnostics};
use viewdex::viewdex::Viewdex;

// Setup only one time throughout the project.
// It will take effect during test, project wide
#[ctor::ctor]
fn init() {
    colog::init();
}

fn open_db(store: Arc<MemoryDocumentStore>) -> Viewdex {
    let builder = Viewdex::builder();
    builder.native_compiler().register_map("by_pair", |_, body| {
        Ok(match (body.get("letter"), body.get("n")) {
            (Some(letter), Some(n)) => vec![MapEmission::new(
                Key::Array(vec![letter.clone(), n.clone()]),
                n.clone(),
            )],
            _ => vec![],
        })
    });
    builder.native_compiler().register_map("by_text", |_, body| {
        Ok(match body.get("text").and_then(Key::as_string) {
            Some(text) => {
                vec![MapEmission::new(text.to_string(), 1).with_full_text(text)]
            }
            None => vec![],
        })
    });
    builder.native_compiler().register_map("faulty", |doc_id, body| {
        if body.contains("bad") {
            return Err(viewdex::errors::ViewdexError::new(
                &format!("refusing document '{}'", doc_id),
                ErrorKind::InternalError,
            ));
        }
        Ok(vec![MapEmission::new(doc_id, 1)])
    });
    builder.open(store)
}

fn seed_pairs(store: &MemoryDocumentStore) {
    store.put("doc-a", doc! { "letter": "a", "n": 1 });
    store.put("doc-b", doc! { "letter": "b", "n": 2 });
    store.put("doc-c", doc! { "letter": "c", "n": 3 });
}

fn pair_view(db: &Viewdex, name: &str) -> viewdex::view::View {
    db.compile_view(name, &ViewDefinition::new("native", "by_pair", "1"))
        .unwrap()
}

fn keys_of(rows: &[viewdex::query::QueryRow]) -> Vec<Key> {
    rows.iter().map(|row| row.key.clone()).collect()
}

#[test]
fn test_scenario_ascending_from_start_key() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_pairs(&store);
    let db = open_db(store);
    let view = pair_view(&db, "design/by_pair");

    let rows = view
        .query(QueryOptions::new().start_key(key!(["b", 2])))
        .unwrap()
        .collect_rows()
        .unwrap();
    assert_eq!(keys_of(&rows), vec![key!(["b", 2]), key!(["c", 3])]);
    assert_eq!(rows[0].doc_id.as_deref(), Some("doc-b"));
    assert_eq!(rows[0].value, Some(key!(2)));
}

#[test]
fn test_scenario_descending_unbounded() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_pairs(&store);
    let db = open_db(store);
    let view = pair_view(&db, "design/by_pair");

    let rows = view
        .query(QueryOptions::new().descending(true))
        .unwrap()
        .collect_rows()
        .unwrap();
    assert_eq!(
        keys_of(&rows),
        vec![key!(["c", 3]), key!(["b", 2]), key!(["a", 1])]
    );
}

#[test]
fn test_scenario_skip_and_limit() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_pairs(&store);
    let db = open_db(store);
    let view = pair_view(&db, "design/by_pair");

    let rows = view
        .query(QueryOptions::new().skip(1).limit(1))
        .unwrap()
        .collect_rows()
        .unwrap();
    assert_eq!(keys_of(&rows), vec![key!(["b", 2])]);
}

#[test]
fn test_scenario_deletion_removes_rows() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_pairs(&store);
    let db = open_db(store.clone());
    let view = pair_view(&db, "design/by_pair");
    assert_eq!(view.update_index().unwrap(), UpdateOutcome::Updated);
    assert_eq!(view.total_rows(), 3);

    let deletion_seq = store.delete("doc-b");
    assert_eq!(view.update_index().unwrap(), UpdateOutcome::Updated);
    assert_eq!(view.checkpoint(), deletion_seq);
    assert_eq!(view.total_rows(), 2);

    let rows = view
        .query(QueryOptions::new().stale(StalePolicy::AllowStale))
        .unwrap()
        .collect_rows()
        .unwrap();
    assert_eq!(keys_of(&rows), vec![key!(["a", 1]), key!(["c", 3])]);
}

#[test]
fn test_scenario_reduce_to_single_row() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_pairs(&store);
    let db = open_db(store);
    let view = db
        .compile_view(
            "design/sum",
            &ViewDefinition::new("native", "by_pair", "1").with_reduce("_sum"),
        )
        .unwrap();

    let rows = view
        .query(QueryOptions::new().reduce(true).group_level(0))
        .unwrap()
        .collect_rows()
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, key!(null));
    assert_eq!(rows[0].value, Some(key!(6)));
}

#[test]
fn test_grouped_reduce_by_key_prefix() {
    let store = Arc::new(MemoryDocumentStore::new());
    store.put("d1", doc! { "letter": "a", "n": 1 });
    store.put("d2", doc! { "letter": "a", "n": 2 });
    store.put("d3", doc! { "letter": "b", "n": 4 });
    let db = open_db(store);
    let view = db
        .compile_view(
            "design/sum",
            &ViewDefinition::new("native", "by_pair", "1").with_reduce("_sum"),
        )
        .unwrap();

    let rows = view
        .query(QueryOptions::new().group_level(1))
        .unwrap()
        .collect_rows()
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].key, key!(["a"]));
    assert_eq!(rows[0].value, Some(key!(3)));
    assert_eq!(rows[1].key, key!(["b"]));
    assert_eq!(rows[1].value, Some(key!(4)));
}

#[test]
fn test_update_is_idempotent() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_pairs(&store);
    let db = open_db(store);
    let view = pair_view(&db, "design/by_pair");

    assert_eq!(view.update_index().unwrap(), UpdateOutcome::Updated);
    let dump = view.dump().unwrap();
    let checkpoint = view.checkpoint();

    assert_eq!(view.update_index().unwrap(), UpdateOutcome::AlreadyCurrent);
    assert_eq!(view.dump().unwrap(), dump);
    assert_eq!(view.checkpoint(), checkpoint);
}

#[test]
fn test_checkpoint_tracks_latest_sequence() {
    let store = Arc::new(MemoryDocumentStore::new());
    let db = open_db(store.clone());
    let view = pair_view(&db, "design/by_pair");
    assert_eq!(view.checkpoint(), 0);

    store.put("doc-a", doc! { "letter": "a", "n": 1 });
    view.update_index().unwrap();
    assert_eq!(view.checkpoint(), 1);

    store.put("doc-b", doc! { "letter": "b", "n": 2 });
    store.put("doc-c", doc! { "letter": "c", "n": 3 });
    view.update_index().unwrap();
    assert_eq!(view.checkpoint(), 3);
}

#[test]
fn test_group_update_carries_compiled_siblings() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_pairs(&store);
    let db = open_db(store.clone());
    let view = pair_view(&db, "design/by_pair");
    let sibling = pair_view(&db, "design/sibling");

    // Updating one view drags the compiled, stale sibling along.
    view.update_index().unwrap();
    assert_eq!(view.checkpoint(), 3);
    assert_eq!(sibling.checkpoint(), 3);

    // The piggybacked rows match an independent, standalone update.
    let standalone_db = open_db(Arc::new({
        let standalone = MemoryDocumentStore::new();
        standalone.put("doc-a", doc! { "letter": "a", "n": 1 });
        standalone.put("doc-b", doc! { "letter": "b", "n": 2 });
        standalone.put("doc-c", doc! { "letter": "c", "n": 3 });
        standalone
    }));
    let standalone = pair_view(&standalone_db, "design/sibling");
    standalone.update_index_alone().unwrap();
    assert_eq!(sibling.dump().unwrap(), standalone.dump().unwrap());
}

#[test]
fn test_update_alone_leaves_siblings_stale() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_pairs(&store);
    let db = open_db(store);
    let view = pair_view(&db, "design/by_pair");
    let sibling = pair_view(&db, "design/sibling");

    view.update_index_alone().unwrap();
    assert_eq!(view.checkpoint(), 3);
    assert_eq!(sibling.checkpoint(), 0);
}

#[test]
fn test_query_before_compile_fails() {
    let store = Arc::new(MemoryDocumentStore::new());
    let db = open_db(store);
    let view = db.view("design/raw").unwrap();
    let err = view.query(QueryOptions::new()).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ViewNotReady);
    let err = view.update_index().unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ViewNotReady);
}

#[test]
fn test_failed_update_leaves_index_unchanged() {
    let store = Arc::new(MemoryDocumentStore::new());
    store.put("good", doc! { "letter": "a" });
    let db = open_db(store.clone());
    let view = db
        .compile_view("design/faulty", &ViewDefinition::new("native", "faulty", "1"))
        .unwrap();
    view.update_index().unwrap();
    assert_eq!(view.checkpoint(), 1);

    store.put("poison", doc! { "bad": true });
    let err = view.update_index().unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::IndexError);
    // aborted: no checkpoint advance, rows untouched, safe to retry
    assert_eq!(view.checkpoint(), 1);
    assert_eq!(view.total_rows(), 1);
    assert_eq!(view.update_index().unwrap_err().kind(), &ErrorKind::IndexError);
}

#[test]
fn test_version_change_invalidates_index() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_pairs(&store);
    let db = open_db(store);
    let view = pair_view(&db, "design/by_pair");
    view.update_index().unwrap();
    assert_eq!(view.total_rows(), 3);

    view.compile(&ViewDefinition::new("native", "by_pair", "2"))
        .unwrap();
    assert_eq!(view.checkpoint(), 0);
    assert_eq!(view.total_rows(), 0);

    view.update_index().unwrap();
    assert_eq!(view.checkpoint(), 3);
    assert_eq!(view.total_rows(), 3);
}

#[test]
fn test_stale_policies() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_pairs(&store);
    let db = open_db(store);
    let view = pair_view(&db, "design/by_pair");

    // AllowStale answers from the untouched index.
    let rows = view
        .query(QueryOptions::new().stale(StalePolicy::AllowStale))
        .unwrap()
        .collect_rows()
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(view.checkpoint(), 0);

    // UpdateAfter answers from the pre-update snapshot, then refreshes.
    let rows = view
        .query(QueryOptions::new().stale(StalePolicy::UpdateAfter))
        .unwrap()
        .collect_rows()
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(view.checkpoint(), 3);

    // The default updates first.
    let rows = view
        .query(QueryOptions::new())
        .unwrap()
        .collect_rows()
        .unwrap();
    assert_eq!(rows.len(), 3);
}

#[test]
fn test_keys_mode_returns_rows_in_given_order() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_pairs(&store);
    let db = open_db(store);
    let view = pair_view(&db, "design/by_pair");

    let rows = view
        .query(QueryOptions::new().keys(vec![
            key!(["c", 3]),
            key!(["nope", 0]),
            key!(["a", 1]),
        ]))
        .unwrap()
        .collect_rows()
        .unwrap();
    assert_eq!(keys_of(&rows), vec![key!(["c", 3]), key!(["a", 1])]);
}

#[test]
fn test_exclusive_bounds() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_pairs(&store);
    let db = open_db(store);
    let view = pair_view(&db, "design/by_pair");

    let rows = view
        .query(
            QueryOptions::new()
                .start_key(key!(["a", 1]))
                .end_key(key!(["c", 3]))
                .inclusive_start(false)
                .inclusive_end(false),
        )
        .unwrap()
        .collect_rows()
        .unwrap();
    assert_eq!(keys_of(&rows), vec![key!(["b", 2])]);
}

#[test]
fn test_row_filter_against_documents() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_pairs(&store);
    let db = open_db(store);
    let view = pair_view(&db, "design/by_pair");

    let rows = view
        .query(QueryOptions::new().filter(
            RowFilter::field_eq("letter", "b").or(RowFilter::field_eq("letter", "c")),
        ))
        .unwrap()
        .collect_rows()
        .unwrap();
    assert_eq!(keys_of(&rows), vec![key!(["b", 2]), key!(["c", 3])]);
}

#[test]
fn test_full_text_query_and_retrieval() {
    let store = Arc::new(MemoryDocumentStore::new());
    store.put("recipe", doc! { "text": "Apple pie with cinnamon" });
    store.put("note", doc! { "text": "pear tart" });
    let db = open_db(store.clone());
    let view = db
        .compile_view("design/texts", &ViewDefinition::new("native", "by_text", "1"))
        .unwrap();

    let rows = view
        .query(QueryOptions::new().full_text("apple"))
        .unwrap()
        .collect_rows()
        .unwrap();
    assert_eq!(rows.len(), 1);
    let reference = rows[0].full_text.clone().unwrap();
    assert_eq!(reference.doc_id, "recipe");

    let text = view
        .full_text(&reference.doc_id, reference.sequence, reference.field_id)
        .unwrap();
    assert_eq!(text, b"Apple pie with cinnamon".to_vec());

    // A re-indexed document invalidates old references.
    store.put("recipe", doc! { "text": "Apple crumble" });
    view.update_index().unwrap();
    let err = view
        .full_text(&reference.doc_id, reference.sequence, reference.field_id)
        .unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::NotFound);
}

#[test]
fn test_delete_index_keeps_view_usable() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_pairs(&store);
    let db = open_db(store);
    let view = pair_view(&db, "design/by_pair");
    view.update_index().unwrap();
    assert_eq!(view.total_rows(), 3);

    view.delete_index().unwrap();
    assert_eq!(view.total_rows(), 0);
    assert_eq!(view.checkpoint(), 0);

    // Rebuilds from scratch on the next update.
    view.update_index().unwrap();
    assert_eq!(view.total_rows(), 3);
}

#[test]
fn test_mixed_key_types_follow_type_order() {
    let store = Arc::new(MemoryDocumentStore::new());
    store.put("d1", doc! { "k": "text" });
    store.put("d2", doc! { "k": 7 });
    store.put("d3", doc! { "k": true });
    let builder = Viewdex::builder();
    builder.native_compiler().register_map("by_k", |_, body| {
        Ok(match body.get("k") {
            Some(k) => vec![MapEmission::whole_doc(k.clone())],
            None => vec![],
        })
    });
    let db = builder.open(store);
    let view = db
        .compile_view("design/by_k", &ViewDefinition::new("native", "by_k", "1"))
        .unwrap();

    let rows = view
        .query(QueryOptions::new())
        .unwrap()
        .collect_rows()
        .unwrap();
    // booleans sort before numbers, numbers before strings
    assert_eq!(keys_of(&rows), vec![key!(true), key!(7), key!("text")]);
    // whole-document placeholder rows carry no value
    assert!(rows.iter().all(|row| row.value.is_none()));
}
