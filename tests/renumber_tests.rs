use std::sync::Arc;

use recon_engine::config::{ReferenceFieldSettings, RenumberKindSettings};
use recon_engine::services::RenumberService;
use recon_engine::store::{Document, DocumentStore, MemoryStore};
use serde_json::{json, Value};

fn doc(id: &str, body: Value) -> Document {
    Document {
        id: id.to_string(),
        data: body,
    }
}

fn divisions_spec() -> RenumberKindSettings {
    RenumberKindSettings {
        kind: "divisions".to_string(),
        collection: "divisions".to_string(),
        id_pattern: r"^DIV-\d+$".to_string(),
        prefix: "DIV".to_string(),
        seed: 1001,
        references: vec![
            ReferenceFieldSettings {
                collection: "sub_divisions".to_string(),
                field: "division_id".to_string(),
            },
            ReferenceFieldSettings {
                collection: "productions".to_string(),
                field: "division_id".to_string(),
            },
        ],
    }
}

/// After a renumber, no document anywhere still references an old id: every
/// configured reference field across every collection points at the new ids.
#[tokio::test]
async fn test_cascade_leaves_no_dangling_references() {
    let store = Arc::new(MemoryStore::new());
    store
        .append_batch(
            "divisions",
            vec![
                doc("f2Kp8xWq", json!({"id": "f2Kp8xWq", "name": "Weaving"})),
                doc("DIV17", json!({"id": "DIV17", "name": "Dyeing"})),
                doc("a9Qm3zRt", json!({"id": "a9Qm3zRt", "name": "Spinning"})),
            ],
        )
        .await
        .unwrap();
    store
        .append_batch(
            "sub_divisions",
            vec![
                doc("SDIV-1", json!({"id": "SDIV-1", "division_id": "f2Kp8xWq"})),
                doc("SDIV-2", json!({"id": "SDIV-2", "division_id": "DIV17"})),
            ],
        )
        .await
        .unwrap();
    store
        .append_batch(
            "productions",
            vec![
                doc("P1", json!({"id": "P1", "division_id": "a9Qm3zRt"})),
                doc("P2", json!({"id": "P2", "division_id": "f2Kp8xWq"})),
                doc("P3", json!({"id": "P3", "division_id": null})),
            ],
        )
        .await
        .unwrap();

    let summary = RenumberService::new(store.clone())
        .run(&divisions_spec(), false)
        .await
        .unwrap();
    assert_eq!(summary.renumbered, 3);
    assert_eq!(summary.references_updated, 4);

    let old_ids = ["f2Kp8xWq", "DIV17", "a9Qm3zRt"];
    for collection in ["divisions", "sub_divisions", "productions"] {
        for document in store.get_all(collection).await.unwrap() {
            assert!(!old_ids.contains(&document.id.as_str()));
            if let Some(reference) = document.field("division_id").and_then(Value::as_str) {
                assert!(
                    !old_ids.contains(&reference),
                    "{} still references {}",
                    document.id,
                    reference
                );
            }
        }
    }

    // Alphabetical by name: Dyeing, Spinning, Weaving.
    assert_eq!(
        summary.mapping,
        vec![
            ("DIV17".to_string(), "DIV-1001".to_string()),
            ("a9Qm3zRt".to_string(), "DIV-1002".to_string()),
            ("f2Kp8xWq".to_string(), "DIV-1003".to_string()),
        ]
    );
}

/// Running twice is a no-op: the first pass converts everything, the second
/// finds nothing left to renumber.
#[tokio::test]
async fn test_renumber_converges() {
    let store = Arc::new(MemoryStore::new());
    store
        .append_batch(
            "divisions",
            vec![doc("f2Kp8xWq", json!({"id": "f2Kp8xWq", "name": "Weaving"}))],
        )
        .await
        .unwrap();

    let service = RenumberService::new(store.clone());
    let first = service.run(&divisions_spec(), false).await.unwrap();
    assert_eq!(first.renumbered, 1);

    let second = service.run(&divisions_spec(), false).await.unwrap();
    assert_eq!(second.renumbered, 0);
    assert_eq!(second.untouched, 1);
}
