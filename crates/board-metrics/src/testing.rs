//! Shared board fixture for unit tests
//!
//! Backlog: 1 annotation + 4 issues, Doing: 3 issues, Done: 2 annotations
//! + 8 issues. Counters are for `org:acme`.

use board_core::ResourceRef;
use board_source::MockSource;
use serde_json::{json, Value};

pub(crate) fn card_ref(column: &str, index: usize) -> ResourceRef {
    ResourceRef::new(format!("columns/{}/cards/{}", column, index))
}

/// Annotation cards first, then issue cards
pub(crate) fn cards_json(column: &str, base_id: u64, annotations: usize, issues: usize) -> Value {
    let cards: Vec<Value> = (0..annotations + issues)
        .map(|index| {
            let mut card = json!({
                "id": base_id + index as u64,
                "url": card_ref(column, index).as_str(),
                "note": null,
            });
            if index >= annotations {
                card["content_url"] = json!(format!("issues/{}-{}", column, index));
            }
            card
        })
        .collect();
    Value::Array(cards)
}

pub(crate) fn board_source() -> MockSource {
    MockSource::new()
        .with_resource(
            "projects/7",
            json!({"id": 7, "name": "Roadmap", "columns_url": "projects/7/columns"}),
        )
        .with_resource(
            "projects/7/columns",
            json!([
                {"name": "Backlog", "cards_url": "columns/Backlog/cards"},
                {"name": "Doing", "cards_url": "columns/Doing/cards"},
                {"name": "Done", "cards_url": "columns/Done/cards"},
            ]),
        )
        .with_resource("columns/Backlog/cards", cards_json("Backlog", 100, 1, 4))
        .with_resource("columns/Doing/cards", cards_json("Doing", 200, 0, 3))
        .with_resource("columns/Done/cards", cards_json("Done", 300, 2, 8))
        .with_count("state:open type:pr org:acme", 6)
        .with_count("state:open type:pr org:acme review:required", 2)
        .with_count("state:open type:issue org:acme", 40)
        .with_count("state:closed type:issue org:acme", 120)
        .with_count("state:open type:issue org:acme label:bug", 5)
}
