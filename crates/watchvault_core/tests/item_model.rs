use watchvault_core::{Category, Item, ItemDraft, ItemEdit, ItemId, WatchStatus};

#[test]
fn draft_defaults_to_plan_to_watch_without_optionals() {
    let draft = ItemDraft::new("Dune", Category::Movie);
    assert_eq!(draft.status, WatchStatus::PlanToWatch);
    assert_eq!(draft.notes, None);
    assert_eq!(draft.rating, None);
}

#[test]
fn from_draft_generates_uuid_id_and_trims_title() {
    let item = Item::from_draft(ItemDraft::new("  Dune  ", Category::Movie));
    assert_eq!(item.title, "Dune");
    assert!(uuid::Uuid::parse_str(item.id.as_str()).is_ok());

    let other = Item::from_draft(ItemDraft::new("Dune", Category::Movie));
    assert_ne!(item.id, other.id);
}

#[test]
fn duplicate_key_uses_category_and_normalized_title() {
    let a = Item::from_draft(ItemDraft::new("Naruto", Category::Anime));
    let b = Item::from_draft(ItemDraft::new("  NARUTO ", Category::Anime));
    let c = Item::from_draft(ItemDraft::new("Naruto", Category::Series));
    assert_eq!(a.duplicate_key(), b.duplicate_key());
    assert_ne!(a.duplicate_key(), c.duplicate_key());
}

#[test]
fn item_serialization_uses_expected_wire_fields() {
    let item = Item {
        id: ItemId::from_raw("11111111-2222-4333-8444-555555555555"),
        title: "Spirited Away".to_string(),
        category: Category::Anime,
        status: WatchStatus::PlanToWatch,
        notes: Some("with subtitles".to_string()),
        rating: Some(10),
    };

    let json = serde_json::to_value(&item).unwrap();
    assert_eq!(json["id"], "11111111-2222-4333-8444-555555555555");
    assert_eq!(json["title"], "Spirited Away");
    assert_eq!(json["type"], "Anime");
    assert_eq!(json["status"], "Plan to Watch");
    assert_eq!(json["notes"], "with subtitles");
    assert_eq!(json["rating"], 10);
    assert!(json.get("category").is_none());

    let decoded: Item = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, item);
}

#[test]
fn edit_replaces_mutable_fields_only() {
    let current = Item::from_draft(
        ItemDraft::new("Bleach", Category::Anime)
            .with_notes("arc 1")
            .with_rating(6),
    );
    let replaced = ItemEdit {
        title: "Bleach TYBW".to_string(),
        status: WatchStatus::Watching,
        notes: None,
        rating: None,
    }
    .apply_to(&current);

    assert_eq!(replaced.id, current.id);
    assert_eq!(replaced.category, Category::Anime);
    assert_eq!(replaced.title, "Bleach TYBW");
    assert_eq!(replaced.notes, None);
    assert_eq!(replaced.rating, None);
}
