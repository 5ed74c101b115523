use std::sync::Arc;
use watchvault_core::{
    Category, CategoryCounts, ItemDraft, ItemEdit, ItemId, MemoryKvStore, RepoError,
    StatusCounts, VaultRepository, WatchStatus, WatchlistFilter, WatchlistService,
};

fn service() -> WatchlistService<VaultRepository> {
    let repo = VaultRepository::open(Arc::new(MemoryKvStore::new())).unwrap();
    WatchlistService::new(repo)
}

fn seed(service: &WatchlistService<VaultRepository>) {
    let drafts = [
        ("Interstellar", Category::Movie, WatchStatus::Completed),
        ("Oppenheimer", Category::Movie, WatchStatus::PlanToWatch),
        ("The Bear", Category::Series, WatchStatus::Watching),
        ("Frieren", Category::Anime, WatchStatus::Watching),
        ("Mob Psycho 100", Category::Anime, WatchStatus::Completed),
    ];
    for (title, category, status) in drafts {
        service
            .add_item(ItemDraft::new(title, category).with_status(status))
            .unwrap();
    }
}

#[test]
fn category_counts_match_home_screen_totals() {
    let service = service();
    assert_eq!(service.category_counts(), CategoryCounts::default());

    seed(&service);
    let counts = service.category_counts();
    assert_eq!(counts.get(Category::Movie), 2);
    assert_eq!(counts.get(Category::Series), 1);
    assert_eq!(counts.get(Category::Anime), 2);
    assert_eq!(counts.total(), 5);
}

#[test]
fn status_counts_cover_every_status() {
    let service = service();
    seed(&service);
    assert_eq!(
        service.status_counts(),
        StatusCounts {
            plan_to_watch: 1,
            watching: 2,
            completed: 2,
        }
    );
}

#[test]
fn list_filter_combines_category_and_status_in_collection_order() {
    let service = service();
    seed(&service);

    let all = service.list_items(&WatchlistFilter::default());
    assert_eq!(all.len(), 5);

    let watching = service.list_items(&WatchlistFilter {
        status: Some(WatchStatus::Watching),
        ..WatchlistFilter::default()
    });
    let titles: Vec<_> = watching.iter().map(|item| item.title.as_str()).collect();
    assert_eq!(titles, vec!["The Bear", "Frieren"]);

    let completed_anime = service.list_items(&WatchlistFilter {
        category: Some(Category::Anime),
        status: Some(WatchStatus::Completed),
    });
    assert_eq!(completed_anime.len(), 1);
    assert_eq!(completed_anime[0].title, "Mob Psycho 100");
}

#[test]
fn edit_item_carries_id_and_category_over() {
    let service = service();
    let created = service
        .add_item(ItemDraft::new("Cowboy Bebop", Category::Anime).with_notes("session 1"))
        .unwrap();

    let edited = service
        .edit_item(
            &created.id,
            ItemEdit {
                title: " Cowboy Bebop ".to_string(),
                status: WatchStatus::Completed,
                notes: Some("all sessions".to_string()),
                rating: Some(10),
            },
        )
        .unwrap();

    assert_eq!(edited.id, created.id);
    assert_eq!(edited.category, Category::Anime);
    assert_eq!(edited.title, "Cowboy Bebop");
    assert_eq!(edited.status, WatchStatus::Completed);
    assert_eq!(edited.rating, Some(10));
    assert_eq!(service.get_item(&created.id), Some(edited));
}

#[test]
fn edit_and_set_status_on_missing_item_return_not_found() {
    let service = service();
    let missing = ItemId::from_raw("nope");

    let err = service
        .edit_item(
            &missing,
            ItemEdit {
                title: "x".to_string(),
                status: WatchStatus::Watching,
                notes: None,
                rating: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));

    let err = service
        .set_status(&missing, WatchStatus::Completed)
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));
}

#[test]
fn set_status_changes_only_status() {
    let service = service();
    let created = service
        .add_item(ItemDraft::new("Shogun", Category::Series).with_rating(9))
        .unwrap();

    let updated = service
        .set_status(&created.id, WatchStatus::Watching)
        .unwrap();
    assert_eq!(updated.status, WatchStatus::Watching);
    assert_eq!(updated.rating, Some(9));
    assert_eq!(updated.title, created.title);

    service.delete_item(&created.id).unwrap();
    assert!(service.list_items(&WatchlistFilter::default()).is_empty());
}
