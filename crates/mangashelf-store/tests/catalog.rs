mod common;

use chrono::Duration;
use common::harness;
use mangashelf_store::mangashelf_core::{ChapterPatch, ComicDraft, NotificationKind, UserId};
use mangashelf_store::StoreError;

#[tokio::test]
async fn free_chapter_is_open_to_everyone() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let comic = h.comic("Spy x Family", 30).await;
    let free = h.chapter(&comic, 1, 0).await;
    let paid = h.chapter(&comic, 2, 5).await;

    assert!(h.services.entitlements.has_chapter_access(&reader, free.id).await.unwrap());
    assert!(!h.services.entitlements.has_chapter_access(&reader, paid.id).await.unwrap());
    assert!(!h.services.entitlements.has_comic_access(&reader, comic.id).await.unwrap());
}

#[tokio::test]
async fn comic_purchase_opens_every_chapter() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let comic = h.comic("Hunter x Hunter", 30).await;
    let paid = h.chapter(&comic, 1, 5).await;
    h.fund(&reader, 30).await;

    h.services.purchases.purchase_comic(&reader, comic.id).await.unwrap();

    assert!(h.services.entitlements.has_comic_access(&reader, comic.id).await.unwrap());
    assert!(h.services.entitlements.has_chapter_access(&reader, paid.id).await.unwrap());
    assert!(!h.services.entitlements.has_purchased_chapter(&reader, paid.id).await.unwrap());
}

#[tokio::test]
async fn dangling_references_mean_no_access() {
    let h = harness().await;
    let reader = UserId::from("reader-1");

    assert!(!h
        .services
        .entitlements
        .has_chapter_access(&reader, Default::default())
        .await
        .unwrap());
    assert!(!h
        .services
        .entitlements
        .has_comic_access(&reader, Default::default())
        .await
        .unwrap());
}

#[tokio::test]
async fn pages_require_entitlement() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let comic = h.comic("Dorohedoro", 20).await;
    let chapter = h.chapter(&comic, 1, 6).await;
    for number in [2, 1] {
        h.services
            .catalog
            .add_page(&h.admin, chapter.id, number, &format!("https://cdn.test/{number}.jpg"))
            .await
            .unwrap();
    }

    assert!(matches!(
        h.services.catalog.read_pages(&reader, chapter.id).await,
        Err(StoreError::NotEntitled(_))
    ));

    h.fund(&reader, 6).await;
    h.services.purchases.purchase_chapter(&reader, chapter.id).await.unwrap();
    let pages = h.services.catalog.read_pages(&reader, chapter.id).await.unwrap();
    let numbers: Vec<_> = pages.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![1, 2]);

    let admin_pages = h.services.catalog.read_pages(&h.admin, chapter.id).await.unwrap();
    assert_eq!(admin_pages.len(), 2);
}

#[tokio::test]
async fn new_chapter_notifies_favoriters() {
    let h = harness().await;
    let fan = UserId::from("fan-1");
    let comic = h.comic("Jujutsu Kaisen", 0).await;

    assert!(h.services.favorites.toggle(&fan, comic.id).await.unwrap());
    h.chapter(&comic, 1, 0).await;

    let notifications = h.services.notifications.list(&fan, None).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::NewChapter);
    assert_eq!(notifications[0].link, Some(format!("/comics/{}", comic.id)));
    assert_eq!(h.sink.delivered().len(), 1);
}

#[tokio::test]
async fn catalog_writes_are_admin_only() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let comic = h.comic("Naruto", 10).await;

    let draft = ComicDraft {
        title: "Bootleg".to_string(),
        description: String::new(),
        cover_image: String::new(),
        price: 1,
        author: String::new(),
        genre: Vec::new(),
        category: String::new(),
    };
    assert!(matches!(
        h.services.catalog.create_comic(&reader, draft.clone()).await,
        Err(StoreError::Unauthorized(_))
    ));
    assert!(matches!(
        h.services.catalog.delete_comic(&reader, comic.id).await,
        Err(StoreError::Unauthorized(_))
    ));

    let negative = ComicDraft { price: -1, ..draft };
    assert!(matches!(
        h.services.catalog.create_comic(&h.admin, negative).await,
        Err(StoreError::InvalidPrice(-1))
    ));
}

#[tokio::test]
async fn chapter_patch_and_delete() {
    let h = harness().await;
    let comic = h.comic("Bleach", 10).await;
    let chapter = h.chapter(&comic, 1, 3).await;

    let updated = h
        .services
        .catalog
        .update_chapter(
            &h.admin,
            chapter.id,
            ChapterPatch {
                price: Some(0),
                ..ChapterPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.price, 0);
    assert_eq!(updated.title, chapter.title);

    h.services.catalog.delete_chapter(&h.admin, chapter.id).await.unwrap();
    assert!(h.services.catalog.list_chapters(comic.id).await.unwrap().is_empty());
    assert!(matches!(
        h.services.catalog.get_chapter(chapter.id).await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn featured_shows_live_slots_by_priority() {
    let h = harness().await;
    let low = h.comic("Low", 0).await;
    let high = h.comic("High", 0).await;
    let later = h.comic("Later", 0).await;
    let now = common::t0();

    h.services.catalog.add_featured(&h.admin, low.id, 1, now, None).await.unwrap();
    h.services
        .catalog
        .add_featured(&h.admin, high.id, 9, now, Some(now + Duration::days(2)))
        .await
        .unwrap();
    h.services
        .catalog
        .add_featured(&h.admin, later.id, 5, now + Duration::days(1), None)
        .await
        .unwrap();

    let titles: Vec<_> = h
        .services
        .catalog
        .list_featured()
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.comic.title)
        .collect();
    assert_eq!(titles, vec!["High", "Low"]);

    h.clock.advance(Duration::days(3));
    let titles: Vec<_> = h
        .services
        .catalog
        .list_featured()
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.comic.title)
        .collect();
    assert_eq!(titles, vec!["Later", "Low"]);
}

#[tokio::test]
async fn search_is_case_insensitive() {
    let h = harness().await;
    h.comic("Attack on Titan", 10).await;
    h.comic("Titan Academy", 10).await;
    h.comic("Mob Psycho", 10).await;

    let found = h.services.catalog.search_comics("TITAN", None).await.unwrap();
    assert_eq!(found.len(), 2);
    assert!(h
        .services
        .catalog
        .search_comics("titan", Some("Manhwa"))
        .await
        .unwrap()
        .is_empty());
}
