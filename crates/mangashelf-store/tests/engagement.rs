mod common;

use chrono::Duration;
use common::harness;
use mangashelf_store::mangashelf_core::{NewNotification, NotificationKind, UserId};
use mangashelf_store::StoreError;

#[tokio::test]
async fn favorites_drive_analytics() {
    let h = harness().await;
    let comic = h.comic("Kaiju No. 8", 0).await;
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    assert!(h.services.favorites.toggle(&alice, comic.id).await.unwrap());
    assert!(h.services.favorites.toggle(&bob, comic.id).await.unwrap());
    assert!(!h.services.favorites.toggle(&alice, comic.id).await.unwrap());

    assert_eq!(h.services.favorites.favorite_count(comic.id).await.unwrap(), 1);
    assert!(h.services.favorites.is_favorited(&bob, comic.id).await.unwrap());
    assert!(!h.services.favorites.is_favorited(&alice, comic.id).await.unwrap());
    let analytics = h.services.analytics.get(comic.id).await.unwrap().unwrap();
    assert_eq!(analytics.favorites, 1);

    let shelf = h.services.favorites.user_favorites(&bob).await.unwrap();
    assert_eq!(shelf.len(), 1);
    assert_eq!(shelf[0].id, comic.id);
}

#[tokio::test]
async fn reviews_upsert_and_recompute_average() {
    let h = harness().await;
    let comic = h.comic("Mushishi", 0).await;
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    let first = h.services.reviews.submit(&alice, comic.id, 2, "meh").await.unwrap();
    h.services.reviews.submit(&bob, comic.id, 5, "great").await.unwrap();
    h.clock.advance(Duration::minutes(5));
    let revised = h
        .services
        .reviews
        .submit(&alice, comic.id, 4, "grew on me")
        .await
        .unwrap();

    assert_eq!(revised.id, first.id);
    assert_eq!(revised.created_at, first.created_at);
    assert_eq!(revised.rating, 4);

    let summary = h.services.reviews.average_rating(comic.id).await.unwrap();
    assert_eq!(summary.count, 2);
    assert!((summary.average - 4.5).abs() < f64::EPSILON);
    let analytics = h.services.analytics.get(comic.id).await.unwrap().unwrap();
    assert!((analytics.average_rating - 4.5).abs() < f64::EPSILON);

    assert_eq!(h.services.reviews.list_for_comic(comic.id).await.unwrap().len(), 2);
    let mine = h.services.reviews.user_review(&alice, comic.id).await.unwrap();
    assert_eq!(mine.map(|r| r.comment), Some("grew on me".to_string()));
}

#[tokio::test]
async fn review_rating_must_be_in_range() {
    let h = harness().await;
    let comic = h.comic("Pluto", 0).await;
    let alice = UserId::from("alice");

    assert!(matches!(
        h.services.reviews.submit(&alice, comic.id, 6, "").await,
        Err(StoreError::InvalidRating(6))
    ));
    assert!(matches!(
        h.services.reviews.submit(&alice, comic.id, 0, "").await,
        Err(StoreError::InvalidRating(0))
    ));
    assert!(matches!(
        h.services.reviews.submit(&alice, Default::default(), 3, "").await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn continue_reading_keeps_latest_chapter_per_comic() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let first = h.comic("Yotsuba", 0).await;
    let second = h.comic("Aria", 0).await;
    let ch1 = h.chapter(&first, 1, 0).await;
    let ch2 = h.chapter(&first, 2, 0).await;
    let other = h.chapter(&second, 1, 0).await;

    h.services.reading.update_progress(&reader, first.id, ch1.id, 20, 20).await.unwrap();
    h.clock.advance(Duration::minutes(1));
    h.services.reading.update_progress(&reader, second.id, other.id, 3, 18).await.unwrap();
    h.clock.advance(Duration::minutes(1));
    h.services.reading.update_progress(&reader, first.id, ch2.id, 7, 22).await.unwrap();

    let latest = h
        .services
        .reading
        .get_progress(&reader, first.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.chapter_id, ch2.id);

    let entries = h.services.reading.continue_reading(&reader, None).await.unwrap();
    let titles: Vec<_> = entries.iter().map(|e| e.comic.title.as_str()).collect();
    assert_eq!(titles, vec!["Yotsuba", "Aria"]);
    assert_eq!(entries[0].progress.current_page, 7);

    let limited = h.services.reading.continue_reading(&reader, Some(1)).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn history_is_most_recent_first() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let a = h.comic("A Silent Voice", 0).await;
    let b = h.comic("Nana", 0).await;

    h.services.reading.add_to_history(&reader, a.id).await.unwrap();
    h.clock.advance(Duration::minutes(1));
    h.services.reading.add_to_history(&reader, b.id).await.unwrap();
    h.clock.advance(Duration::minutes(1));
    h.services.reading.add_to_history(&reader, a.id).await.unwrap();

    let recent = h.services.reading.recently_read(&reader, None).await.unwrap();
    let titles: Vec<_> = recent.iter().map(|r| r.comic.title.as_str()).collect();
    assert_eq!(titles, vec!["A Silent Voice", "Nana"]);
    assert_eq!(recent[0].last_read_at, common::t0() + Duration::minutes(2));
}

#[tokio::test]
async fn notifications_are_private_to_their_owner() {
    let h = harness().await;
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    let notification = h
        .services
        .notifications
        .create(NewNotification {
            user_id: alice.clone(),
            kind: NotificationKind::Follow,
            title: "New follower".to_string(),
            message: "bob follows you".to_string(),
            link: None,
        })
        .await
        .unwrap();
    assert!(!notification.read);
    assert_eq!(h.sink.delivered(), vec![notification.clone()]);

    assert!(matches!(
        h.services.notifications.mark_as_read(&bob, notification.id).await,
        Err(StoreError::NotFound { .. })
    ));
    assert_eq!(h.services.notifications.unread_count(&alice).await.unwrap(), 1);

    h.services
        .notifications
        .mark_as_read(&alice, notification.id)
        .await
        .unwrap();
    assert_eq!(h.services.notifications.unread_count(&alice).await.unwrap(), 0);
    assert_eq!(h.services.notifications.mark_all_as_read(&alice).await.unwrap(), 0);
}

#[tokio::test]
async fn banned_users_cannot_engage() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let comic = h.comic("Gintama", 0).await;
    h.services.bans.suspend(&h.admin, "reader-1", "spam", 1).await.unwrap();

    assert!(matches!(
        h.services.favorites.toggle(&reader, comic.id).await,
        Err(StoreError::Banned { .. })
    ));
    assert!(matches!(
        h.services.reviews.submit(&reader, comic.id, 5, "").await,
        Err(StoreError::Banned { .. })
    ));

    h.clock.advance(Duration::days(2));
    assert!(h.services.favorites.toggle(&reader, comic.id).await.is_ok());
}

#[tokio::test]
async fn recorded_purchases_accumulate_in_analytics() {
    let h = harness().await;
    let comic = h.comic("Iron Petals", 25).await;
    assert!(h.services.analytics.get(comic.id).await.unwrap().is_none());

    let first = h.services.analytics.record_purchase(comic.id, 25).await.unwrap();
    assert_eq!(first.purchases, 1);
    assert_eq!(first.revenue, 25);
    assert_eq!(first.views, 0);
    assert_eq!(first.favorites, 0);

    h.clock.advance(Duration::minutes(5));
    let second = h.services.analytics.record_purchase(comic.id, 40).await.unwrap();
    assert_eq!(second.purchases, 2);
    assert_eq!(second.revenue, 65);
    assert!(second.last_updated > first.last_updated);
    assert_eq!(h.services.analytics.get(comic.id).await.unwrap(), Some(second));
}
