mod common;

use common::harness;
use mangashelf_store::mangashelf_core::{NotificationKind, TransactionKind, UserId};
use mangashelf_store::StoreError;
use tokio::task::JoinSet;

#[tokio::test]
async fn purchase_debits_wallet_and_counts_analytics() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let comic = h.comic("Blue Lock", 30).await;
    h.fund(&reader, 100).await;

    let receipt = h
        .services
        .purchases
        .purchase_comic(&reader, comic.id)
        .await
        .expect("Failed to purchase");

    assert_eq!(receipt.balance, 70);
    assert_eq!(h.services.wallets.get_balance(&reader).await.unwrap(), 70);

    let owned = h.services.purchases.user_purchases(&reader).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, comic.id);

    let transactions = h
        .services
        .transactions
        .list_for_user(&reader, None)
        .await
        .unwrap();
    let purchases: Vec<_> = transactions
        .iter()
        .filter(|t| t.kind == TransactionKind::Purchase)
        .collect();
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0].amount, -30);
    assert_eq!(purchases[0].description, "Purchased comic: Blue Lock");

    let analytics = h.services.analytics.get(comic.id).await.unwrap().unwrap();
    assert_eq!(analytics.purchases, 1);
    assert_eq!(analytics.revenue, 30);
}

#[tokio::test]
async fn second_purchase_of_same_comic_is_rejected() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let comic = h.comic("Vinland Saga", 30).await;
    h.fund(&reader, 100).await;

    h.services
        .purchases
        .purchase_comic(&reader, comic.id)
        .await
        .expect("Failed to purchase");
    let again = h.services.purchases.purchase_comic(&reader, comic.id).await;

    assert!(matches!(again, Err(StoreError::AlreadyPurchased)));
    assert_eq!(h.services.wallets.get_balance(&reader).await.unwrap(), 70);
}

#[tokio::test]
async fn chapter_of_owned_comic_is_rejected() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let comic = h.comic("Berserk", 30).await;
    let chapter = h.chapter(&comic, 1, 5).await;
    h.fund(&reader, 100).await;
    h.services
        .purchases
        .purchase_comic(&reader, comic.id)
        .await
        .expect("Failed to purchase");

    let result = h.services.purchases.purchase_chapter(&reader, chapter.id).await;

    assert!(matches!(result, Err(StoreError::AlreadyOwnsComic)));
    assert_eq!(h.services.wallets.get_balance(&reader).await.unwrap(), 70);
}

#[tokio::test]
async fn insufficient_funds_leaves_no_trace() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let comic = h.comic("Monster", 50).await;
    h.fund(&reader, 20).await;

    let result = h.services.purchases.purchase_comic(&reader, comic.id).await;

    match result {
        Err(StoreError::InsufficientFunds {
            required,
            available,
        }) => {
            assert_eq!(required, 50);
            assert_eq!(available, 20);
        }
        other => panic!("expected insufficient funds, got {other:?}"),
    }
    assert_eq!(h.services.wallets.get_balance(&reader).await.unwrap(), 20);
    assert!(!h.services.entitlements.has_purchased(&reader, comic.id).await.unwrap());
    assert!(h.services.analytics.get(comic.id).await.unwrap().is_none());
}

#[tokio::test]
async fn purchase_without_wallet_is_insufficient() {
    let h = harness().await;
    let comic = h.comic("Dandadan", 10).await;

    let result = h
        .services
        .purchases
        .purchase_comic(&UserId::from("stranger"), comic.id)
        .await;

    assert!(matches!(result, Err(StoreError::InsufficientFunds { .. })));
}

#[tokio::test]
async fn free_comic_needs_no_wallet() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let comic = h.comic("One Punch Man", 0).await;

    let receipt = h
        .services
        .purchases
        .purchase_comic(&reader, comic.id)
        .await
        .expect("Failed to take free comic");

    assert!(receipt.transaction.is_none());
    assert_eq!(receipt.balance, 0);
    let analytics = h.services.analytics.get(comic.id).await.unwrap().unwrap();
    assert_eq!(analytics.purchases, 1);
    assert_eq!(analytics.revenue, 0);
    assert!(h.sink.delivered().is_empty());
}

#[tokio::test]
async fn unknown_comic_is_not_found() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    h.fund(&reader, 10).await;

    let result = h
        .services
        .purchases
        .purchase_comic(&reader, Default::default())
        .await;

    assert!(matches!(result, Err(StoreError::NotFound { entity: "comic", .. })));
}

#[tokio::test]
async fn chapter_purchase_counts_against_parent_comic() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let comic = h.comic("Chainsaw Man", 40).await;
    let chapter = h.chapter(&comic, 3, 8).await;
    h.fund(&reader, 50).await;

    let receipt = h
        .services
        .purchases
        .purchase_chapter(&reader, chapter.id)
        .await
        .expect("Failed to purchase chapter");

    assert_eq!(receipt.balance, 42);
    assert_eq!(receipt.transaction.unwrap().amount, -8);
    let analytics = h.services.analytics.get(comic.id).await.unwrap().unwrap();
    assert_eq!(analytics.purchases, 1);
    assert_eq!(analytics.revenue, 8);

    let chapters = h
        .services
        .purchases
        .user_chapter_purchases(&reader)
        .await
        .unwrap();
    assert_eq!(chapters.len(), 1);
    assert!(matches!(
        h.services.purchases.purchase_chapter(&reader, chapter.id).await,
        Err(StoreError::AlreadyPurchased)
    ));
}

#[tokio::test]
async fn paid_purchase_notifies_and_warns_on_low_balance() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let comic = h.comic("Frieren", 25).await;
    h.fund(&reader, 30).await;

    h.services
        .purchases
        .purchase_comic(&reader, comic.id)
        .await
        .expect("Failed to purchase");

    let kinds: Vec<_> = h.sink.delivered().iter().map(|n| n.kind).collect();
    assert_eq!(kinds, vec![NotificationKind::Purchase, NotificationKind::LowBalance]);
    assert_eq!(h.services.notifications.unread_count(&reader).await.unwrap(), 2);
}

#[tokio::test]
async fn banned_user_cannot_purchase() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let comic = h.comic("Akira", 10).await;
    h.fund(&reader, 100).await;
    h.services
        .bans
        .ban(&h.admin, reader.as_str(), "chargeback fraud")
        .await
        .expect("Failed to ban");

    let result = h.services.purchases.purchase_comic(&reader, comic.id).await;

    match result {
        Err(StoreError::Banned { reason }) => assert_eq!(reason, "chargeback fraud"),
        other => panic!("expected banned, got {other:?}"),
    }
    assert_eq!(h.services.wallets.get_balance(&reader).await.unwrap(), 100);
}

#[tokio::test]
async fn concurrent_purchases_of_same_comic_succeed_once() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let comic = h.comic("Oyasumi Punpun", 30).await;
    h.fund(&reader, 30).await;

    let mut join_set = JoinSet::new();
    for _ in 0..8 {
        let purchases = h.services.purchases.clone();
        let reader = reader.clone();
        join_set.spawn(async move { purchases.purchase_comic(&reader, comic.id).await });
    }

    let mut succeeded = 0;
    while let Some(result) = join_set.join_next().await {
        match result.expect("Task panicked") {
            Ok(_) => succeeded += 1,
            Err(StoreError::AlreadyPurchased) | Err(StoreError::InsufficientFunds { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(h.services.wallets.get_balance(&reader).await.unwrap(), 0);
    let analytics = h.services.analytics.get(comic.id).await.unwrap().unwrap();
    assert_eq!(analytics.purchases, 1);
}
