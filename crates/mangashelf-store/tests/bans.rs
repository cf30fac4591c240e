mod common;

use chrono::Duration;
use common::harness;
use mangashelf_store::mangashelf_core::{BanKind, UserId};
use mangashelf_store::StoreError;

#[tokio::test]
async fn suspension_expires_lazily() {
    let h = harness().await;
    let reader = UserId::from("reader-1");

    let record = h
        .services
        .bans
        .suspend(&h.admin, reader.as_str(), "spam", 1)
        .await
        .expect("Failed to suspend");
    assert_eq!(record.expires_at, Some(common::t0() + Duration::days(1)));

    let status = h.services.bans.get_status(&reader).await.unwrap();
    assert!(status.is_banned);
    assert_eq!(status.kind, Some(BanKind::Suspend));
    assert_eq!(status.reason.as_deref(), Some("spam"));

    h.clock.advance(Duration::days(1) + Duration::seconds(1));

    let status = h.services.bans.get_status(&reader).await.unwrap();
    assert!(!status.is_banned);
    let bans = h.services.bans.list_bans(&h.admin, false).await.unwrap();
    assert_eq!(bans.len(), 1);
    assert!(bans[0].is_active);
    assert!(h.services.bans.ensure_not_banned(&reader).await.is_ok());
}

#[tokio::test]
async fn double_ban_is_rejected() {
    let h = harness().await;
    let reader = UserId::from("reader-1");

    h.services
        .bans
        .ban(&h.admin, reader.as_str(), "abuse")
        .await
        .expect("Failed to ban");
    let again = h.services.bans.suspend(&h.admin, reader.as_str(), "abuse", 3).await;

    assert!(matches!(again, Err(StoreError::AlreadyBanned(_))));
}

#[tokio::test]
async fn expired_suspension_still_blocks_new_ban_until_unbanned() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let first = h
        .services
        .bans
        .suspend(&h.admin, reader.as_str(), "first offence", 1)
        .await
        .unwrap();
    h.clock.advance(Duration::days(2));
    assert!(!h.services.bans.get_status(&reader).await.unwrap().is_banned);

    let again = h
        .services
        .bans
        .ban(&h.admin, reader.as_str(), "second offence")
        .await;
    assert!(matches!(again, Err(StoreError::AlreadyBanned(_))));

    let all = h.services.bans.list_bans(&h.admin, true).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, first.id);
    assert!(all[0].is_active);

    h.services.bans.unban(&h.admin, first.id).await.unwrap();
    h.services
        .bans
        .ban(&h.admin, reader.as_str(), "second offence")
        .await
        .expect("Failed to ban after unban");
    let status = h.services.bans.get_status(&reader).await.unwrap();
    assert_eq!(status.kind, Some(BanKind::Ban));
}

#[tokio::test]
async fn ban_by_username_targets_wallet_owner() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    h.services.wallets.set_username(&reader, "troll_king").await.unwrap();

    let record = h
        .services
        .bans
        .ban(&h.admin, "Troll_King", "harassment")
        .await
        .unwrap();

    assert_eq!(record.user_id, reader);
    assert_eq!(record.banned_by, h.admin);
    assert!(h.services.bans.get_status(&reader).await.unwrap().is_banned);
}

#[tokio::test]
async fn unban_clears_status_and_repeats_harmlessly() {
    let h = harness().await;
    let reader = UserId::from("reader-1");
    let record = h
        .services
        .bans
        .ban(&h.admin, reader.as_str(), "abuse")
        .await
        .unwrap();

    let lifted = h.services.bans.unban(&h.admin, record.id).await.unwrap();
    assert!(!lifted.is_active);
    assert!(!h.services.bans.get_status(&reader).await.unwrap().is_banned);

    let again = h.services.bans.unban(&h.admin, record.id).await.unwrap();
    assert!(!again.is_active);
}

#[tokio::test]
async fn sanctions_require_admin_and_valid_length() {
    let h = harness().await;
    let mallory = UserId::from("mallory");

    assert!(matches!(
        h.services.bans.ban(&mallory, "reader-1", "no reason").await,
        Err(StoreError::Unauthorized(_))
    ));
    assert!(matches!(
        h.services.bans.suspend(&h.admin, "reader-1", "zero days", 0).await,
        Err(StoreError::InvalidAmount(0))
    ));
    assert!(matches!(
        h.services.bans.list_bans(&mallory, true).await,
        Err(StoreError::Unauthorized(_))
    ));
}
