//! Ledger rules shared by every backend.
//!
//! Backends call these inside their critical sections so the PostgreSQL and
//! in-memory stores reject exactly the same inputs.

use chrono::{DateTime, Duration, Utc};
use mangashelf_core::{
    is_valid_username, normalize_username, Wallet, MAX_RATING, MIN_RATING,
};

use crate::error::{StoreError, StoreResult};

/// Top-ups, refunds and debits move a strictly positive number of coins.
pub fn validate_amount(amount: i64) -> StoreResult<()> {
    if amount <= 0 {
        return Err(StoreError::InvalidAmount(amount));
    }
    Ok(())
}

/// Catalog prices are zero (free) or positive.
pub fn validate_price(price: i64) -> StoreResult<()> {
    if price < 0 {
        return Err(StoreError::InvalidPrice(price));
    }
    Ok(())
}

pub fn validate_rating(rating: i16) -> StoreResult<()> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(StoreError::InvalidRating(rating));
    }
    Ok(())
}

/// Returns the balance left after taking `amount` from `wallet`.
///
/// A missing wallet has nothing to spend.
pub fn debit_balance(wallet: Option<&Wallet>, amount: i64) -> StoreResult<i64> {
    let available = wallet.map_or(0, |w| w.coins);
    if wallet.is_none() || available < amount {
        return Err(StoreError::InsufficientFunds {
            required: amount,
            available,
        });
    }
    Ok(available - amount)
}

/// A chapter is readable when it is free, its comic is owned, or it was
/// bought on its own.
#[must_use]
pub fn chapter_access(chapter_price: i64, owns_comic: bool, owns_chapter: bool) -> bool {
    chapter_price == 0 || owns_comic || owns_chapter
}

/// Expiry of a suspension of `days` whole days starting at `now`.
pub fn suspension_expiry(now: DateTime<Utc>, days: i64) -> StoreResult<DateTime<Utc>> {
    if days < 1 {
        return Err(StoreError::InvalidAmount(days));
    }
    Duration::try_days(days)
        .and_then(|span| now.checked_add_signed(span))
        .ok_or(StoreError::InvalidAmount(days))
}

/// Case-folds a username chosen by its owner and checks the character rules.
pub fn canonical_username(raw: &str) -> StoreResult<String> {
    let username = normalize_username(raw);
    if !is_valid_username(&username) {
        return Err(StoreError::InvalidUsername(raw.to_string()));
    }
    Ok(username)
}

pub fn comic_purchase_description(title: &str) -> String {
    format!("Purchased comic: {title}")
}

pub fn chapter_purchase_description(comic_title: &str, chapter_number: i32, title: &str) -> String {
    format!("Purchased {comic_title} chapter {chapter_number}: {title}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mangashelf_core::UserId;

    fn wallet(coins: i64) -> Wallet {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut wallet = Wallet::empty(UserId::from("reader"), "reader".to_string(), now);
        wallet.coins = coins;
        wallet
    }

    #[test]
    fn amounts_must_be_positive() {
        assert!(validate_amount(1).is_ok());
        assert!(matches!(validate_amount(0), Err(StoreError::InvalidAmount(0))));
        assert!(matches!(
            validate_amount(-5),
            Err(StoreError::InvalidAmount(-5))
        ));
    }

    #[test]
    fn debit_never_goes_negative() {
        assert_eq!(debit_balance(Some(&wallet(30)), 30).unwrap(), 0);
        assert_eq!(debit_balance(Some(&wallet(100)), 30).unwrap(), 70);

        match debit_balance(Some(&wallet(29)), 30) {
            Err(StoreError::InsufficientFunds {
                required,
                available,
            }) => {
                assert_eq!(required, 30);
                assert_eq!(available, 29);
            }
            other => panic!("expected insufficient funds, got {other:?}"),
        }
        assert!(matches!(
            debit_balance(None, 1),
            Err(StoreError::InsufficientFunds { available: 0, .. })
        ));
    }

    #[test]
    fn chapter_access_is_an_or() {
        assert!(chapter_access(0, false, false));
        assert!(chapter_access(5, true, false));
        assert!(chapter_access(5, false, true));
        assert!(!chapter_access(5, false, false));
    }

    #[test]
    fn suspension_is_whole_days() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let expiry = suspension_expiry(now, 1).unwrap();
        assert_eq!((expiry - now).num_milliseconds(), 86_400_000);
        assert!(suspension_expiry(now, 0).is_err());
    }

    #[test]
    fn usernames_are_case_folded() {
        assert_eq!(canonical_username("Reader_One").unwrap(), "reader_one");
        assert!(matches!(
            canonical_username("ab"),
            Err(StoreError::InvalidUsername(_))
        ));
    }

    #[test]
    fn ratings_are_bounded() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
    }
}
