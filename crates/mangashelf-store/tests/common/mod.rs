//! Shared fixtures: services over a fresh [`MemoryStore`] driven by a manual clock.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mangashelf_store::mangashelf_core::{
    Chapter, Comic, ComicDraft, ManualTimeSource, Notification, UserId,
};
use mangashelf_store::{MemoryStore, NewChapter, NotificationSink, ServiceConfig, Services};

/// Collects delivered notifications.
#[derive(Default, Clone)]
pub struct RecordingSink {
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: &Notification) {
        self.delivered.lock().unwrap().push(notification.clone());
    }
}

pub struct Harness {
    pub services: Services,
    pub clock: ManualTimeSource,
    pub sink: RecordingSink,
    pub admin: UserId,
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub async fn harness() -> Harness {
    let clock = ManualTimeSource::new(t0());
    let sink = RecordingSink::default();
    let services = Services::new(
        Arc::new(MemoryStore::new()),
        Arc::new(clock.clone()),
        Arc::new(sink.clone()),
        ServiceConfig::default(),
    );
    let admin = UserId::from("admin-1");
    services
        .admins
        .add_admin(&admin)
        .await
        .expect("Failed to add admin");
    Harness {
        services,
        clock,
        sink,
        admin,
    }
}

impl Harness {
    pub async fn comic(&self, title: &str, price: i64) -> Comic {
        let draft = ComicDraft {
            title: title.to_string(),
            description: String::new(),
            cover_image: String::new(),
            price,
            author: "Test Author".to_string(),
            genre: vec!["Action".to_string()],
            category: "Manga".to_string(),
        };
        self.services
            .catalog
            .create_comic(&self.admin, draft)
            .await
            .expect("Failed to create comic")
    }

    pub async fn chapter(&self, comic: &Comic, number: i32, price: i64) -> Chapter {
        let new = NewChapter {
            chapter_number: number,
            title: format!("Chapter {number}"),
            price,
        };
        self.services
            .catalog
            .create_chapter(&self.admin, comic.id, new)
            .await
            .expect("Failed to create chapter")
    }

    pub async fn fund(&self, user: &UserId, amount: i64) {
        self.services
            .wallets
            .topup(&self.admin, user.as_str(), amount, "Test top-up")
            .await
            .expect("Failed to top up");
    }
}
