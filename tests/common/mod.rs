//! Shared setup for the integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use unistore::prelude::*;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap()
}

/// In-memory university store with every table created and a manual clock
pub async fn store() -> (UniStore, ManualClock) {
    let clock = ManualClock::new(t0());
    let store = UniStore::in_memory()
        .unwrap()
        .with_clock(Arc::new(clock.clone()));
    store.ensure_created().await.unwrap();
    (store, clock)
}

/// Store already holding the John/Stuart sample data
pub async fn seeded_store() -> (UniStore, ManualClock, Seeded) {
    let (store, clock) = store().await;
    let mut context = store.context();
    let seeded = queries::seed(&mut context).await.unwrap();
    (store, clock, seeded)
}

pub fn names(students: &[Student]) -> Vec<&str> {
    students.iter().map(|s| s.name.as_str()).collect()
}
