use std::sync::Arc;
use std::time::Duration;

use crate::store::Store;

const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Compact once `threshold` appends have accumulated. Returns whether it ran.
pub async fn compact_if_due(store: &Store, threshold: u64) -> bool {
    let appends = store.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match store.compact_wal().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(appends, "WAL compaction failed: {e}");
            false
        }
    }
}

/// Background task that keeps the WAL from growing without bound.
pub async fn run_compactor(store: Arc<Store>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_CHECK_INTERVAL);
    loop {
        interval.tick().await;
        compact_if_due(&store, threshold).await;
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::{NaiveDate, NaiveTime};
    use ulid::Ulid;

    use super::*;
    use crate::model::*;
    use crate::notify::NotifyHub;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("yogabook_test_maintenance");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn workshop(capacity: u32) -> Session {
        Session {
            id: Ulid::new(),
            kind: SessionKind::Workshop,
            title: "Inversions".into(),
            description: None,
            date: NaiveDate::from_ymd_opt(2025, 3, 8).unwrap(),
            time_start: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            time_end: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            capacity,
            reserved_spots: 0,
            price: 4000,
            active: true,
        }
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let path = test_wal_path("compact_threshold.wal");
        let store = Store::open(path.clone(), Arc::new(NotifyHub::new())).unwrap();

        let mut session = workshop(10);
        store.create_session(session.clone()).await.unwrap();
        for capacity in 11..15 {
            session.capacity = capacity;
            store.update_session(session.clone()).await.unwrap();
        }
        assert_eq!(store.wal_appends_since_compact().await, 5);

        assert!(!compact_if_due(&store, 100).await);
        assert!(compact_if_due(&store, 5).await);
        assert_eq!(store.wal_appends_since_compact().await, 0);

        drop(store);
        let reopened = Store::open(path, Arc::new(NotifyHub::new())).unwrap();
        assert_eq!(
            reopened.session(SessionKind::Workshop, session.id).map(|s| s.capacity),
            Some(14)
        );
    }
}
