//! Process-wide shared state: the latest published snapshot and the
//! mutable poll interval.
//!
//! The poller is the sole writer of the snapshot slot; HTTP handlers only
//! read. Publication replaces an `Arc` wholesale, so a concurrent reader
//! always sees one fully published snapshot and never a mixture of two.

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Metadata of the most recent successful poll cycle.
///
/// `fields` carries the raw provider response merged with
/// `last_update_time` and, when mirroring is unavailable,
/// `mirror_enabled: false`.
#[derive(Debug, Clone, Serialize)]
pub struct LatestSnapshot {
    pub record_id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Shared state between the poller and the HTTP layer.
pub struct SharedState {
    latest: RwLock<Option<Arc<LatestSnapshot>>>,
    interval_secs: AtomicU64,
}

impl SharedState {
    pub fn new(interval_secs: u64) -> Self {
        Self {
            latest: RwLock::new(None),
            interval_secs: AtomicU64::new(interval_secs),
        }
    }

    /// The latest published snapshot, if any cycle has completed yet.
    pub async fn latest(&self) -> Option<Arc<LatestSnapshot>> {
        self.latest.read().await.clone()
    }

    /// Replace the published snapshot wholesale.
    pub async fn publish(&self, snapshot: LatestSnapshot) {
        *self.latest.write().await = Some(Arc::new(snapshot));
    }

    /// Current poll interval in seconds. Zero means continuous polling.
    pub fn interval_secs(&self) -> u64 {
        self.interval_secs.load(Ordering::Relaxed)
    }

    /// Update the poll interval. Takes effect after the in-flight sleep
    /// completes; a stale read for one cycle is acceptable.
    pub fn set_interval_secs(&self, secs: u64) {
        self.interval_secs.store(secs, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot_with(counter: u64) -> LatestSnapshot {
        let mut fields = Map::new();
        fields.insert("a".to_string(), json!(counter));
        fields.insert("b".to_string(), json!(counter));
        fields.insert("c".to_string(), json!(counter));
        LatestSnapshot {
            record_id: format!("weather_{}.csv", counter),
            fields,
        }
    }

    #[tokio::test]
    async fn absent_until_first_publish() {
        let state = SharedState::new(1800);
        assert!(state.latest().await.is_none());

        state.publish(snapshot_with(1)).await;
        let latest = state.latest().await.unwrap();
        assert_eq!(latest.record_id, "weather_1.csv");
    }

    #[tokio::test]
    async fn publish_overwrites_wholesale() {
        let state = SharedState::new(1800);
        state.publish(snapshot_with(1)).await;
        state.publish(snapshot_with(2)).await;
        let latest = state.latest().await.unwrap();
        assert_eq!(latest.fields["a"], json!(2));
    }

    #[test]
    fn interval_read_write() {
        let state = SharedState::new(1800);
        assert_eq!(state.interval_secs(), 1800);
        state.set_interval_secs(5400);
        assert_eq!(state.interval_secs(), 5400);
        state.set_interval_secs(0);
        assert_eq!(state.interval_secs(), 0);
    }

    /// Under concurrent publications and reads, a reader must never see a
    /// half-updated snapshot. All fields of one publication carry the same
    /// counter, so any mixture would be detectable.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reads_never_tear() {
        let state = Arc::new(SharedState::new(0));

        let writer = {
            let state = state.clone();
            tokio::spawn(async move {
                for i in 0..500u64 {
                    state.publish(snapshot_with(i)).await;
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let state = state.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..500 {
                    if let Some(snap) = state.latest().await {
                        let a = &snap.fields["a"];
                        assert_eq!(a, &snap.fields["b"]);
                        assert_eq!(a, &snap.fields["c"]);
                        assert_eq!(
                            snap.record_id,
                            format!("weather_{}.csv", a.as_u64().unwrap())
                        );
                    }
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
