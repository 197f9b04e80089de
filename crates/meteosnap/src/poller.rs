//! Background poll loop: fetch -> encode -> persist -> mirror -> publish
//! -> sleep.
//!
//! A failed cycle is logged and skipped; the loop never dies and never
//! publishes partial metadata, so the previously published snapshot stays
//! visible until the next success. The sleep re-reads the interval each
//! time it starts, which is how `/update_interval` takes effect.

use crate::encoder::{encode, EncodeError, WeatherSnapshot};
use crate::mirror::SnapshotMirror;
use crate::openmeteo::{FetchError, WeatherFetcher};
use crate::state::{LatestSnapshot, SharedState};
use crate::store::{SnapshotStore, StoreError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// A single cycle's failure. Always cycle-fatal, never process-fatal.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("persist failed: {0}")]
    Store(#[from] StoreError),
}

/// Run one snapshot cycle and return the persisted record's identifier.
pub async fn run_cycle<F: WeatherFetcher>(
    fetcher: &F,
    store: &SnapshotStore,
    mirror: &SnapshotMirror,
    state: &SharedState,
) -> Result<String, CycleError> {
    let response = fetcher.fetch_forecast().await?;

    let snapshot = WeatherSnapshot::from_json(&response)?;
    let record = encode(&snapshot);

    let id = store.persist(&record)?;

    if mirror.available() {
        mirror.push(&id, record.to_csv().into_bytes()).await;
    }

    let mut fields = match response {
        Value::Object(map) => map,
        // from_json already rejected non-objects above
        _ => return Err(CycleError::Encode(EncodeError::NotAnObject)),
    };
    fields.insert(
        "last_update_time".to_string(),
        Value::String(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
    );
    if !mirror.available() {
        fields.insert("mirror_enabled".to_string(), Value::Bool(false));
    }

    state
        .publish(LatestSnapshot {
            record_id: id.clone(),
            fields,
        })
        .await;

    Ok(id)
}

/// Run the poll loop until the shutdown signal fires.
///
/// The first cycle runs immediately; afterwards the loop sleeps for the
/// interval value current at the moment the sleep begins. An interval
/// change does not preempt an in-flight sleep. A zero interval means
/// continuous polling.
pub async fn run_poller<F: WeatherFetcher>(
    fetcher: F,
    store: SnapshotStore,
    mirror: SnapshotMirror,
    state: Arc<SharedState>,
    mut shutdown: watch::Receiver<()>,
) {
    log::info!("poller started (interval {}s)", state.interval_secs());

    loop {
        match run_cycle(&fetcher, &store, &mirror, &state).await {
            Ok(id) => log::info!("poll cycle complete: {}", id),
            Err(e) => log::error!("poll cycle failed, retrying next interval: {}", e),
        }

        let interval = state.interval_secs();
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
            _ = shutdown.changed() => {
                log::info!("poller shutdown signal received, exiting");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    /// Fetcher returning a canned response, or an upstream error.
    struct StubFetcher {
        response: Option<Value>,
    }

    impl WeatherFetcher for StubFetcher {
        async fn fetch_forecast(&self) -> Result<Value, FetchError> {
            match &self.response {
                Some(v) => Ok(v.clone()),
                None => Err(FetchError::Status(reqwest::StatusCode::BAD_GATEWAY)),
            }
        }
    }

    fn hourly_response(len: usize) -> Value {
        let series = |base: f64| -> Vec<f64> {
            (0..len).map(|i| base + i as f64).collect()
        };
        json!({
            "latitude": 50.93,
            "longitude": 6.95,
            "current_weather": {
                "time": "2024-05-01T12:00",
                "temperature": 18.4
            },
            "hourly": {
                "time": (0..len).map(|i| format!("2024-05-01T{:02}:00", i)).collect::<Vec<_>>(),
                "rain": series(0.0),
                "temperature_2m": series(10.0)
            }
        })
    }

    #[tokio::test]
    async fn successful_cycle_persists_and_publishes() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path(), "weather").unwrap();
        let mirror = SnapshotMirror::disabled();
        let state = SharedState::new(1800);
        let fetcher = StubFetcher {
            response: Some(hourly_response(24)),
        };

        let id = run_cycle(&fetcher, &store, &mirror, &state).await.unwrap();

        assert_eq!(store.list().unwrap(), vec![id.clone()]);

        let latest = state.latest().await.unwrap();
        assert_eq!(latest.record_id, id);
        assert_eq!(latest.fields["latitude"], json!(50.93));
        assert_eq!(latest.fields["mirror_enabled"], json!(false));
        assert!(latest.fields.contains_key("last_update_time"));
    }

    #[tokio::test]
    async fn cycle_writes_one_data_row_per_hour() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path(), "weather").unwrap();
        let state = SharedState::new(1800);
        let fetcher = StubFetcher {
            response: Some(hourly_response(24)),
        };

        let id = run_cycle(&fetcher, &store, &SnapshotMirror::disabled(), &state)
            .await
            .unwrap();

        let csv = String::from_utf8(store.read(&id).unwrap()).unwrap();
        let data_rows = csv
            .lines()
            .filter(|line| line.starts_with("2024-05-01T") && line.contains(','))
            .count();
        assert_eq!(data_rows, 24);
    }

    #[tokio::test]
    async fn failed_fetch_publishes_nothing() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path(), "weather").unwrap();
        let state = SharedState::new(1800);
        let fetcher = StubFetcher { response: None };

        let err = run_cycle(&fetcher, &store, &SnapshotMirror::disabled(), &state)
            .await
            .unwrap_err();
        assert!(matches!(err, CycleError::Fetch(_)));
        assert!(state.latest().await.is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_keeps_previous_snapshot() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path(), "weather").unwrap();
        let state = SharedState::new(1800);

        let good = StubFetcher {
            response: Some(hourly_response(3)),
        };
        let first = run_cycle(&good, &store, &SnapshotMirror::disabled(), &state)
            .await
            .unwrap();

        // Unequal hourly arrays abort the cycle without touching the slot.
        let mut bad_payload = hourly_response(3);
        bad_payload["hourly"]["rain"] = json!([0.0]);
        let bad = StubFetcher {
            response: Some(bad_payload),
        };
        let err = run_cycle(&bad, &store, &SnapshotMirror::disabled(), &state)
            .await
            .unwrap_err();
        assert!(matches!(err, CycleError::Encode(_)));

        let latest = state.latest().await.unwrap();
        assert_eq!(latest.record_id, first);
    }
}
